//! MCP integration tests: stdio line protocol → router → dispatcher → mock GitLab.

mod common;

use common::{start_mock_gitlab, MockGitLab, TOKEN};
use gitlab_mcp::mcp::stdio;
use gitlab_mcp::types::{ToolMode, TransportConfig};
use gitlab_mcp::{build_server, Config};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

struct Session {
    input: DuplexStream,
    output: Lines<BufReader<DuplexStream>>,
    handle: JoinHandle<gitlab_mcp::Result<()>>,
}

impl Session {
    async fn start(mock: &MockGitLab, mode: ToolMode) -> Self {
        let mut config = Config::default();
        config.gitlab.url = mock.url.clone();
        config.gitlab.token = TOKEN.to_string();
        config.server.mode = mode;
        let server = Arc::new(build_server(&config).unwrap());

        let (input, server_in) = tokio::io::duplex(64 * 1024);
        let (server_out, output) = tokio::io::duplex(64 * 1024);
        let max = TransportConfig::default().max_message_bytes;
        let handle = tokio::spawn(stdio::serve(
            server,
            BufReader::new(server_in),
            server_out,
            max,
            CancellationToken::new(),
        ));
        Self {
            input,
            output: BufReader::new(output).lines(),
            handle,
        }
    }

    async fn send(&mut self, message: Value) {
        let line = format!("{}\n", message);
        self.input.write_all(line.as_bytes()).await.unwrap();
    }

    async fn request(&mut self, id: u64, method: &str, params: Value) -> Value {
        self.send(json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params}))
            .await;
        let line = self.output.next_line().await.unwrap().unwrap();
        let response: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(response["id"], id);
        response
    }

    async fn call_tool(&mut self, id: u64, name: &str, arguments: Value) -> (bool, Value) {
        let response = self
            .request(id, "tools/call", json!({"name": name, "arguments": arguments}))
            .await;
        let result = &response["result"];
        let envelope: Value =
            serde_json::from_str(result["content"][0]["text"].as_str().unwrap()).unwrap();
        (result["isError"].as_bool().unwrap(), envelope)
    }

    async fn close(self) {
        drop(self.input);
        self.handle.await.unwrap().unwrap();
    }
}

fn without_timing(mut envelope: Value) -> Value {
    if let Some(meta) = envelope.get_mut("metadata").and_then(Value::as_object_mut) {
        meta.remove("execution_time_ms");
        meta.remove("rate_limit_reset");
    }
    envelope
}

#[tokio::test]
async fn test_full_mode_lifecycle() {
    let mock = start_mock_gitlab().await;
    let mut session = Session::start(&mock, ToolMode::Full).await;

    let init = session
        .request(1, "initialize", json!({"protocolVersion": "2025-03-26", "capabilities": {}}))
        .await;
    assert_eq!(init["result"]["protocolVersion"], "2025-03-26");
    session
        .send(json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
        .await;

    let list = session.request(2, "tools/list", json!({})).await;
    let tools = list["result"]["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 11);
    assert!(tools.iter().all(|t| t["inputSchema"]["type"] == "object"));

    let (is_error, envelope) = session
        .call_tool(3, "get_issue", json!({"project_id": 1, "issue_iid": 5}))
        .await;
    assert!(!is_error);
    assert_eq!(envelope["success"], true);
    assert_eq!(envelope["data"]["iid"], 5);

    let (is_error, envelope) = session.call_tool(4, "get_issue", json!({"project_id": 1})).await;
    assert!(is_error);
    assert_eq!(envelope["error"]["code"], "VALIDATION");
    assert_eq!(envelope["error"]["details"]["field"], "issue_iid");

    let ping = session.request(5, "ping", Value::Null).await;
    assert_eq!(ping["result"], json!({}));

    session.close().await;
}

#[tokio::test]
async fn test_slim_mode_matches_full_mode() {
    let mock = start_mock_gitlab().await;
    let mut full = Session::start(&mock, ToolMode::Full).await;
    let mut slim = Session::start(&mock, ToolMode::Slim).await;

    let list = slim.request(1, "tools/list", json!({})).await;
    let names: Vec<&str> = list["result"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["discover_tools", "get_tool_schema", "execute_tool"]);

    let (_, discovered) = slim
        .call_tool(2, "discover_tools", json!({"category": "issues"}))
        .await;
    let issue_tools: Vec<&str> = discovered["data"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(issue_tools, vec!["list_issues", "get_issue", "create_issue"]);

    let args = json!({"project_id": 1, "issue_iid": 5});
    let (direct_error, direct) = full.call_tool(3, "get_issue", args.clone()).await;
    let (slim_error, proxied) = slim
        .call_tool(3, "execute_tool", json!({"tool_name": "get_issue", "arguments": args}))
        .await;
    assert_eq!(direct_error, slim_error);
    assert_eq!(without_timing(direct), without_timing(proxied));

    let (_, schema) = slim
        .call_tool(4, "get_tool_schema", json!({"tool_name": "create_merge_request"}))
        .await;
    assert_eq!(schema["data"]["category"], "merge_requests");
    assert_eq!(
        schema["data"]["inputSchema"]["required"],
        json!(["project_id", "source_branch", "target_branch", "title"])
    );

    full.close().await;
    slim.close().await;
}

#[tokio::test]
async fn test_unknown_method_and_bad_json() {
    let mock = start_mock_gitlab().await;
    let mut session = Session::start(&mock, ToolMode::Full).await;

    let unknown = session.request(1, "resources/list", json!({})).await;
    assert_eq!(unknown["error"]["code"], -32601);

    session.input.write_all(b"not json\n").await.unwrap();
    let line = session.output.next_line().await.unwrap().unwrap();
    let parse_error: Value = serde_json::from_str(&line).unwrap();
    assert_eq!(parse_error["error"]["code"], -32700);

    session.close().await;
}
