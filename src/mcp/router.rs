//! MCP method router: maps JSON-RPC methods onto the dispatcher.

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::protocol::{
    tool_call_result, InitializeParams, InitializeResult, JsonRpcRequest, JsonRpcResponse,
    ToolCallParams, JSONRPC_VERSION,
};
use crate::dispatch::{Dispatcher, ResponseEnvelope};
use crate::tools::SlimProxy;
use crate::types::{jsonrpc_codes, Error, Result, ToolMode};

/// Transport-agnostic MCP server.
#[derive(Debug, Clone)]
pub struct McpServer {
    dispatcher: Arc<Dispatcher>,
    slim: SlimProxy,
    mode: ToolMode,
}

impl McpServer {
    pub fn new(dispatcher: Arc<Dispatcher>, mode: ToolMode) -> Self {
        Self {
            slim: SlimProxy::new(dispatcher.clone()),
            dispatcher,
            mode,
        }
    }

    pub fn mode(&self) -> ToolMode {
        self.mode
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Handle one request.
    ///
    /// Returns `None` when no response must be written: for notifications
    /// and for requests cancelled while in flight.
    pub async fn handle(
        &self,
        request: JsonRpcRequest,
        cancel: &CancellationToken,
    ) -> Option<JsonRpcResponse> {
        let id = request.id.clone();
        let notification = request.is_notification();

        if request.jsonrpc != JSONRPC_VERSION {
            return (!notification).then(|| {
                JsonRpcResponse::error(
                    id,
                    jsonrpc_codes::INVALID_REQUEST,
                    format!("Unsupported jsonrpc version: {}", request.jsonrpc),
                )
            });
        }

        let result = match request.method.as_str() {
            "initialize" => self.initialize(request.params),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(self.tools_list()),
            "tools/call" => self.tools_call(request.params, cancel).await,
            method if notification => {
                tracing::debug!(method, "notification");
                return None;
            }
            method => Err(Error::not_found(format!("Method not found: {}", method))),
        };

        if notification {
            return None;
        }
        match result {
            Ok(value) => Some(JsonRpcResponse::success(id, value)),
            Err(Error::Cancelled(_)) => None,
            Err(Error::NotFound(msg)) => Some(JsonRpcResponse::error(
                id,
                jsonrpc_codes::METHOD_NOT_FOUND,
                msg,
            )),
            Err(e) => Some(JsonRpcResponse::error(id, e.to_jsonrpc_code(), e.to_string())),
        }
    }

    fn initialize(&self, params: Value) -> Result<Value> {
        let params: InitializeParams = if params.is_null() {
            InitializeParams::default()
        } else {
            parse_params(params)?
        };
        if let Some(client) = &params.client_info {
            tracing::info!(client = %client.name, version = %client.version, "client initialized");
        }
        Ok(serde_json::to_value(InitializeResult::new(params.protocol_version))?)
    }

    fn tools_list(&self) -> Value {
        let tools: Vec<Value> = match self.mode {
            ToolMode::Full => self
                .dispatcher
                .registry()
                .list(None)
                .map(|d| d.to_listing())
                .collect(),
            ToolMode::Slim => self.slim.listing(),
        };
        json!({ "tools": tools })
    }

    async fn tools_call(&self, params: Value, cancel: &CancellationToken) -> Result<Value> {
        let params: ToolCallParams = parse_params(params)?;
        let envelope: ResponseEnvelope = match self.mode {
            ToolMode::Full => {
                self.dispatcher
                    .dispatch(&params.name, &params.arguments, cancel)
                    .await?
            }
            ToolMode::Slim => self.slim.call(&params.name, &params.arguments, cancel).await?,
        };
        Ok(tool_call_result(&envelope))
    }
}

/// Parse one raw message. On failure, the error response to send back.
pub fn parse_message(raw: &str) -> std::result::Result<JsonRpcRequest, JsonRpcResponse> {
    let value: Value = serde_json::from_str(raw).map_err(|e| {
        JsonRpcResponse::error(None, jsonrpc_codes::PARSE_ERROR, format!("Parse error: {}", e))
    })?;
    let id = value.get("id").cloned();
    serde_json::from_value(value).map_err(|e| {
        JsonRpcResponse::error(id, jsonrpc_codes::INVALID_REQUEST, format!("Invalid request: {}", e))
    })
}

fn parse_params<T: DeserializeOwned>(params: Value) -> Result<T> {
    serde_json::from_value(params).map_err(|e| Error::validation(format!("Invalid params: {}", e)))
}
