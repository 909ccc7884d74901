//! Slim mode: the whole catalog behind three meta-tools.
//!
//! Hosts with small tool budgets see only `discover_tools`,
//! `get_tool_schema` and `execute_tool`. Every registered tool stays callable
//! through `execute_tool`, which hands off to the same [`Dispatcher`] a
//! direct call uses, so results are identical either way.

use serde_json::{json, Map, Value};
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::catalog::ToolCategory;
use super::schema::{InputSchema, ParamType};
use crate::dispatch::{Dispatcher, ResponseEnvelope};
use crate::types::{Result, ToolError};

/// The three meta-tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaTool {
    DiscoverTools,
    GetToolSchema,
    ExecuteTool,
}

impl MetaTool {
    pub const ALL: [MetaTool; 3] = [
        MetaTool::DiscoverTools,
        MetaTool::GetToolSchema,
        MetaTool::ExecuteTool,
    ];

    pub fn name(self) -> &'static str {
        match self {
            MetaTool::DiscoverTools => "discover_tools",
            MetaTool::GetToolSchema => "get_tool_schema",
            MetaTool::ExecuteTool => "execute_tool",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.name() == name)
    }

    fn description(self) -> &'static str {
        match self {
            MetaTool::DiscoverTools => {
                "List available GitLab tools (name, description, category), optionally filtered by category"
            }
            MetaTool::GetToolSchema => "Get the full input schema of one GitLab tool",
            MetaTool::ExecuteTool => "Execute a GitLab tool by name with the given arguments",
        }
    }

    pub fn input_schema(self) -> InputSchema {
        match self {
            MetaTool::DiscoverTools => InputSchema::new().optional(
                "category",
                ParamType::String,
                "One of: projects, issues, merge_requests, pipelines, repository, users",
            ),
            MetaTool::GetToolSchema => {
                InputSchema::new().required("tool_name", ParamType::String, "Tool name")
            }
            MetaTool::ExecuteTool => InputSchema::new()
                .required("tool_name", ParamType::String, "Tool name")
                .optional("arguments", ParamType::Object, "Arguments for the tool"),
        }
    }

    /// Entry for `tools/list`.
    pub fn to_listing(self) -> Value {
        json!({
            "name": self.name(),
            "description": self.description(),
            "inputSchema": self.input_schema().to_json_schema(),
        })
    }
}

/// Routes meta-tool calls onto the shared dispatcher.
#[derive(Debug, Clone)]
pub struct SlimProxy {
    dispatcher: Arc<Dispatcher>,
}

impl SlimProxy {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    /// `tools/list` entries in slim mode.
    pub fn listing(&self) -> Vec<Value> {
        MetaTool::ALL.into_iter().map(MetaTool::to_listing).collect()
    }

    /// Handle one meta-tool call. Cancellation only surfaces from
    /// `execute_tool`; the other two never suspend.
    pub async fn call(
        &self,
        name: &str,
        arguments: &Value,
        cancel: &CancellationToken,
    ) -> Result<ResponseEnvelope> {
        let started = Instant::now();
        let Some(meta) = MetaTool::parse(name) else {
            let err = ToolError::not_found(format!("Unknown tool: {}", name)).with_detail("tool", name);
            return Ok(self.dispatcher.failure(started, err));
        };

        let args = match meta.input_schema().validate(arguments) {
            Ok(args) => args,
            Err(violation) => return Ok(self.dispatcher.failure(started, violation.into())),
        };

        let outcome = match meta {
            MetaTool::DiscoverTools => self.discover_tools(&args),
            MetaTool::GetToolSchema => self.get_tool_schema(&args),
            MetaTool::ExecuteTool => {
                let tool = str_arg(&args, "tool_name");
                let inner = args.get("arguments").cloned().unwrap_or(Value::Null);
                tracing::debug!(tool, "slim execute_tool");
                return self.dispatcher.dispatch(tool, &inner, cancel).await;
            }
        };

        Ok(match outcome {
            Ok(data) => self.dispatcher.success(started, data),
            Err(err) => self.dispatcher.failure(started, err),
        })
    }

    fn discover_tools(&self, args: &Map<String, Value>) -> std::result::Result<Value, ToolError> {
        let category = match args.get("category").and_then(Value::as_str) {
            None => None,
            Some(raw) => Some(ToolCategory::parse(raw).ok_or_else(|| {
                let allowed: Vec<&str> = ToolCategory::ALL.iter().map(|c| c.as_str()).collect();
                ToolError::validation(format!("unknown category '{}'", raw))
                    .with_detail("field", "category")
                    .with_detail("expected", allowed.join("|"))
            })?),
        };

        let tools: Vec<Value> = self
            .dispatcher
            .registry()
            .list(category)
            .map(|d| d.to_summary())
            .collect();
        Ok(json!({ "count": tools.len(), "tools": tools }))
    }

    fn get_tool_schema(&self, args: &Map<String, Value>) -> std::result::Result<Value, ToolError> {
        let name = str_arg(args, "tool_name");
        self.dispatcher
            .registry()
            .lookup(name)
            .map(|d| d.to_schema_view())
            .map_err(|_| {
                ToolError::not_found(format!("Unknown tool: {}", name)).with_detail("tool", name)
            })
    }
}

/// Validated string argument; validation guarantees presence for required
/// parameters.
fn str_arg<'a>(args: &'a Map<String, Value>, key: &str) -> &'a str {
    args.get(key).and_then(Value::as_str).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::RateLimitTracker;
    use crate::tools::{HandlerOutput, MockToolHandler, ToolDescriptor, ToolRegistry};
    use crate::types::{DispatchConfig, ErrorKind};
    use pretty_assertions::assert_eq;

    fn echo() -> Arc<MockToolHandler> {
        let mut mock = MockToolHandler::new();
        mock.expect_call()
            .returning(|args| Ok(HandlerOutput::new(json!({ "echo": Value::Object(args) }))));
        Arc::new(mock)
    }

    fn proxy() -> SlimProxy {
        let id = || InputSchema::new().required("project_id", ParamType::Id, "Project");
        let mut registry = ToolRegistry::new();
        registry
            .register_all([
                ToolDescriptor::read("list_projects", "List projects", ToolCategory::Projects, InputSchema::new().paginated(), echo()),
                ToolDescriptor::read("list_issues", "List issues", ToolCategory::Issues, id().paginated(), echo()),
                ToolDescriptor::read(
                    "get_issue",
                    "Get one issue",
                    ToolCategory::Issues,
                    id().required("issue_iid", ParamType::Integer, "Issue iid"),
                    echo(),
                ),
                ToolDescriptor::read("get_pipeline", "Get a pipeline", ToolCategory::Pipelines, id(), echo()),
                ToolDescriptor::write("create_issue", "Create an issue", ToolCategory::Issues, id(), echo()),
            ])
            .unwrap();
        let dispatcher = Dispatcher::new(
            Arc::new(registry),
            Arc::new(RateLimitTracker::new()),
            &DispatchConfig::default(),
        );
        SlimProxy::new(Arc::new(dispatcher))
    }

    fn comparable(envelope: &ResponseEnvelope) -> Value {
        let mut v = envelope.to_value();
        if let Some(m) = v.get_mut("metadata").and_then(Value::as_object_mut) {
            m.remove("execution_time_ms");
        }
        if let Some(o) = v.as_object_mut() {
            o.remove("execution_time_ms");
        }
        v
    }

    #[tokio::test]
    async fn test_execute_tool_matches_direct_call() {
        let proxy = proxy();
        let cancel = CancellationToken::new();
        let args = json!({"project_id": 1, "issue_iid": 5});

        let direct = proxy.dispatcher.dispatch("get_issue", &args, &cancel).await.unwrap();
        let slim = proxy
            .call("execute_tool", &json!({"tool_name": "get_issue", "arguments": args}), &cancel)
            .await
            .unwrap();

        assert!(slim.is_success());
        assert_eq!(comparable(&slim), comparable(&direct));
    }

    #[tokio::test]
    async fn test_execute_tool_failures_match_direct_call() {
        let proxy = proxy();
        let cancel = CancellationToken::new();
        let args = json!({"project_id": 1});

        let direct = proxy.dispatcher.dispatch("get_issue", &args, &cancel).await.unwrap();
        let slim = proxy
            .call("execute_tool", &json!({"tool_name": "get_issue", "arguments": args}), &cancel)
            .await
            .unwrap();

        assert_eq!(slim.error().unwrap().code, ErrorKind::Validation);
        assert_eq!(comparable(&slim), comparable(&direct));

        let unknown = proxy
            .call("execute_tool", &json!({"tool_name": "nope"}), &cancel)
            .await
            .unwrap();
        assert_eq!(unknown.error().unwrap().code, ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_discover_tools_filters_by_category_in_order() {
        let proxy = proxy();
        let envelope = proxy
            .call("discover_tools", &json!({"category": "issues"}), &CancellationToken::new())
            .await
            .unwrap();

        let data = envelope.data().unwrap();
        assert_eq!(data["count"], 3);
        let tools = data["tools"].as_array().unwrap();
        let names: Vec<&str> = tools.iter().map(|t| t["name"].as_str().unwrap()).collect();
        assert_eq!(names, vec!["list_issues", "get_issue", "create_issue"]);
        assert!(tools.iter().all(|t| t["category"] == "issues"));
        assert!(tools.iter().all(|t| t.get("inputSchema").is_none()));
    }

    #[tokio::test]
    async fn test_discover_tools_without_category_lists_everything() {
        let proxy = proxy();
        let envelope = proxy
            .call("discover_tools", &json!({}), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(envelope.data().unwrap()["count"], 5);
    }

    #[tokio::test]
    async fn test_discover_tools_rejects_unknown_category() {
        let proxy = proxy();
        let envelope = proxy
            .call("discover_tools", &json!({"category": "wikis"}), &CancellationToken::new())
            .await
            .unwrap();
        let error = envelope.error().unwrap();
        assert_eq!(error.code, ErrorKind::Validation);
        assert_eq!(error.details["field"], "category");
    }

    #[tokio::test]
    async fn test_get_tool_schema() {
        let proxy = proxy();
        let cancel = CancellationToken::new();

        let found = proxy
            .call("get_tool_schema", &json!({"tool_name": "get_issue"}), &cancel)
            .await
            .unwrap();
        let data = found.data().unwrap();
        assert_eq!(data["category"], "issues");
        assert_eq!(
            data["inputSchema"]["required"],
            json!(["project_id", "issue_iid"])
        );

        let missing = proxy
            .call("get_tool_schema", &json!({"tool_name": "nope"}), &cancel)
            .await
            .unwrap();
        assert_eq!(missing.error().unwrap().code, ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_meta_tool_arguments_are_validated() {
        let proxy = proxy();
        let envelope = proxy
            .call("get_tool_schema", &json!({}), &CancellationToken::new())
            .await
            .unwrap();
        let error = envelope.error().unwrap();
        assert_eq!(error.code, ErrorKind::Validation);
        assert_eq!(error.details["field"], "tool_name");
    }

    #[test]
    fn test_listing_has_three_meta_tools() {
        let names: Vec<String> = proxy()
            .listing()
            .iter()
            .map(|t| t["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["discover_tools", "get_tool_schema", "execute_tool"]);
    }
}
