//! Pipeline tools.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

use super::{filter_query, id_arg, int_arg, page_query, GitLabClient};
use crate::tools::{HandlerOutput, InputSchema, ParamType, ToolCategory, ToolDescriptor, ToolHandler};
use crate::types::ToolError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineOp {
    List,
    Get,
    /// Re-run failed jobs. Not idempotent: each call queues new jobs.
    Retry,
}

#[derive(Debug, Clone)]
pub struct PipelinesHandler {
    client: GitLabClient,
    op: PipelineOp,
}

impl PipelinesHandler {
    pub fn new(client: GitLabClient, op: PipelineOp) -> Self {
        Self { client, op }
    }
}

#[async_trait]
impl ToolHandler for PipelinesHandler {
    async fn call(&self, args: Map<String, Value>) -> Result<HandlerOutput, ToolError> {
        let project = id_arg(&args, "project_id")?;
        let base = format!("/projects/{}/pipelines", project);
        let response = match self.op {
            PipelineOp::List => {
                let mut query = page_query(&args)?;
                query.extend(filter_query(&args, &["status", "ref", "sha", "source"]));
                return Ok(self.client.get(&base, &query).await?.into_list_output());
            }
            PipelineOp::Get => {
                let id = int_arg(&args, "pipeline_id")?;
                self.client.get(&format!("{}/{}", base, id), &[]).await?
            }
            PipelineOp::Retry => {
                let id = int_arg(&args, "pipeline_id")?;
                self.client
                    .post(&format!("{}/{}/retry", base, id), &Value::Null)
                    .await?
            }
        };
        Ok(response.into_output())
    }
}

pub fn descriptors(client: &GitLabClient) -> Vec<ToolDescriptor> {
    let handler = |op| Arc::new(PipelinesHandler::new(client.clone(), op)) as Arc<dyn ToolHandler>;
    let pipeline = || {
        InputSchema::new()
            .required("project_id", ParamType::Id, "Project id or URL path")
            .required("pipeline_id", ParamType::Integer, "Pipeline id")
    };
    vec![
        ToolDescriptor::read(
            "list_pipelines",
            "List pipelines in a project",
            ToolCategory::Pipelines,
            InputSchema::new()
                .required("project_id", ParamType::Id, "Project id or URL path")
                .optional("status", ParamType::String, "Filter by status (running, success, failed, ...)")
                .optional("ref", ParamType::String, "Filter by branch or tag")
                .optional("sha", ParamType::String, "Filter by commit SHA")
                .optional("source", ParamType::String, "Filter by trigger source")
                .paginated(),
            handler(PipelineOp::List),
        ),
        ToolDescriptor::read(
            "get_pipeline",
            "Get a single pipeline",
            ToolCategory::Pipelines,
            pipeline(),
            handler(PipelineOp::Get),
        ),
        ToolDescriptor::write(
            "retry_pipeline",
            "Retry the failed jobs of a pipeline",
            ToolCategory::Pipelines,
            pipeline(),
            handler(PipelineOp::Retry),
        ),
    ]
}
