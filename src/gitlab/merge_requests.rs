//! Merge request tools.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

use super::{body_fields, filter_query, id_arg, int_arg, page_query, str_arg, GitLabClient};
use crate::tools::{HandlerOutput, InputSchema, ParamType, ToolCategory, ToolDescriptor, ToolHandler};
use crate::types::ToolError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeRequestOp {
    List,
    Get,
    Create,
}

#[derive(Debug, Clone)]
pub struct MergeRequestsHandler {
    client: GitLabClient,
    op: MergeRequestOp,
}

impl MergeRequestsHandler {
    pub fn new(client: GitLabClient, op: MergeRequestOp) -> Self {
        Self { client, op }
    }
}

#[async_trait]
impl ToolHandler for MergeRequestsHandler {
    async fn call(&self, args: Map<String, Value>) -> Result<HandlerOutput, ToolError> {
        let project = id_arg(&args, "project_id")?;
        let base = format!("/projects/{}/merge_requests", project);
        match self.op {
            MergeRequestOp::List => {
                let mut query = page_query(&args)?;
                query.extend(filter_query(&args, &["state", "target_branch", "source_branch", "labels"]));
                Ok(self.client.get(&base, &query).await?.into_list_output())
            }
            MergeRequestOp::Get => {
                let iid = int_arg(&args, "merge_request_iid")?;
                Ok(self
                    .client
                    .get(&format!("{}/{}", base, iid), &[])
                    .await?
                    .into_output())
            }
            MergeRequestOp::Create => {
                let source = str_arg(&args, "source_branch")?;
                let target = str_arg(&args, "target_branch")?;
                if source == target {
                    return Err(ToolError::validation("source_branch and target_branch must differ")
                        .with_detail("field", "target_branch"));
                }
                let body = body_fields(
                    &args,
                    &["source_branch", "target_branch", "title", "description", "labels", "remove_source_branch", "draft"],
                );
                Ok(self
                    .client
                    .post(&base, &Value::Object(body))
                    .await?
                    .into_output())
            }
        }
    }
}

pub fn descriptors(client: &GitLabClient) -> Vec<ToolDescriptor> {
    let handler = |op| Arc::new(MergeRequestsHandler::new(client.clone(), op)) as Arc<dyn ToolHandler>;
    let project = || InputSchema::new().required("project_id", ParamType::Id, "Project id or URL path");
    vec![
        ToolDescriptor::read(
            "list_merge_requests",
            "List merge requests in a project",
            ToolCategory::MergeRequests,
            project()
                .optional("state", ParamType::String, "opened, closed, locked, merged or all")
                .optional("target_branch", ParamType::String, "Filter by target branch")
                .optional("source_branch", ParamType::String, "Filter by source branch")
                .optional("labels", ParamType::String, "Comma-separated label names")
                .paginated(),
            handler(MergeRequestOp::List),
        ),
        ToolDescriptor::read(
            "get_merge_request",
            "Get a single merge request by its project-scoped iid",
            ToolCategory::MergeRequests,
            project().required("merge_request_iid", ParamType::Integer, "Merge request iid"),
            handler(MergeRequestOp::Get),
        ),
        ToolDescriptor::write(
            "create_merge_request",
            "Open a merge request",
            ToolCategory::MergeRequests,
            project()
                .required("source_branch", ParamType::String, "Branch with the changes")
                .required("target_branch", ParamType::String, "Branch to merge into")
                .required("title", ParamType::String, "Merge request title")
                .optional("description", ParamType::String, "Markdown description")
                .optional("labels", ParamType::String, "Comma-separated label names")
                .optional("remove_source_branch", ParamType::Boolean, "Delete the source branch after merge")
                .optional("draft", ParamType::Boolean, "Open as draft"),
            handler(MergeRequestOp::Create),
        ),
    ]
}
