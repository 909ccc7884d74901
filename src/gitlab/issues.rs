//! Issue tools.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

use super::{body_fields, filter_query, id_arg, int_arg, page_query, str_arg, GitLabClient};
use crate::tools::{HandlerOutput, InputSchema, ParamType, ToolCategory, ToolDescriptor, ToolHandler};
use crate::types::ToolError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueOp {
    List,
    Get,
    Create,
}

#[derive(Debug, Clone)]
pub struct IssuesHandler {
    client: GitLabClient,
    op: IssueOp,
}

impl IssuesHandler {
    pub fn new(client: GitLabClient, op: IssueOp) -> Self {
        Self { client, op }
    }
}

#[async_trait]
impl ToolHandler for IssuesHandler {
    async fn call(&self, args: Map<String, Value>) -> Result<HandlerOutput, ToolError> {
        let project = id_arg(&args, "project_id")?;
        match self.op {
            IssueOp::List => {
                let mut query = page_query(&args)?;
                query.extend(filter_query(&args, &["state", "labels", "search", "assignee_username"]));
                Ok(self
                    .client
                    .get(&format!("/projects/{}/issues", project), &query)
                    .await?
                    .into_list_output())
            }
            IssueOp::Get => {
                let iid = int_arg(&args, "issue_iid")?;
                Ok(self
                    .client
                    .get(&format!("/projects/{}/issues/{}", project, iid), &[])
                    .await?
                    .into_output())
            }
            IssueOp::Create => {
                str_arg(&args, "title")?;
                let body = body_fields(&args, &["title", "description", "labels", "assignee_ids", "confidential"]);
                Ok(self
                    .client
                    .post(&format!("/projects/{}/issues", project), &Value::Object(body))
                    .await?
                    .into_output())
            }
        }
    }
}

pub fn descriptors(client: &GitLabClient) -> Vec<ToolDescriptor> {
    let handler = |op| Arc::new(IssuesHandler::new(client.clone(), op)) as Arc<dyn ToolHandler>;
    let project = || InputSchema::new().required("project_id", ParamType::Id, "Project id or URL path");
    vec![
        ToolDescriptor::read(
            "list_issues",
            "List issues in a project",
            ToolCategory::Issues,
            project()
                .optional("state", ParamType::String, "opened, closed or all")
                .optional("labels", ParamType::String, "Comma-separated label names")
                .optional("search", ParamType::String, "Search title and description")
                .optional("assignee_username", ParamType::String, "Filter by assignee")
                .paginated(),
            handler(IssueOp::List),
        ),
        ToolDescriptor::read(
            "get_issue",
            "Get a single issue by its project-scoped iid",
            ToolCategory::Issues,
            project().required("issue_iid", ParamType::Integer, "Issue iid"),
            handler(IssueOp::Get),
        ),
        ToolDescriptor::write(
            "create_issue",
            "Create a new issue",
            ToolCategory::Issues,
            project()
                .required("title", ParamType::String, "Issue title")
                .optional("description", ParamType::String, "Markdown description")
                .optional("labels", ParamType::String, "Comma-separated label names")
                .optional("assignee_ids", ParamType::Array, "User ids to assign")
                .optional("confidential", ParamType::Boolean, "Create as confidential"),
            handler(IssueOp::Create),
        ),
    ]
}
