//! Project tools.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

use super::{filter_query, id_arg, page_query, GitLabClient};
use crate::tools::{HandlerOutput, InputSchema, ParamType, ToolCategory, ToolDescriptor, ToolHandler};
use crate::types::ToolError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectOp {
    List,
    Get,
}

#[derive(Debug, Clone)]
pub struct ProjectsHandler {
    client: GitLabClient,
    op: ProjectOp,
}

impl ProjectsHandler {
    pub fn new(client: GitLabClient, op: ProjectOp) -> Self {
        Self { client, op }
    }
}

#[async_trait]
impl ToolHandler for ProjectsHandler {
    async fn call(&self, args: Map<String, Value>) -> Result<HandlerOutput, ToolError> {
        match self.op {
            ProjectOp::List => {
                let mut query = page_query(&args)?;
                query.extend(filter_query(&args, &["search", "owned", "membership", "archived", "visibility"]));
                Ok(self.client.get("/projects", &query).await?.into_list_output())
            }
            ProjectOp::Get => {
                let project = id_arg(&args, "project_id")?;
                Ok(self
                    .client
                    .get(&format!("/projects/{}", project), &[])
                    .await?
                    .into_output())
            }
        }
    }
}

pub fn descriptors(client: &GitLabClient) -> Vec<ToolDescriptor> {
    let handler = |op| Arc::new(ProjectsHandler::new(client.clone(), op)) as Arc<dyn ToolHandler>;
    vec![
        ToolDescriptor::read(
            "list_projects",
            "List projects visible to the authenticated user",
            ToolCategory::Projects,
            InputSchema::new()
                .optional("search", ParamType::String, "Filter by name")
                .optional("owned", ParamType::Boolean, "Only projects owned by the user")
                .optional("membership", ParamType::Boolean, "Only projects the user is a member of")
                .optional("archived", ParamType::Boolean, "Filter by archived state")
                .optional("visibility", ParamType::String, "public, internal or private")
                .paginated(),
            handler(ProjectOp::List),
        ),
        ToolDescriptor::read(
            "get_project",
            "Get a single project by id or path",
            ToolCategory::Projects,
            InputSchema::new().required("project_id", ParamType::Id, "Project id or URL path"),
            handler(ProjectOp::Get),
        ),
    ]
}
