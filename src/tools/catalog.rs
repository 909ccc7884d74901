//! Tool registry: descriptors keyed by unique name, kept in registration order.
//!
//! Built once at startup, then shared read-only behind an `Arc`.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::handler::ToolHandler;
use super::schema::InputSchema;
use crate::types::{Error, Result};

// =============================================================================
// Categories
// =============================================================================

/// Tool category, used to group tools in discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCategory {
    Projects,
    Issues,
    MergeRequests,
    Pipelines,
    Repository,
    Users,
}

impl ToolCategory {
    pub const ALL: [ToolCategory; 6] = [
        ToolCategory::Projects,
        ToolCategory::Issues,
        ToolCategory::MergeRequests,
        ToolCategory::Pipelines,
        ToolCategory::Repository,
        ToolCategory::Users,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ToolCategory::Projects => "projects",
            ToolCategory::Issues => "issues",
            ToolCategory::MergeRequests => "merge_requests",
            ToolCategory::Pipelines => "pipelines",
            ToolCategory::Repository => "repository",
            ToolCategory::Users => "users",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == raw)
    }
}

impl fmt::Display for ToolCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Descriptor
// =============================================================================

/// Registered metadata for one tool, plus the handler that runs it.
#[derive(Clone)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub category: ToolCategory,
    pub input_schema: InputSchema,
    /// Safe to repeat after a transient failure (reads are, writes are not).
    pub idempotent: bool,
    pub handler: Arc<dyn ToolHandler>,
}

impl fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("name", &self.name)
            .field("category", &self.category)
            .field("idempotent", &self.idempotent)
            .field("params", &self.input_schema.params.len())
            .finish_non_exhaustive()
    }
}

impl ToolDescriptor {
    /// A read-only tool.
    pub fn read(
        name: &str,
        description: &str,
        category: ToolCategory,
        input_schema: InputSchema,
        handler: Arc<dyn ToolHandler>,
    ) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            category,
            input_schema,
            idempotent: true,
            handler,
        }
    }

    /// A tool with remote side effects; never retried automatically.
    pub fn write(
        name: &str,
        description: &str,
        category: ToolCategory,
        input_schema: InputSchema,
        handler: Arc<dyn ToolHandler>,
    ) -> Self {
        Self {
            idempotent: false,
            ..Self::read(name, description, category, input_schema, handler)
        }
    }

    /// Entry for `tools/list`.
    pub fn to_listing(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "inputSchema": self.input_schema.to_json_schema(),
        })
    }

    /// Schema-free summary used by discovery.
    pub fn to_summary(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "category": self.category,
        })
    }

    /// Full view including the input schema.
    pub fn to_schema_view(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "category": self.category,
            "inputSchema": self.input_schema.to_json_schema(),
        })
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Ordered tool registry.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    entries: Vec<ToolDescriptor>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Register a descriptor. All checks run before anything is stored, so a
    /// rejected descriptor leaves the registry untouched.
    pub fn register(&mut self, descriptor: ToolDescriptor) -> Result<()> {
        if descriptor.name.trim().is_empty() {
            return Err(Error::configuration("Tool name cannot be empty"));
        }
        if self.index.contains_key(&descriptor.name) {
            return Err(Error::configuration(format!(
                "Duplicate tool name: {}",
                descriptor.name
            )));
        }
        descriptor.input_schema.check().map_err(|e| {
            Error::configuration(format!("Tool {}: {}", descriptor.name, e))
        })?;

        tracing::debug!(tool = %descriptor.name, category = %descriptor.category, "registered tool");
        self.index
            .insert(descriptor.name.clone(), self.entries.len());
        self.entries.push(descriptor);
        Ok(())
    }

    /// Register several descriptors, stopping at the first failure.
    pub fn register_all(&mut self, descriptors: impl IntoIterator<Item = ToolDescriptor>) -> Result<()> {
        descriptors.into_iter().try_for_each(|d| self.register(d))
    }

    pub fn lookup(&self, name: &str) -> Result<&ToolDescriptor> {
        self.index
            .get(name)
            .map(|&i| &self.entries[i])
            .ok_or_else(|| Error::not_found(format!("Unknown tool: {}", name)))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Descriptors in registration order, optionally limited to a category.
    /// The iterator is lazy and can be cloned to restart it.
    pub fn list(
        &self,
        category: Option<ToolCategory>,
    ) -> impl Iterator<Item = &ToolDescriptor> + Clone + '_ {
        self.entries
            .iter()
            .filter(move |d| category.map_or(true, |c| d.category == c))
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::handler::{HandlerOutput, MockToolHandler};
    use crate::tools::schema::ParamType;

    fn handler() -> Arc<dyn ToolHandler> {
        let mut mock = MockToolHandler::new();
        mock.expect_call()
            .returning(|_| Ok(HandlerOutput::new(Value::Null)));
        Arc::new(mock)
    }

    fn descriptor(name: &str, category: ToolCategory) -> ToolDescriptor {
        ToolDescriptor::read(
            name,
            &format!("{} tool", name),
            category,
            InputSchema::new().required("project_id", ParamType::Id, "Project"),
            handler(),
        )
    }

    #[test]
    fn test_register_and_lookup_round_trip() {
        let mut registry = ToolRegistry::new();
        let original = descriptor("get_issue", ToolCategory::Issues);
        let handler = original.handler.clone();
        registry.register(original.clone()).unwrap();

        let found = registry.lookup("get_issue").unwrap();
        assert_eq!(found.name, original.name);
        assert_eq!(found.description, original.description);
        assert_eq!(found.category, original.category);
        assert_eq!(found.input_schema, original.input_schema);
        assert_eq!(found.idempotent, original.idempotent);
        assert!(Arc::ptr_eq(&found.handler, &handler));
    }

    #[test]
    fn test_duplicate_name_is_rejected_atomically() {
        let mut registry = ToolRegistry::new();
        registry
            .register(descriptor("get_issue", ToolCategory::Issues))
            .unwrap();

        let mut dup = descriptor("get_issue", ToolCategory::Projects);
        dup.description = "impostor".to_string();
        let err = registry.register(dup).unwrap_err();

        assert!(matches!(err, Error::Configuration(_)));
        assert_eq!(registry.len(), 1);
        let kept = registry.lookup("get_issue").unwrap();
        assert_eq!(kept.description, "get_issue tool");
        assert_eq!(kept.category, ToolCategory::Issues);
    }

    #[test]
    fn test_invalid_schema_is_rejected() {
        let mut registry = ToolRegistry::new();
        let mut bad = descriptor("bad", ToolCategory::Issues);
        bad.input_schema = InputSchema::new()
            .required("x", ParamType::String, "")
            .required("x", ParamType::String, "");
        assert!(matches!(
            registry.register(bad),
            Err(Error::Configuration(_))
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_empty_name_is_rejected() {
        let mut registry = ToolRegistry::new();
        assert!(registry
            .register(descriptor("", ToolCategory::Issues))
            .is_err());
    }

    #[test]
    fn test_lookup_unknown() {
        let registry = ToolRegistry::new();
        assert!(matches!(
            registry.lookup("nope"),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_list_preserves_registration_order_and_filters() {
        let mut registry = ToolRegistry::new();
        registry
            .register_all([
                descriptor("list_issues", ToolCategory::Issues),
                descriptor("get_project", ToolCategory::Projects),
                descriptor("get_issue", ToolCategory::Issues),
                descriptor("create_issue", ToolCategory::Issues),
            ])
            .unwrap();

        let all: Vec<&str> = registry.list(None).map(|d| d.name.as_str()).collect();
        assert_eq!(all, vec!["list_issues", "get_project", "get_issue", "create_issue"]);

        let issues = registry.list(Some(ToolCategory::Issues));
        let restarted = issues.clone();
        let names: Vec<&str> = issues.map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["list_issues", "get_issue", "create_issue"]);
        assert_eq!(restarted.count(), 3);

        assert_eq!(registry.list(Some(ToolCategory::Users)).count(), 0);
    }

    #[test]
    fn test_category_parse() {
        assert_eq!(ToolCategory::parse("merge_requests"), Some(ToolCategory::MergeRequests));
        assert_eq!(ToolCategory::parse("Issues"), None);
        assert_eq!(serde_json::to_value(ToolCategory::Issues).unwrap(), "issues");
    }

    #[test]
    fn test_listing_shapes() {
        let d = descriptor("get_issue", ToolCategory::Issues);
        let listing = d.to_listing();
        assert_eq!(listing["name"], "get_issue");
        assert!(listing.get("inputSchema").is_some());

        let summary = d.to_summary();
        assert_eq!(summary["category"], "issues");
        assert!(summary.get("inputSchema").is_none());
    }
}
