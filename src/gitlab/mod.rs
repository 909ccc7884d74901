//! GitLab tool handlers.
//!
//! One handler type per category; each carries an operation enum and a
//! shared [`GitLabClient`]. [`register_all`] builds every descriptor.

pub mod client;
pub mod issues;
pub mod merge_requests;
pub mod pipelines;
pub mod projects;

pub use client::{encode_id, ApiResponse, GitLabClient};

use serde_json::{Map, Value};

use crate::tools::ToolRegistry;
use crate::types::{PaginationRequest, Result, ToolError, DEFAULT_PER_PAGE};

/// Register every GitLab tool, in category order.
pub fn register_all(registry: &mut ToolRegistry, client: &GitLabClient) -> Result<()> {
    registry.register_all(projects::descriptors(client))?;
    registry.register_all(issues::descriptors(client))?;
    registry.register_all(merge_requests::descriptors(client))?;
    registry.register_all(pipelines::descriptors(client))?;
    tracing::info!(tools = registry.len(), "registered GitLab tools");
    Ok(())
}

// =============================================================================
// Argument helpers; arguments are schema-validated before handlers run
// =============================================================================

type ArgResult<T> = std::result::Result<T, ToolError>;

fn missing(key: &str) -> ToolError {
    ToolError::validation(format!("missing required field '{}'", key)).with_detail("field", key)
}

/// Project/group id as a URL path segment.
pub(crate) fn id_arg(args: &Map<String, Value>, key: &str) -> ArgResult<String> {
    match args.get(key) {
        Some(v @ (Value::String(_) | Value::Number(_))) => Ok(encode_id(v)),
        _ => Err(missing(key)),
    }
}

/// Positive integer (iids, pipeline ids).
pub(crate) fn int_arg(args: &Map<String, Value>, key: &str) -> ArgResult<u64> {
    let value = args.get(key).ok_or_else(|| missing(key))?;
    value.as_u64().filter(|n| *n > 0).ok_or_else(|| {
        ToolError::validation(format!("'{}' must be a positive integer", key))
            .with_detail("field", key)
            .with_detail("expected", "positive integer")
    })
}

pub(crate) fn str_arg<'a>(args: &'a Map<String, Value>, key: &str) -> ArgResult<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| missing(key))
}

/// `page` / `per_page` query, defaulting to page 1 of 20.
pub(crate) fn page_query(args: &Map<String, Value>) -> ArgResult<Vec<(&'static str, String)>> {
    let number = |key: &str, default: u32| -> ArgResult<u32> {
        let out_of_range =
            || ToolError::validation(format!("'{}' is out of range", key)).with_detail("field", key);
        match args.get(key) {
            None | Some(Value::Null) => Ok(default),
            Some(v) => v
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(out_of_range),
        }
    };
    let request = PaginationRequest::new(number("page", 1)?, number("per_page", DEFAULT_PER_PAGE)?)
        .map_err(|e| ToolError::validation(e.to_string()))?;
    Ok(request.to_query().into())
}

/// Copy the optional scalar filters that are present into query parameters.
pub(crate) fn filter_query(
    args: &Map<String, Value>,
    keys: &[&'static str],
) -> Vec<(&'static str, String)> {
    keys.iter()
        .filter_map(|&key| match args.get(key) {
            Some(Value::String(s)) => Some((key, s.clone())),
            Some(v @ (Value::Bool(_) | Value::Number(_))) => Some((key, v.to_string())),
            _ => None,
        })
        .collect()
}

/// Copy the optional fields that are present into a request body.
pub(crate) fn body_fields(args: &Map<String, Value>, keys: &[&str]) -> Map<String, Value> {
    keys.iter()
        .filter_map(|&key| {
            args.get(key)
                .filter(|v| !v.is_null())
                .map(|v| (key.to_string(), v.clone()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ErrorKind, GitLabConfig};
    use serde_json::json;

    fn args(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_register_all_registers_every_category() {
        let client = GitLabClient::new(&GitLabConfig::default()).unwrap();
        let mut registry = ToolRegistry::new();
        register_all(&mut registry, &client).unwrap();

        let names: Vec<&str> = registry.list(None).map(|d| d.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "list_projects",
                "get_project",
                "list_issues",
                "get_issue",
                "create_issue",
                "list_merge_requests",
                "get_merge_request",
                "create_merge_request",
                "list_pipelines",
                "get_pipeline",
                "retry_pipeline",
            ]
        );
        assert!(!registry.lookup("create_issue").unwrap().idempotent);
        assert!(registry.lookup("get_issue").unwrap().idempotent);
    }

    #[test]
    fn test_page_query_defaults_and_bounds() {
        assert_eq!(
            page_query(&Map::new()).unwrap(),
            vec![("page", "1".to_string()), ("per_page", "20".to_string())]
        );
        let err = page_query(&args(json!({"per_page": 500}))).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert!(page_query(&args(json!({"page": 0}))).is_err());

        let err = page_query(&args(json!({"page": -3, "per_page": -5}))).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert_eq!(err.details["field"], "page");
        let err = page_query(&args(json!({"per_page": -5}))).unwrap_err();
        assert_eq!(err.details["field"], "per_page");
    }

    #[test]
    fn test_id_and_int_args() {
        let a = args(json!({"project_id": "g/p", "issue_iid": 0}));
        assert_eq!(id_arg(&a, "project_id").unwrap(), "g%2Fp");
        assert_eq!(int_arg(&a, "issue_iid").unwrap_err().kind, ErrorKind::Validation);
        assert!(id_arg(&a, "group_id").is_err());
    }

    #[test]
    fn test_filter_query_skips_absent_and_null() {
        let a = args(json!({"state": "opened", "archived": false, "labels": null}));
        assert_eq!(
            filter_query(&a, &["state", "archived", "labels", "search"]),
            vec![("state", "opened".to_string()), ("archived", "false".to_string())]
        );
    }
}
