//! Core types for the GitLab MCP server.
//!
//! This module provides foundational types used throughout the system:
//! - **Errors**: Application error type with thiserror derives
//! - **Taxonomy**: The closed set of tool failure kinds
//! - **Config**: Configuration structures for server, GitLab and dispatch
//! - **Pagination**: Page windows shared by list tools

mod config;
mod errors;
mod pagination;
mod taxonomy;

pub use config::{
    Config, DispatchConfig, GitLabConfig, ObservabilityConfig, ServerConfig, ThrottlePolicy,
    ToolMode, TransportConfig, TransportKind,
};
pub use errors::{jsonrpc_codes, Error, Result};
pub use pagination::{PaginationRequest, PaginationResponse, DEFAULT_PER_PAGE, MAX_PER_PAGE};
pub use taxonomy::{ErrorKind, ToolError};
