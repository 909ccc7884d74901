//! Application error types.
//!
//! All errors use `thiserror` for automatic Error trait derivation and provide
//! clear error messages with context. Failures of individual tool calls are
//! NOT modelled here; they travel as [`ToolError`](super::ToolError) inside a
//! response envelope.

use thiserror::Error;

/// Application result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error enum for the GitLab MCP server.
#[derive(Error, Debug)]
pub enum Error {
    /// Startup-time configuration errors (bad config, duplicate tool names).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Malformed protocol input (map to JSON-RPC INVALID_PARAMS).
    #[error("validation error: {0}")]
    Validation(String),

    /// Unknown tool, method or resource (map to JSON-RPC METHOD_NOT_FOUND).
    #[error("not found: {0}")]
    NotFound(String),

    /// The caller withdrew the request before it completed.
    #[error("operation cancelled: {0}")]
    Cancelled(String),

    /// Internal errors (map to JSON-RPC INTERNAL_ERROR).
    #[error("internal error: {0}")]
    Internal(String),

    /// Serialization/deserialization errors.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP client construction errors.
    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O errors.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// JSON-RPC 2.0 reserved error codes.
pub mod jsonrpc_codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;
    /// Server-defined: request was cancelled by the client.
    pub const REQUEST_CANCELLED: i32 = -32800;
}

impl Error {
    /// Convert to a JSON-RPC error code.
    pub fn to_jsonrpc_code(&self) -> i32 {
        match self {
            Error::Validation(_) => jsonrpc_codes::INVALID_PARAMS,
            Error::NotFound(_) => jsonrpc_codes::METHOD_NOT_FOUND,
            Error::Serialization(_) => jsonrpc_codes::PARSE_ERROR,
            Error::Cancelled(_) => jsonrpc_codes::REQUEST_CANCELLED,
            Error::Configuration(_) | Error::Internal(_) | Error::Http(_) | Error::Io(_) => {
                jsonrpc_codes::INTERNAL_ERROR
            }
        }
    }
}

// Convenience constructors
impl Error {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Cancelled(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
