//! MCP transport layer.
//!
//! JSON-RPC 2.0 over newline-delimited stdio or streamable HTTP. Both
//! transports feed the same [`McpServer`] router.

pub mod codec;
pub mod http;
pub mod protocol;
pub mod router;
pub mod stdio;

pub use router::McpServer;
