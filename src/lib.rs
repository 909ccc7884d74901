//! # GitLab MCP - tool dispatch core
//!
//! Exposes the GitLab REST API as Model Context Protocol tools:
//! - Tool registry with typed input schemas and argument validation
//! - Dispatcher with retry/backoff and rate-limit throttling
//! - Stable error taxonomy for GitLab failures
//! - Slim mode: the whole catalog behind three meta-tools
//! - stdio and streamable HTTP transports
//!
//! ## Architecture
//!
//! ```text
//!   stdio / HTTP ──► McpServer ──► Dispatcher ──► validate ──► ToolHandler ──► GitLab
//!                       │              │                            │
//!                   SlimProxy    RateLimitTracker ◄──── RateLimit-* headers
//! ```

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]
#![warn(rust_2018_idioms)]

pub mod dispatch;
pub mod gitlab;
pub mod mcp;
pub mod tools;
pub mod types;

pub mod observability;

pub use types::{Config, Error, Result};

use std::sync::Arc;

use dispatch::{Dispatcher, RateLimitTracker, Redactor};
use gitlab::GitLabClient;
use mcp::McpServer;
use tools::ToolRegistry;

/// Wire a server from configuration: client, registry, tracker, dispatcher.
pub fn build_server(config: &Config) -> Result<McpServer> {
    let client = GitLabClient::new(&config.gitlab)?;
    let mut registry = ToolRegistry::new();
    gitlab::register_all(&mut registry, &client)?;

    let dispatcher = Dispatcher::new(
        Arc::new(registry),
        Arc::new(RateLimitTracker::new()),
        &config.dispatch,
    )
    .with_redactor(Redactor::new([config.gitlab.token.clone()]));

    Ok(McpServer::new(Arc::new(dispatcher), config.server.mode))
}
