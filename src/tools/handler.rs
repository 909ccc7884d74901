//! Handler interface every tool implementation satisfies.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::dispatch::RateLimitInfo;
use crate::types::ToolError;

/// Successful handler result.
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerOutput {
    pub data: Value,
    /// Rate-limit metadata observed on the remote response, if any.
    pub rate_limit: Option<RateLimitInfo>,
}

impl HandlerOutput {
    pub fn new(data: Value) -> Self {
        Self {
            data,
            rate_limit: None,
        }
    }

    pub fn with_rate_limit(mut self, info: Option<RateLimitInfo>) -> Self {
        self.rate_limit = info;
        self
    }
}

/// An async tool operation.
///
/// Arguments have already been validated against the tool's input schema
/// when `call` runs. Failures must be reported as a [`ToolError`] of the
/// matching kind.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, arguments: Map<String, Value>) -> Result<HandlerOutput, ToolError>;
}
