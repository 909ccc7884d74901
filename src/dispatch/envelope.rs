//! Response envelope returned for every tool call.
//!
//! Wire format:
//! ```text
//! { "success": true,  "data": ..., "metadata": { "rate_limit_remaining", "rate_limit_reset", "execution_time_ms" } }
//! { "success": false, "error": { "code", "message", "details" } }
//! ```

use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::types::{ErrorKind, ToolError};

/// Per-call metadata attached to successful responses.
///
/// Both rate-limit fields are nullable on the wire: before GitLab has sent
/// any `RateLimit-*` headers they serialize as `null`, not as an integer and
/// an ISO 8601 timestamp.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseMetadata {
    /// Remaining remote budget, `null` until GitLab has reported one.
    pub rate_limit_remaining: Option<u64>,
    /// Window reset as RFC 3339, `null` until GitLab has reported one.
    pub rate_limit_reset: Option<DateTime<Utc>>,
    pub execution_time_ms: u64,
}

/// Failure body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorBody {
    pub code: ErrorKind,
    pub message: String,
    pub details: Map<String, Value>,
}

impl From<ToolError> for ErrorBody {
    fn from(err: ToolError) -> Self {
        Self {
            code: err.kind,
            message: err.message,
            details: err.details,
        }
    }
}

/// Outcome of one dispatch. Built fresh per call.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseEnvelope {
    Success {
        data: Value,
        metadata: ResponseMetadata,
    },
    Failure {
        error: ErrorBody,
        /// Kept for logging only; not part of the failure wire format.
        execution_time_ms: u64,
    },
}

impl ResponseEnvelope {
    pub fn is_success(&self) -> bool {
        matches!(self, ResponseEnvelope::Success { .. })
    }

    pub fn data(&self) -> Option<&Value> {
        match self {
            ResponseEnvelope::Success { data, .. } => Some(data),
            ResponseEnvelope::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&ErrorBody> {
        match self {
            ResponseEnvelope::Success { .. } => None,
            ResponseEnvelope::Failure { error, .. } => Some(error),
        }
    }

    pub fn execution_time_ms(&self) -> u64 {
        match self {
            ResponseEnvelope::Success { metadata, .. } => metadata.execution_time_ms,
            ResponseEnvelope::Failure {
                execution_time_ms, ..
            } => *execution_time_ms,
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|e| {
            serde_json::json!({
                "success": false,
                "error": {
                    "code": ErrorKind::Unknown,
                    "message": format!("envelope serialization failed: {}", e),
                    "details": {},
                }
            })
        })
    }
}

impl Serialize for ResponseEnvelope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ResponseEnvelope::Success { data, metadata } => {
                let mut map = serializer.serialize_map(Some(3))?;
                map.serialize_entry("success", &true)?;
                map.serialize_entry("data", data)?;
                map.serialize_entry("metadata", metadata)?;
                map.end()
            }
            ResponseEnvelope::Failure { error, .. } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("success", &false)?;
                map.serialize_entry("error", error)?;
                map.end()
            }
        }
    }
}
