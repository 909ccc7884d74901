//! Tool failure taxonomy.
//!
//! Every failure a tool call can produce resolves to exactly one [`ErrorKind`].
//! Handlers report failures as [`ToolError`]; the dispatcher decides from the
//! kind whether to retry, throttle or surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

use crate::dispatch::RateLimitInfo;

/// Longest slice of a raw response body copied into an error message.
const MAX_BODY_EXCERPT: usize = 500;

/// Closed set of tool failure kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Validation,
    Authentication,
    Permission,
    NotFound,
    RateLimited,
    ServerError,
    Network,
    Timeout,
    Unknown,
}

impl ErrorKind {
    /// Map a transport status code to a kind.
    pub fn from_status(status: u16) -> Self {
        match status {
            400 | 422 => ErrorKind::Validation,
            401 => ErrorKind::Authentication,
            403 => ErrorKind::Permission,
            404 => ErrorKind::NotFound,
            429 => ErrorKind::RateLimited,
            500..=599 => ErrorKind::ServerError,
            _ => ErrorKind::Unknown,
        }
    }

    /// Kinds worth retrying with backoff: the remote may succeed next time.
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            ErrorKind::ServerError | ErrorKind::Network | ErrorKind::Timeout
        )
    }

    /// Wire code used in the failure envelope.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Validation => "VALIDATION",
            ErrorKind::Authentication => "AUTHENTICATION",
            ErrorKind::Permission => "PERMISSION",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::RateLimited => "RATE_LIMITED",
            ErrorKind::ServerError => "SERVER_ERROR",
            ErrorKind::Network => "NETWORK",
            ErrorKind::Timeout => "TIMEOUT",
            ErrorKind::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed tool call, as reported by a handler or produced by the dispatcher.
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct ToolError {
    pub kind: ErrorKind,
    pub message: String,
    pub details: Map<String, Value>,
    /// When the remote budget resets (rate-limited failures only).
    pub reset: Option<DateTime<Utc>>,
    /// Rate-limit metadata observed on the failed response, if any.
    pub rate_limit: Option<RateLimitInfo>,
}

impl ToolError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: Map::new(),
            reset: None,
            rate_limit: None,
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, msg)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, msg)
    }

    pub fn network(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, msg)
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, msg)
    }

    pub fn rate_limited(msg: impl Into<String>, reset: Option<DateTime<Utc>>) -> Self {
        let mut err = Self::new(ErrorKind::RateLimited, msg);
        err.reset = reset;
        if let Some(reset) = reset {
            err.details
                .insert("reset".to_string(), Value::String(reset.to_rfc3339()));
        }
        err
    }

    /// Attach one structured detail.
    pub fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }

    pub fn with_rate_limit(mut self, info: Option<RateLimitInfo>) -> Self {
        self.rate_limit = info;
        self
    }

    /// Build a failure from a non-success HTTP status and its response body.
    ///
    /// GitLab error bodies look like `{"message": ...}` or `{"error": ...}`;
    /// a string message becomes the error text, a structured one (field
    /// errors on 400) goes into `details.errors`.
    pub fn from_status(status: u16, body: &str) -> Self {
        let kind = ErrorKind::from_status(status);
        let parsed: Option<Value> = serde_json::from_str(body).ok();

        let remote_message = parsed
            .as_ref()
            .and_then(|v| v.get("message").or_else(|| v.get("error")))
            .cloned();

        let message = match &remote_message {
            Some(Value::String(s)) => s.clone(),
            Some(_) | None if !body.trim().is_empty() && parsed.is_none() => excerpt(body),
            _ => format!("GitLab responded with HTTP {}", status),
        };

        let mut err = Self::new(kind, message).with_detail("status", status);
        if let Some(structured @ (Value::Object(_) | Value::Array(_))) = remote_message {
            err.details.insert("errors".to_string(), structured);
        }
        err
    }
}

impl From<reqwest::Error> for ToolError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ToolError::timeout(format!("request timed out: {}", e))
        } else if e.is_connect() || e.is_request() || e.is_body() {
            ToolError::network(format!("connection failed: {}", e))
        } else if let Some(status) = e.status() {
            ToolError::from_status(status.as_u16(), "")
        } else {
            ToolError::new(ErrorKind::Unknown, e.to_string())
        }
    }
}

fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(MAX_BODY_EXCERPT) {
        Some((idx, _)) => format!("{}…", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}
