//! Configuration structures.
//!
//! Configuration is layered: built-in defaults, then an optional JSON config
//! file, then environment variables, then CLI flags (applied by the binary).

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use super::{Error, Result};

/// Global server configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// GitLab connection configuration.
    #[serde(default)]
    pub gitlab: GitLabConfig,

    /// Dispatcher retry and throttle behaviour.
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Wire transport limits.
    #[serde(default)]
    pub transport: TransportConfig,

    /// Observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Which wire transport the server binds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    #[default]
    Stdio,
    Http,
}

/// Which tool surface the server advertises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "snake_case")]
pub enum ToolMode {
    /// Every registered tool is listed and callable directly.
    #[default]
    Full,
    /// Only `discover_tools`, `get_tool_schema` and `execute_tool` are listed.
    Slim,
}

/// What the dispatcher does when the remote budget is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThrottlePolicy {
    /// Sleep until the window resets, if that is within `max_throttle_wait`.
    #[default]
    Wait,
    /// Fail with `RATE_LIMITED` right away.
    Reject,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub transport: TransportKind,

    /// HTTP bind host.
    pub host: String,

    /// HTTP bind port.
    pub port: u16,

    pub mode: ToolMode,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::Stdio,
            host: "127.0.0.1".to_string(),
            port: 8000,
            mode: ToolMode::Full,
        }
    }
}

/// GitLab connection configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct GitLabConfig {
    /// Instance base URL, without the `/api/v4` suffix.
    pub url: String,

    /// Personal access token. Never written back out.
    #[serde(default, skip_serializing)]
    pub token: String,

    /// Per-request deadline.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for GitLabConfig {
    fn default() -> Self {
        Self {
            url: "https://gitlab.com".to_string(),
            token: String::new(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl std::fmt::Debug for GitLabConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitLabConfig")
            .field("url", &self.url)
            .field("token", &if self.token.is_empty() { "<unset>" } else { "<redacted>" })
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Dispatcher retry and throttle configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Retries after the first attempt for transient failures.
    pub max_retries: u32,

    /// Delay before the first retry; doubles per attempt.
    #[serde(with = "humantime_serde")]
    pub initial_backoff: Duration,

    /// Upper bound for a single backoff delay.
    #[serde(with = "humantime_serde")]
    pub max_backoff: Duration,

    /// Longest the dispatcher will sleep waiting for a rate-limit reset.
    #[serde(with = "humantime_serde")]
    pub max_throttle_wait: Duration,

    pub throttle_policy: ThrottlePolicy,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
            max_throttle_wait: Duration::from_secs(60),
            throttle_policy: ThrottlePolicy::Wait,
        }
    }
}

/// Wire transport limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Largest accepted inbound JSON-RPC message in bytes.
    pub max_message_bytes: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_message_bytes: 4 * 1024 * 1024,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Tracing log level used when `RUST_LOG` is unset.
    pub log_level: String,

    /// Enable JSON log formatting.
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

impl Config {
    /// Load a JSON config file. Missing sections fall back to defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            Error::configuration(format!("invalid config {}: {}", path.display(), e))
        })
    }

    /// Overlay values from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    /// Overlay values from an arbitrary variable source.
    pub fn apply_vars<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("GITLAB_URL").or_else(|| lookup("GITLAB_API_URL")) {
            self.gitlab.url = url;
        }
        if let Some(token) =
            lookup("GITLAB_TOKEN").or_else(|| lookup("GITLAB_PERSONAL_ACCESS_TOKEN"))
        {
            self.gitlab.token = token;
        }
        if let Some(mode) = lookup("GITLAB_MCP_MODE") {
            self.server.mode = parse_enum(&mode, "GITLAB_MCP_MODE")?;
        }
        if let Some(transport) = lookup("GITLAB_MCP_TRANSPORT") {
            self.server.transport = parse_enum(&transport, "GITLAB_MCP_TRANSPORT")?;
        }
        if let Some(format) = lookup("GITLAB_MCP_LOG_FORMAT") {
            self.observability.json_logs = format.eq_ignore_ascii_case("json");
        }
        Ok(())
    }

    /// Reject configurations the server cannot start with.
    pub fn validate(&self) -> Result<()> {
        reqwest::Url::parse(&self.gitlab.url)
            .map_err(|e| Error::configuration(format!("invalid GitLab URL '{}': {}", self.gitlab.url, e)))?;
        if self.server.transport == TransportKind::Http && self.server.port == 0 {
            return Err(Error::configuration("HTTP port must be non-zero"));
        }
        if self.dispatch.initial_backoff > self.dispatch.max_backoff {
            return Err(Error::configuration(
                "dispatch.initial_backoff must not exceed dispatch.max_backoff",
            ));
        }
        if self.transport.max_message_bytes == 0 {
            return Err(Error::configuration("transport.max_message_bytes must be positive"));
        }
        Ok(())
    }
}

fn parse_enum<T: serde::de::DeserializeOwned>(raw: &str, var: &str) -> Result<T> {
    serde_json::from_value(serde_json::Value::String(raw.trim().to_ascii_lowercase()))
        .map_err(|_| Error::configuration(format!("unsupported value '{}' for {}", raw, var)))
}
