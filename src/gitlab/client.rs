//! GitLab REST API client.
//!
//! Thin adapter over `reqwest`: builds `/api/v4` URLs, authenticates with
//! `PRIVATE-TOKEN`, and turns every response into either an [`ApiResponse`]
//! or a [`ToolError`] carrying the rate-limit headers GitLab sent back.

use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::{Method, RequestBuilder, Url};
use serde_json::{json, Value};

use crate::dispatch::RateLimitInfo;
use crate::tools::HandlerOutput;
use crate::types::{Error, ErrorKind, GitLabConfig, PaginationResponse, Result, ToolError};

const API_PREFIX: &str = "/api/v4";

/// Decoded body plus the metadata GitLab attached to it.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub body: Value,
    pub rate_limit: Option<RateLimitInfo>,
    pub pagination: Option<PaginationResponse>,
}

impl ApiResponse {
    /// Handler output for a single-resource call.
    pub fn into_output(self) -> HandlerOutput {
        HandlerOutput::new(self.body).with_rate_limit(self.rate_limit)
    }

    /// Handler output for a list call: `{items, pagination}`.
    pub fn into_list_output(self) -> HandlerOutput {
        let items = match self.body {
            Value::Array(items) => Value::Array(items),
            other => json!([other]),
        };
        let data = json!({
            "items": items,
            "pagination": self.pagination,
        });
        HandlerOutput::new(data).with_rate_limit(self.rate_limit)
    }
}

/// GitLab API client. Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct GitLabClient {
    api_base: String,
    http: reqwest::Client,
}

impl std::fmt::Debug for GitLabClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitLabClient")
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

impl GitLabClient {
    pub fn new(config: &GitLabConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if !config.token.is_empty() {
            let mut token = HeaderValue::from_str(&config.token)
                .map_err(|_| Error::configuration("GitLab token contains invalid characters"))?;
            token.set_sensitive(true);
            headers.insert("PRIVATE-TOKEN", token);
        } else {
            tracing::warn!("no GitLab token configured; only public resources are reachable");
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            api_base: api_base(&config.url),
            http,
        })
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    pub async fn get(&self, path: &str, query: &[(&str, String)]) -> std::result::Result<ApiResponse, ToolError> {
        self.execute(self.request(Method::GET, path).query(query)).await
    }

    /// POST `body` as JSON; a `null` body sends no payload.
    pub async fn post(&self, path: &str, body: &Value) -> std::result::Result<ApiResponse, ToolError> {
        let request = self.request(Method::POST, path);
        let request = if body.is_null() { request } else { request.json(body) };
        self.execute(request).await
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        tracing::debug!(%method, path, "GitLab request");
        self.http.request(method, format!("{}{}", self.api_base, path))
    }

    async fn execute(&self, request: RequestBuilder) -> std::result::Result<ApiResponse, ToolError> {
        let response = request.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let rate_limit = RateLimitInfo::from_headers(&headers, Utc::now());

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let mut err = ToolError::from_status(status.as_u16(), &body).with_rate_limit(rate_limit);
            if err.kind == ErrorKind::RateLimited {
                if let Some(info) = rate_limit {
                    err.reset = Some(info.reset);
                    err = err.with_detail("reset", info.reset.to_rfc3339());
                }
            }
            return Err(err);
        }

        let text = response.text().await?;
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).map_err(|e| {
                ToolError::new(ErrorKind::Unknown, format!("GitLab returned invalid JSON: {}", e))
                    .with_detail("status", status.as_u16())
            })?
        };

        Ok(ApiResponse {
            body,
            rate_limit,
            pagination: PaginationResponse::from_headers(&headers),
        })
    }
}

/// `https://host` or `https://host/api/v4` → `https://host/api/v4`.
fn api_base(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    if trimmed.ends_with(API_PREFIX) {
        trimmed.to_string()
    } else {
        format!("{}{}", trimmed, API_PREFIX)
    }
}

/// Path segment for a project/group identifier: numeric ids as-is, paths
/// (`group/sub/project`) percent-encoded.
pub fn encode_id(id: &Value) -> String {
    match id {
        Value::String(s) => encode_segment(s),
        other => other.to_string(),
    }
}

fn encode_segment(raw: &str) -> String {
    let Ok(mut url) = Url::parse("http://localhost/") else {
        return raw.to_string();
    };
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.clear().push(raw);
    }
    url.path().trim_start_matches('/').to_string()
}
