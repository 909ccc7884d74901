//! Shared fixtures: a mock GitLab API served by axum on a random port.

#![allow(dead_code)]

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use gitlab_mcp::dispatch::{Dispatcher, RateLimitTracker, Redactor};
use gitlab_mcp::gitlab::{register_all, GitLabClient};
use gitlab_mcp::tools::ToolRegistry;
use gitlab_mcp::types::{DispatchConfig, GitLabConfig};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const TOKEN: &str = "glpat-test-token";

#[derive(Debug, Default)]
pub struct MockState {
    pub pipeline_calls: AtomicUsize,
    pub issue_posts: AtomicUsize,
    pub merge_request_calls: AtomicUsize,
}

#[derive(Debug)]
pub struct MockGitLab {
    pub url: String,
    pub state: Arc<MockState>,
}

/// Start the mock API and return its base URL (without `/api/v4`).
pub async fn start_mock_gitlab() -> MockGitLab {
    let state = Arc::new(MockState::default());
    let app = Router::new()
        .route("/api/v4/projects/{id}", get(get_project))
        .route("/api/v4/projects/{id}/issues", get(list_issues).post(create_issue))
        .route("/api/v4/projects/{id}/issues/{iid}", get(get_issue))
        .route("/api/v4/projects/{id}/merge_requests", get(list_merge_requests))
        .route("/api/v4/projects/{id}/merge_requests/{iid}", get(get_merge_request))
        .route("/api/v4/projects/{id}/pipelines/{pid}", get(get_pipeline))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    MockGitLab {
        url: format!("http://{}", addr),
        state,
    }
}

/// Fast retry settings so tests do not wait on real backoff.
pub fn fast_dispatch() -> DispatchConfig {
    DispatchConfig {
        max_retries: 3,
        initial_backoff: Duration::from_millis(5),
        max_backoff: Duration::from_millis(40),
        max_throttle_wait: Duration::from_secs(1),
        ..DispatchConfig::default()
    }
}

/// Dispatcher wired to the mock with every GitLab tool registered.
pub fn dispatcher(mock: &MockGitLab, token: &str) -> Dispatcher {
    dispatcher_at(&mock.url, token, Duration::from_secs(5))
}

/// Dispatcher against an arbitrary base URL with a custom request timeout.
pub fn dispatcher_at(url: &str, token: &str, request_timeout: Duration) -> Dispatcher {
    let config = GitLabConfig {
        url: url.to_string(),
        token: token.to_string(),
        request_timeout,
    };
    let client = GitLabClient::new(&config).unwrap();
    let mut registry = ToolRegistry::new();
    register_all(&mut registry, &client).unwrap();
    Dispatcher::new(
        Arc::new(registry),
        Arc::new(RateLimitTracker::new()),
        &fast_dispatch(),
    )
    .with_redactor(Redactor::new([token]))
}

fn rate_headers(remaining: u64) -> [(&'static str, String); 4] {
    let reset = chrono::Utc::now().timestamp() + 60;
    [
        ("ratelimit-limit", "2000".to_string()),
        ("ratelimit-remaining", remaining.to_string()),
        ("ratelimit-reset", reset.to_string()),
        ("ratelimit-observed", (2000 - remaining).to_string()),
    ]
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("private-token")
        .and_then(|v| v.to_str().ok())
        .map_or(false, |v| v == TOKEN)
}

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({"message": "401 Unauthorized"}))).into_response()
}

async fn get_project(headers: HeaderMap, Path(id): Path<String>) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    if id == "404" {
        return (StatusCode::NOT_FOUND, Json(json!({"message": "404 Project Not Found"}))).into_response();
    }
    (rate_headers(1999), Json(json!({"id": 7, "path_with_namespace": id}))).into_response()
}

async fn list_issues(
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let page = query.get("page").cloned().unwrap_or_default();
    let per_page = query.get("per_page").cloned().unwrap_or_default();
    let items = json!([
        {"iid": 1, "project": id, "state": query.get("state")},
        {"iid": 2, "project": id, "state": query.get("state")},
    ]);
    (
        [
            ("x-total", "45".to_string()),
            ("x-page", page),
            ("x-per-page", per_page),
        ],
        rate_headers(1998),
        Json(items),
    )
        .into_response()
}

async fn get_issue(headers: HeaderMap, Path((id, iid)): Path<(String, u64)>) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    (rate_headers(1999), Json(json!({"iid": iid, "project": id, "title": "Crash on start"}))).into_response()
}

async fn create_issue(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    if state.issue_posts.fetch_add(1, Ordering::SeqCst) == 0 && body["title"] == "flaky" {
        return (StatusCode::SERVICE_UNAVAILABLE, "upstream unavailable").into_response();
    }
    (
        StatusCode::CREATED,
        Json(json!({"iid": 46, "project": id, "title": body["title"]})),
    )
        .into_response()
}

async fn list_merge_requests() -> Response {
    let reset = chrono::Utc::now().timestamp() + 3600;
    (
        StatusCode::TOO_MANY_REQUESTS,
        [
            ("ratelimit-limit", "2000".to_string()),
            ("ratelimit-remaining", "0".to_string()),
            ("ratelimit-reset", reset.to_string()),
        ],
        Json(json!({"message": "Retry later"})),
    )
        .into_response()
}

/// Hangs well past any test request timeout.
async fn get_merge_request(
    State(state): State<Arc<MockState>>,
    Path((_id, iid)): Path<(String, u64)>,
) -> Response {
    state.merge_request_calls.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_secs(30)).await;
    Json(json!({"iid": iid})).into_response()
}

async fn get_pipeline(
    State(state): State<Arc<MockState>>,
    Path((_id, pid)): Path<(String, u64)>,
) -> Response {
    let n = state.pipeline_calls.fetch_add(1, Ordering::SeqCst);
    if n < 3 {
        return (StatusCode::SERVICE_UNAVAILABLE, Json(json!({"message": "503 Service Unavailable"})))
            .into_response();
    }
    Json(json!({"id": pid, "status": "success", "attempt": n + 1})).into_response()
}
