//! Streamable HTTP transport.
//!
//! `POST /mcp` carries one JSON-RPC message and is answered with JSON
//! (`202 Accepted` with an empty body for notifications). The `initialize`
//! response carries an `Mcp-Session-Id` header. A client that disconnects
//! mid-call drops the handler future, which cancels the dispatch.

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use super::router::{parse_message, McpServer};
use crate::types::{Result, TransportConfig};

pub const SESSION_HEADER: &str = "mcp-session-id";

/// Build the axum router.
pub fn router(server: Arc<McpServer>, config: &TransportConfig) -> Router {
    Router::new()
        .route("/mcp", post(post_mcp).get(get_mcp))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(config.max_message_bytes))
        .with_state(server)
}

/// Bind `host:port` and serve until `shutdown` fires.
pub async fn serve_http(
    server: Arc<McpServer>,
    host: &str,
    port: u16,
    config: &TransportConfig,
    shutdown: CancellationToken,
) -> Result<()> {
    let listener = TcpListener::bind((host, port)).await?;
    serve_listener(server, listener, config, shutdown).await
}

/// Serve on an already-bound listener (tests bind port 0).
pub async fn serve_listener(
    server: Arc<McpServer>,
    listener: TcpListener,
    config: &TransportConfig,
    shutdown: CancellationToken,
) -> Result<()> {
    tracing::info!(
        addr = %listener.local_addr()?,
        mode = ?server.mode(),
        "MCP server listening on http"
    );
    axum::serve(listener, router(server, config))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    tracing::info!("http transport stopped");
    Ok(())
}

async fn post_mcp(State(server): State<Arc<McpServer>>, body: Bytes) -> Response {
    let raw = String::from_utf8_lossy(&body);
    let request = match parse_message(&raw) {
        Ok(request) => request,
        Err(resp) => return (StatusCode::BAD_REQUEST, Json(resp)).into_response(),
    };
    let is_initialize = request.method == "initialize";

    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();
    let Some(response) = server.handle(request, &cancel).await else {
        return StatusCode::ACCEPTED.into_response();
    };

    let mut http_response = Json(response).into_response();
    if is_initialize {
        let session = uuid::Uuid::new_v4().to_string();
        if let Ok(value) = HeaderValue::from_str(&session) {
            http_response.headers_mut().insert(SESSION_HEADER, value);
        }
        tracing::debug!(session = %session, "session started");
    }
    http_response
}

async fn get_mcp() -> impl IntoResponse {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        [(header::ALLOW, "POST")],
    )
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}
