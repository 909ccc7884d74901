//! Stdio transport: newline-delimited JSON-RPC over stdin/stdout.
//!
//! Every request runs as its own task; responses go through a single writer
//! task, so they may be written in completion order rather than arrival
//! order. `notifications/cancelled` cancels the matching in-flight request,
//! which then produces no response.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufRead, AsyncWrite, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::codec::{read_frame, write_frame, Frame};
use super::protocol::{CancelledParams, JsonRpcResponse};
use super::router::{parse_message, McpServer};
use crate::types::{jsonrpc_codes, Result, TransportConfig};

const RESPONSE_QUEUE: usize = 64;

type InFlight = Arc<Mutex<HashMap<String, CancellationToken>>>;

/// Serve on the process's stdin/stdout until EOF or `shutdown`.
pub async fn serve_stdio(
    server: Arc<McpServer>,
    config: &TransportConfig,
    shutdown: CancellationToken,
) -> Result<()> {
    tracing::info!(mode = ?server.mode(), "MCP server listening on stdio");
    serve(
        server,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
        config.max_message_bytes,
        shutdown,
    )
    .await
}

/// Serve over any line-oriented reader/writer pair.
pub async fn serve<R, W>(
    server: Arc<McpServer>,
    mut reader: R,
    writer: W,
    max_message_bytes: usize,
    shutdown: CancellationToken,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<JsonRpcResponse>(RESPONSE_QUEUE);
    let writer_task = tokio::spawn(write_responses(writer, rx));
    let in_flight: InFlight = Arc::default();
    let mut tasks = JoinSet::new();

    loop {
        // Reap finished requests without blocking; `read_frame` must not be
        // raced against anything but shutdown or a partial line is lost.
        while tasks.try_join_next().is_some() {}

        let frame = tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::info!("stdio transport shutting down");
                break;
            }
            frame = read_frame(&mut reader, max_message_bytes) => frame?,
        };

        let raw = match frame {
            None => break,
            Some(Frame::Oversized) => {
                tracing::warn!(max_message_bytes, "dropped oversized message");
                let resp = JsonRpcResponse::error(
                    None,
                    jsonrpc_codes::INVALID_REQUEST,
                    format!("Message exceeds {} bytes", max_message_bytes),
                );
                if tx.send(resp).await.is_err() {
                    break;
                }
                continue;
            }
            Some(Frame::Message(raw)) => raw,
        };

        let request = match parse_message(&raw) {
            Ok(request) => request,
            Err(resp) => {
                if tx.send(resp).await.is_err() {
                    break;
                }
                continue;
            }
        };

        if request.method == "notifications/cancelled" {
            cancel_request(&in_flight, request.params);
            continue;
        }

        let Some(id) = request.id.clone() else {
            // Notifications are cheap and ordered; handle inline.
            server.handle(request, &shutdown).await;
            continue;
        };

        let key = id.to_string();
        let token = shutdown.child_token();
        lock(&in_flight).insert(key.clone(), token.clone());

        let server = server.clone();
        let tx = tx.clone();
        let in_flight = in_flight.clone();
        tasks.spawn(async move {
            let response = server.handle(request, &token).await;
            lock(&in_flight).remove(&key);
            if token.is_cancelled() {
                tracing::debug!(id = %key, "request cancelled, response suppressed");
                return;
            }
            if let Some(response) = response {
                // Receiver gone means the writer failed; nothing left to do.
                let _ = tx.send(response).await;
            }
        });
    }

    // Let in-flight requests finish (or observe shutdown) before closing.
    while tasks.join_next().await.is_some() {}
    drop(tx);
    match writer_task.await {
        Ok(result) => result,
        Err(e) => Err(crate::types::Error::internal(format!("stdio writer panicked: {}", e))),
    }
}

async fn write_responses<W: AsyncWrite + Unpin>(
    mut writer: W,
    mut rx: mpsc::Receiver<JsonRpcResponse>,
) -> Result<()> {
    while let Some(response) = rx.recv().await {
        write_frame(&mut writer, &response).await?;
    }
    Ok(())
}

fn cancel_request(in_flight: &InFlight, params: serde_json::Value) {
    let params: CancelledParams = match serde_json::from_value(params) {
        Ok(params) => params,
        Err(e) => {
            tracing::debug!("ignoring malformed cancellation: {}", e);
            return;
        }
    };
    let key = params.request_id.to_string();
    match lock(in_flight).get(&key) {
        Some(token) => {
            tracing::info!(id = %key, reason = ?params.reason, "cancelling request");
            token.cancel();
        }
        None => tracing::debug!(id = %key, "cancellation for unknown or finished request"),
    }
}

fn lock(in_flight: &InFlight) -> std::sync::MutexGuard<'_, HashMap<String, CancellationToken>> {
    in_flight.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
