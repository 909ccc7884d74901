//! Dispatcher: resolves a tool call to its handler and produces an envelope.
//!
//! Each call moves through
//! `Idle → Validating → Throttled → Invoking → Mapping → Complete`:
//!
//! ```text
//!   lookup ──✗──────────────────────────────────────────► NOT_FOUND
//!     │
//!   validate ──✗────────────────────────────────────────► VALIDATION
//!     │
//!   throttle? ──(wait ≤ max)──► sleep ─┐
//!     │   └──(wait > max / reject)─────┼───────────────► RATE_LIMITED
//!     ▼                                ▼
//!   invoke ──ok──► record rate limit ──────────────────► Success
//!     │
//!     └──err──► map kind ──transient & retries left──► backoff ─► throttle?
//!                    └────otherwise───────────────────► Failure
//! ```
//!
//! The dispatcher holds no per-call lock. The only shared mutable state it
//! touches is the [`RateLimitTracker`] snapshot.

pub mod envelope;
pub mod rate_limiter;
pub mod redact;
pub mod retry;

pub use envelope::{ErrorBody, ResponseEnvelope, ResponseMetadata};
pub use rate_limiter::{RateLimitInfo, RateLimitTracker};
pub use redact::Redactor;
pub use retry::RetryPolicy;

use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::tools::{schema, HandlerOutput, ToolDescriptor, ToolRegistry};
use crate::types::{DispatchConfig, Error, ErrorKind, Result, ThrottlePolicy, ToolError};

/// Dispatch lifecycle states (traced at debug level).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Idle,
    Validating,
    Throttled,
    Invoking,
    Mapping,
    Complete,
}

impl fmt::Display for DispatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DispatchState::Idle => "idle",
            DispatchState::Validating => "validating",
            DispatchState::Throttled => "throttled",
            DispatchState::Invoking => "invoking",
            DispatchState::Mapping => "mapping",
            DispatchState::Complete => "complete",
        };
        f.write_str(s)
    }
}

/// Why a dispatch stopped before producing a success.
enum Halt {
    Cancelled,
    Failed(ToolError),
}

impl From<ToolError> for Halt {
    fn from(err: ToolError) -> Self {
        Halt::Failed(err)
    }
}

/// Tool call engine shared by every transport and by slim mode.
#[derive(Debug)]
pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
    tracker: Arc<RateLimitTracker>,
    retry: RetryPolicy,
    throttle_policy: ThrottlePolicy,
    max_throttle_wait: Duration,
    redactor: Redactor,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<ToolRegistry>,
        tracker: Arc<RateLimitTracker>,
        config: &DispatchConfig,
    ) -> Self {
        Self {
            registry,
            tracker,
            retry: RetryPolicy::from_config(config),
            throttle_policy: config.throttle_policy,
            max_throttle_wait: config.max_throttle_wait,
            redactor: Redactor::default(),
        }
    }

    /// Mask these secrets in every failure envelope.
    pub fn with_redactor(mut self, redactor: Redactor) -> Self {
        self.redactor = redactor;
        self
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn tracker(&self) -> &Arc<RateLimitTracker> {
        &self.tracker
    }

    /// Dispatch one tool call.
    ///
    /// Always yields an envelope unless `cancel` fires first, in which case
    /// `Error::Cancelled` is returned and no envelope is produced.
    #[tracing::instrument(name = "dispatch", skip(self, name, arguments, cancel), fields(tool = %name))]
    pub async fn dispatch(
        &self,
        name: &str,
        arguments: &Value,
        cancel: &CancellationToken,
    ) -> Result<ResponseEnvelope> {
        let started = Instant::now();
        trace_state(DispatchState::Idle);

        let descriptor = match self.registry.lookup(name) {
            Ok(descriptor) => descriptor,
            Err(_) => {
                let err = ToolError::not_found(format!("Unknown tool: {}", name))
                    .with_detail("tool", name);
                return Ok(self.failure(started, err));
            }
        };

        trace_state(DispatchState::Validating);
        let args = match schema::validate(descriptor, arguments) {
            Ok(args) => args,
            Err(err) => return Ok(self.failure(started, err)),
        };

        match self.run(descriptor, args, cancel).await {
            Ok(output) => Ok(self.success(started, output.data)),
            Err(Halt::Failed(err)) => Ok(self.failure(started, err)),
            Err(Halt::Cancelled) => {
                tracing::debug!("dispatch cancelled");
                Err(Error::cancelled(format!("call to {} was cancelled", name)))
            }
        }
    }

    /// Throttle, invoke and retry until success, a surfaced failure, or
    /// cancellation.
    async fn run(
        &self,
        descriptor: &ToolDescriptor,
        args: Map<String, Value>,
        cancel: &CancellationToken,
    ) -> std::result::Result<HandlerOutput, Halt> {
        let mut retries = 0u32;
        loop {
            self.throttle(cancel).await?;

            trace_state(DispatchState::Invoking);
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Halt::Cancelled),
                outcome = descriptor.handler.call(args.clone()) => outcome,
            };

            trace_state(DispatchState::Mapping);
            let err = match outcome {
                Ok(output) => {
                    if let Some(info) = output.rate_limit {
                        self.tracker.record(info);
                    }
                    if cancel.is_cancelled() {
                        return Err(Halt::Cancelled);
                    }
                    return Ok(output);
                }
                Err(err) => err,
            };

            self.record_failure_rate_limit(&err);

            let retryable = match err.kind {
                // Rejected before execution, so repeating a write is safe.
                ErrorKind::RateLimited => true,
                kind if kind.is_transient() => descriptor.idempotent,
                _ => false,
            };
            if !retryable || !self.retry.allows_retry(retries) {
                let attempts = retries + 1;
                return Err(if attempts > 1 {
                    Halt::Failed(err.with_detail("attempts", attempts))
                } else {
                    Halt::Failed(err)
                });
            }

            // A rate-limited failure is paced by the throttle step on the
            // next pass; only fall back to backoff when no reset is known.
            let delay = if err.kind == ErrorKind::RateLimited && self.tracker.should_throttle() {
                Duration::ZERO
            } else {
                self.retry.backoff_for(retries)
            };
            tracing::warn!(
                kind = %err.kind,
                attempt = retries + 1,
                delay_ms = delay.as_millis() as u64,
                "tool call failed, retrying: {}",
                self.redactor.redact_str(&err.message)
            );
            sleep_or_cancel(delay, cancel).await?;
            retries += 1;
        }
    }

    /// Block (bounded) or fail while the remote budget is exhausted.
    async fn throttle(&self, cancel: &CancellationToken) -> std::result::Result<(), Halt> {
        if !self.tracker.should_throttle() {
            return Ok(());
        }
        trace_state(DispatchState::Throttled);

        let wait = self.tracker.wait_duration();
        let reset = self.tracker.snapshot().map(|info| info.reset);
        match self.throttle_policy {
            ThrottlePolicy::Wait if wait <= self.max_throttle_wait => {
                tracing::info!(
                    wait_ms = wait.as_millis() as u64,
                    "GitLab rate limit exhausted, waiting for reset"
                );
                sleep_or_cancel(wait, cancel).await
            }
            policy => {
                let message = match policy {
                    ThrottlePolicy::Reject => "GitLab rate limit exhausted".to_string(),
                    ThrottlePolicy::Wait => format!(
                        "GitLab rate limit exhausted; reset in {}s exceeds the {}s wait limit",
                        wait.as_secs(),
                        self.max_throttle_wait.as_secs()
                    ),
                };
                Err(ToolError::rate_limited(message, reset)
                    .with_detail("wait_ms", wait.as_millis() as u64)
                    .into())
            }
        }
    }

    /// Remember what a failed response told us about the budget.
    fn record_failure_rate_limit(&self, err: &ToolError) {
        if let Some(info) = err.rate_limit {
            self.tracker.record(info);
        } else if let (ErrorKind::RateLimited, Some(reset)) = (err.kind, err.reset) {
            let previous = self.tracker.snapshot();
            self.tracker.record(RateLimitInfo {
                limit: previous.map_or(0, |p| p.limit),
                remaining: 0,
                reset,
                used: previous.map_or(0, |p| p.used.max(p.limit)),
            });
        }
    }

    /// Build a success envelope stamped with current rate-limit metadata.
    pub fn success(&self, started: Instant, data: Value) -> ResponseEnvelope {
        trace_state(DispatchState::Complete);
        let snapshot = self.tracker.snapshot();
        ResponseEnvelope::Success {
            data,
            metadata: ResponseMetadata {
                rate_limit_remaining: snapshot.map(|s| s.remaining),
                rate_limit_reset: snapshot.map(|s| s.reset),
                execution_time_ms: elapsed_ms(started),
            },
        }
    }

    /// Build a failure envelope with secrets removed.
    pub fn failure(&self, started: Instant, err: ToolError) -> ResponseEnvelope {
        trace_state(DispatchState::Complete);
        let mut body = ErrorBody::from(err);
        body.message = self.redactor.redact_str(&body.message);
        let mut details = Value::Object(std::mem::take(&mut body.details));
        self.redactor.redact_value(&mut details);
        if let Value::Object(map) = details {
            body.details = map;
        }
        tracing::debug!(code = %body.code, "tool call failed: {}", body.message);
        ResponseEnvelope::Failure {
            error: body,
            execution_time_ms: elapsed_ms(started),
        }
    }
}

fn trace_state(state: DispatchState) {
    tracing::trace!(%state, "dispatch state");
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

async fn sleep_or_cancel(delay: Duration, cancel: &CancellationToken) -> std::result::Result<(), Halt> {
    if delay.is_zero() {
        return if cancel.is_cancelled() {
            Err(Halt::Cancelled)
        } else {
            Ok(())
        };
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Halt::Cancelled),
        _ = tokio::time::sleep(delay) => Ok(()),
    }
}
