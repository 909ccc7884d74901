//! Rate limit tracking.
//!
//! Advisory mirror of GitLab's per-token request budget. GitLab is the
//! authoritative counter; the tracker only remembers the most recent
//! snapshot it reported so the dispatcher can avoid calls that are certain
//! to be rejected.

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use std::time::Duration;

/// One rate-limit window as reported by the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitInfo {
    /// Total budget for the current window.
    pub limit: u64,
    /// Calls left. Never negative.
    pub remaining: u64,
    /// When the window resets.
    pub reset: DateTime<Utc>,
    /// Calls consumed so far.
    pub used: u64,
}

impl RateLimitInfo {
    /// Parse GitLab's `RateLimit-*` response headers.
    ///
    /// `RateLimit-Reset` is a unix timestamp; a 429 without it may still carry
    /// `Retry-After` (seconds), which is used as a fallback reset. Returns
    /// `None` when neither a remaining count nor a reset time is present.
    pub fn from_headers(headers: &HeaderMap, now: DateTime<Utc>) -> Option<Self> {
        let number = |name: &str| -> Option<i64> {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<i64>().ok())
        };

        let remaining = number("ratelimit-remaining");
        let reset = number("ratelimit-reset")
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .or_else(|| {
                number("retry-after")
                    .and_then(|secs| ChronoDuration::try_seconds(secs.max(0)))
                    .and_then(|delta| now.checked_add_signed(delta))
            });

        if remaining.is_none() && reset.is_none() {
            return None;
        }

        let limit = clamp(number("ratelimit-limit").unwrap_or(0));
        let remaining = clamp(remaining.unwrap_or(0));
        let used = number("ratelimit-observed")
            .map(clamp)
            .unwrap_or_else(|| limit.saturating_sub(remaining));

        Some(Self {
            limit,
            remaining,
            reset: reset.unwrap_or(now),
            used,
        })
    }

    /// True while the window is exhausted and has not yet reset.
    pub fn is_exhausted_at(&self, now: DateTime<Utc>) -> bool {
        self.remaining == 0 && self.reset > now
    }
}

fn clamp(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

/// Process-wide rate-limit tracker.
///
/// Holds a single snapshot that is replaced wholesale on every `record`;
/// readers always see one complete snapshot, never a half-updated one.
#[derive(Debug, Default)]
pub struct RateLimitTracker {
    snapshot: RwLock<Option<RateLimitInfo>>,
}

impl RateLimitTracker {
    pub fn new() -> Self {
        Self {
            snapshot: RwLock::new(None),
        }
    }

    /// Replace the tracked snapshot.
    pub fn record(&self, info: RateLimitInfo) {
        let mut guard = self
            .snapshot
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Some(info);
    }

    /// Parse response headers and record them if they carry rate-limit data.
    pub fn record_headers(&self, headers: &HeaderMap) {
        if let Some(info) = RateLimitInfo::from_headers(headers, Utc::now()) {
            self.record(info);
        }
    }

    /// Copy of the current snapshot.
    pub fn snapshot(&self) -> Option<RateLimitInfo> {
        *self
            .snapshot
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn should_throttle(&self) -> bool {
        self.should_throttle_at(Utc::now())
    }

    pub fn should_throttle_at(&self, now: DateTime<Utc>) -> bool {
        self.snapshot()
            .map_or(false, |info| info.is_exhausted_at(now))
    }

    /// Time until the tracked window resets, floored at zero.
    pub fn wait_duration(&self) -> Duration {
        self.wait_duration_at(Utc::now())
    }

    pub fn wait_duration_at(&self, now: DateTime<Utc>) -> Duration {
        self.snapshot()
            .and_then(|info| (info.reset - now).to_std().ok())
            .unwrap_or(Duration::ZERO)
    }
}
