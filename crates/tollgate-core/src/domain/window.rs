use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::RateLimitError;

/// Per-key state of the current window.
///
/// `reset_at` is fixed when the window is created; only a fresh window
/// replaces it. `remaining` never drops below -1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowState {
    pub remaining: i64,
    pub reset_at: DateTime<Utc>,
}

impl WindowState {
    /// Opens a window ending at `reset_at`, counting the opening request.
    pub fn open(limit: i64, reset_at: DateTime<Utc>) -> Self {
        Self {
            remaining: limit - 1,
            reset_at,
        }
    }

    /// Whether the window still admits counting at `now`.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.reset_at > now
    }

    /// Counts one more request against this window.
    pub fn decremented(self) -> Self {
        Self {
            remaining: (self.remaining - 1).max(-1),
            reset_at: self.reset_at,
        }
    }
}

/// Reset instant as encoded by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetAt {
    /// In-process instant.
    Instant(DateTime<Utc>),
    /// Milliseconds since the Unix epoch, as returned by a remote round trip.
    EpochMillis(i64),
}

/// Backend reply for one window update, before normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawWindow {
    pub remaining: i64,
    pub reset: ResetAt,
}

impl RawWindow {
    pub fn local(state: WindowState) -> Self {
        Self {
            remaining: state.remaining,
            reset: ResetAt::Instant(state.reset_at),
        }
    }

    pub fn remote(remaining: i64, reset_millis: i64) -> Self {
        Self {
            remaining,
            reset: ResetAt::EpochMillis(reset_millis),
        }
    }

    /// Converts the backend encoding into a uniform result.
    pub fn normalize(self) -> Result<RateLimitResult, RateLimitError> {
        let reset_at = match self.reset {
            ResetAt::Instant(at) => at,
            ResetAt::EpochMillis(millis) => DateTime::from_timestamp_millis(millis).ok_or_else(
                || RateLimitError::Decode(format!("reset {millis}ms is out of range")),
            )?,
        };

        Ok(RateLimitResult {
            remaining: self.remaining,
            reset_at,
        })
    }
}

/// Outcome of one `get` call.
///
/// A negative `remaining` means the request was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitResult {
    pub remaining: i64,
    pub reset_at: DateTime<Utc>,
}

impl RateLimitResult {
    pub fn is_allowed(&self) -> bool {
        self.remaining >= 0
    }

    /// Time left in the window as seen from `now`, zero once it has passed.
    pub fn reset_after(&self, now: DateTime<Utc>) -> std::time::Duration {
        (self.reset_at - now).to_std().unwrap_or_default()
    }
}
