use std::time::Duration;

/// Requests admitted per window when no usable limit is configured.
pub const DEFAULT_LIMIT: i64 = 1000;

/// Window length when no usable window is configured.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60 * 60);

/// Quota shared by all requests for one client key inside one window.
///
/// Construction never fails: a non-positive limit or a window shorter than
/// one millisecond is replaced by the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    limit: i64,
    window: Duration,
}

impl Quota {
    pub fn new(limit: i64, window: Duration) -> Self {
        let limit = if limit <= 0 { DEFAULT_LIMIT } else { limit };

        // Windows are tracked with millisecond precision
        let window = Duration::from_millis(window.as_millis().min(u64::MAX as u128) as u64);
        let window = if window.is_zero() {
            DEFAULT_WINDOW
        } else {
            window
        };

        Self { limit, window }
    }

    pub fn limit(&self) -> i64 {
        self.limit
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Window length in whole milliseconds, saturating at `i64::MAX`.
    pub fn window_millis(&self) -> i64 {
        i64::try_from(self.window.as_millis()).unwrap_or(i64::MAX)
    }

    /// Window length as a signed chrono delta, for instant arithmetic.
    pub fn window_delta(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.window_millis())
    }
}

impl Default for Quota {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            window: DEFAULT_WINDOW,
        }
    }
}
