//! Rate limiting port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{Quota, RateLimitResult};
use crate::error::RateLimitError;

/// Rate limiter trait - what the HTTP adapter sees of the engine.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Count one request for `key` at the limiter's current time.
    async fn get(&self, key: &str) -> Result<RateLimitResult, RateLimitError>;

    /// Count one request for `key` at an explicit instant.
    async fn get_at(
        &self,
        key: &str,
        now: DateTime<Utc>,
    ) -> Result<RateLimitResult, RateLimitError>;

    /// Forget the window for `key`. Removing an unknown key succeeds.
    async fn remove(&self, key: &str) -> Result<(), RateLimitError>;

    /// The quota every key is measured against.
    fn quota(&self) -> Quota;
}
