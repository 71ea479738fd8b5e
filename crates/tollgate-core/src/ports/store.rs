//! Counting backend port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{Quota, RawWindow};
use crate::error::RateLimitError;

/// One counting backend: an in-process table or a remote store.
///
/// `check_and_decrement` must apply its update as one indivisible step per
/// key: either a fresh window is opened or the live one is decremented.
#[async_trait]
pub trait WindowStore: Send + Sync {
    async fn check_and_decrement(
        &self,
        key: &str,
        now: DateTime<Utc>,
        quota: Quota,
    ) -> Result<RawWindow, RateLimitError>;

    async fn remove(&self, key: &str) -> Result<(), RateLimitError>;

    /// Drop state for windows that ended at or before `now`.
    /// Returns how many keys were dropped.
    ///
    /// Backends whose store expires keys on its own keep the default.
    async fn sweep_expired(&self, _now: DateTime<Utc>) -> usize {
        0
    }
}
