//! Limiter facade - one entry point over either counting store.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use tollgate_core::RateLimitError;
use tollgate_core::domain::{DEFAULT_LIMIT, DEFAULT_WINDOW, Quota, RateLimitResult};
use tollgate_core::ports::{Clock, RateLimiter, ScriptClient, SystemClock, WindowStore};

use super::memory::LocalWindowStore;
use super::remote::RemoteWindowStore;

/// Limiter options.
#[derive(Clone)]
pub struct LimiterOptions {
    /// Requests per window. Non-positive means the default of 1000.
    pub limit: i64,
    /// Window length. Zero means the default of one hour.
    pub window: Duration,
    /// Remote store client; without one the limiter counts in memory.
    pub client: Option<Arc<dyn ScriptClient>>,
    /// Namespace for remote store keys.
    pub key_prefix: Option<String>,
    /// Time source for `get`.
    pub clock: Arc<dyn Clock>,
}

impl Default for LimiterOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            window: DEFAULT_WINDOW,
            client: None,
            key_prefix: None,
            clock: Arc::new(SystemClock),
        }
    }
}

impl std::fmt::Debug for LimiterOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LimiterOptions")
            .field("limit", &self.limit)
            .field("window", &self.window)
            .field("remote", &self.client.is_some())
            .field("key_prefix", &self.key_prefix)
            .finish()
    }
}

/// Fixed-window rate limiter.
///
/// The backend is chosen once, in [`Limiter::new`], and never switched.
pub struct Limiter {
    store: Arc<dyn WindowStore>,
    clock: Arc<dyn Clock>,
    quota: Quota,
    backend: &'static str,
}

impl Limiter {
    /// Build a limiter. With a remote client this loads the window script,
    /// which is the only step that can fail.
    pub async fn new(options: LimiterOptions) -> Result<Self, RateLimitError> {
        let quota = Quota::new(options.limit, options.window);

        let (store, backend): (Arc<dyn WindowStore>, &'static str) = match options.client {
            Some(client) => {
                let mut remote = RemoteWindowStore::new(client).await?;
                if let Some(prefix) = options.key_prefix {
                    remote = remote.with_key_prefix(prefix);
                }
                (Arc::new(remote), "remote")
            }
            None => (Arc::new(LocalWindowStore::new()), "local"),
        };

        tracing::info!(
            backend,
            limit = quota.limit(),
            window_ms = quota.window_millis(),
            "Rate limiter initialized"
        );

        Ok(Self {
            store,
            clock: options.clock,
            quota,
            backend,
        })
    }

    /// In-memory limiter with the given quota and wall-clock time.
    pub fn local(limit: i64, window: Duration) -> Self {
        Self {
            store: Arc::new(LocalWindowStore::new()),
            clock: Arc::new(SystemClock),
            quota: Quota::new(limit, window),
            backend: "local",
        }
    }

    /// `"local"` or `"remote"`.
    pub fn backend(&self) -> &'static str {
        self.backend
    }

    /// Drop state for windows that have ended. Only the in-memory backend
    /// holds any; the remote store expires keys itself.
    pub async fn sweep_expired(&self) -> usize {
        let swept = self.store.sweep_expired(self.clock.now()).await;
        if swept > 0 {
            tracing::debug!(swept, "Swept expired windows");
        }
        swept
    }
}

#[async_trait]
impl RateLimiter for Limiter {
    async fn get(&self, key: &str) -> Result<RateLimitResult, RateLimitError> {
        self.get_at(key, self.clock.now()).await
    }

    async fn get_at(
        &self,
        key: &str,
        now: DateTime<Utc>,
    ) -> Result<RateLimitResult, RateLimitError> {
        let raw = self
            .store
            .check_and_decrement(key, now, self.quota)
            .await
            .inspect_err(|e| tracing::error!(key = %key, error = %e, "Rate limit check failed"))?;

        raw.normalize()
    }

    async fn remove(&self, key: &str) -> Result<(), RateLimitError> {
        self.store
            .remove(key)
            .await
            .inspect_err(|e| tracing::error!(key = %key, error = %e, "Rate limit removal failed"))
    }

    fn quota(&self) -> Quota {
        self.quota
    }
}
