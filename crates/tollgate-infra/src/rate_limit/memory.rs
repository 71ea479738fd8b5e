//! In-memory counting store - used when no remote store is configured.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use tollgate_core::RateLimitError;
use tollgate_core::domain::{Quota, RawWindow, WindowState};
use tollgate_core::ports::WindowStore;

/// In-process table of per-key windows behind one async mutex.
///
/// The lock covers the whole read-check-mutate step, so two first requests
/// for the same key can never both open a window.
/// Note: limits are per-process, not shared across instances. Entries for
/// keys that stop sending requests stay until [`WindowStore::sweep_expired`]
/// runs or the key is seen again.
pub struct LocalWindowStore {
    table: Mutex<HashMap<String, WindowState>>,
}

impl LocalWindowStore {
    pub fn new() -> Self {
        Self {
            table: Mutex::new(HashMap::new()),
        }
    }

    /// Number of keys currently held, live or stale.
    pub async fn len(&self) -> usize {
        self.table.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.table.lock().await.is_empty()
    }
}

impl Default for LocalWindowStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WindowStore for LocalWindowStore {
    async fn check_and_decrement(
        &self,
        key: &str,
        now: DateTime<Utc>,
        quota: Quota,
    ) -> Result<RawWindow, RateLimitError> {
        let mut table = self.table.lock().await;

        let state = match table.get(key) {
            Some(state) if state.is_live(now) => state.decremented(),
            _ => {
                let reset_at = now
                    .checked_add_signed(quota.window_delta())
                    .unwrap_or(DateTime::<Utc>::MAX_UTC);
                tracing::debug!(key = %key, reset = %reset_at, "Opening window");
                WindowState::open(quota.limit(), reset_at)
            }
        };

        table.insert(key.to_string(), state);

        Ok(RawWindow::local(state))
    }

    async fn remove(&self, key: &str) -> Result<(), RateLimitError> {
        let mut table = self.table.lock().await;
        table.remove(key);
        Ok(())
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let mut table = self.table.lock().await;
        let before = table.len();
        table.retain(|_, state| state.is_live(now));
        before - table.len()
    }
}
