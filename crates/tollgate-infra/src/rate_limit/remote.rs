//! Remote counting store driven by one atomic server-side script.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use tollgate_core::RateLimitError;
use tollgate_core::domain::{Quota, RawWindow};
use tollgate_core::ports::{ScriptClient, ScriptValue, WindowStore};

use super::script::FIXED_WINDOW_SCRIPT;

/// Number of fields in a script reply: remaining and reset.
const REPLY_FIELDS: usize = 2;

/// Remote store where the whole window update runs inside the store.
///
/// Atomicity per key comes from the store executing the script as one
/// unit, so any number of processes may share it without a client-side
/// lock. Rollover relies on the store expiring the key after one window.
pub struct RemoteWindowStore {
    client: Arc<dyn ScriptClient>,
    /// Identifier of the loaded script
    script_id: RwLock<String>,
    key_prefix: Option<String>,
}

impl RemoteWindowStore {
    /// Loads the window script and returns a store bound to it.
    pub async fn new(client: Arc<dyn ScriptClient>) -> Result<Self, RateLimitError> {
        let script_id = client.script_load(FIXED_WINDOW_SCRIPT).await?;
        tracing::info!(script_id = %script_id, "Loaded fixed window script");

        Ok(Self {
            client,
            script_id: RwLock::new(script_id),
            key_prefix: None,
        })
    }

    /// Namespaces every store key as `prefix:key`.
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    fn make_key(&self, key: &str) -> String {
        match &self.key_prefix {
            Some(prefix) => format!("{}:{}", prefix, key),
            None => key.to_string(),
        }
    }

    async fn eval(&self, key: &str, args: &[String]) -> Result<Vec<ScriptValue>, RateLimitError> {
        let script_id = self.script_id.read().await.clone();

        match self.client.script_eval(&script_id, key, args).await {
            Err(RateLimitError::NoScript(reason)) => {
                // The store dropped its script cache; register again and
                // reissue the same invocation once.
                tracing::warn!(
                    script_id = %script_id,
                    reason = %reason,
                    "Reloading fixed window script"
                );
                let reloaded = self.client.script_load(FIXED_WINDOW_SCRIPT).await?;
                *self.script_id.write().await = reloaded.clone();
                self.client.script_eval(&reloaded, key, args).await
            }
            other => other,
        }
    }
}

fn decode_reply(reply: &[ScriptValue]) -> Result<RawWindow, RateLimitError> {
    if reply.len() != REPLY_FIELDS {
        return Err(RateLimitError::Decode(format!(
            "expected {} fields, got {}",
            REPLY_FIELDS,
            reply.len()
        )));
    }

    let field = |index: usize, name: &str| {
        reply[index].as_integer().ok_or_else(|| {
            RateLimitError::Decode(format!("{} is not an integer: {:?}", name, reply[index]))
        })
    };

    let remaining = field(0, "remaining")?;
    let reset = field(1, "reset")?;

    Ok(RawWindow::remote(remaining, reset))
}

#[async_trait]
impl WindowStore for RemoteWindowStore {
    async fn check_and_decrement(
        &self,
        key: &str,
        now: DateTime<Utc>,
        quota: Quota,
    ) -> Result<RawWindow, RateLimitError> {
        let store_key = self.make_key(key);
        let args = [
            now.timestamp_millis().to_string(),
            quota.limit().to_string(),
            quota.window_millis().to_string(),
        ];

        let reply = self.eval(&store_key, &args).await?;
        decode_reply(&reply)
    }

    async fn remove(&self, key: &str) -> Result<(), RateLimitError> {
        self.client.delete(&self.make_key(key)).await
    }
}
