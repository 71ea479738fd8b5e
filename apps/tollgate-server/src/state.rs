//! Application state - shared across all handlers.

use std::sync::Arc;

use tollgate_core::RateLimitError;
use tollgate_core::ports::ScriptClient;
use tollgate_infra::{Limiter, LimiterOptions};

use crate::config::{AppConfig, Backend};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub limiter: Arc<Limiter>,
    pub trust_date_header: bool,
}

impl AppState {
    /// Build the application state with the configured counting store.
    pub async fn new(config: &AppConfig) -> Result<Self, RateLimitError> {
        let settings = &config.rate_limit;

        let client = match settings.backend {
            Backend::Redis => remote_client(config).await?,
            Backend::Memory => None,
        };

        let limiter = Limiter::new(LimiterOptions {
            limit: settings.max_requests,
            window: settings.window,
            client,
            key_prefix: settings.key_prefix.clone(),
            ..Default::default()
        })
        .await?;

        tracing::info!(backend = limiter.backend(), "Application state initialized");

        Ok(Self {
            limiter: Arc::new(limiter),
            trust_date_header: settings.trust_date_header,
        })
    }
}

#[cfg(feature = "redis")]
async fn remote_client(
    config: &AppConfig,
) -> Result<Option<Arc<dyn ScriptClient>>, RateLimitError> {
    use tollgate_infra::RedisScriptClient;

    match RedisScriptClient::new(config.redis.clone()).await {
        Ok(client) => Ok(Some(Arc::new(client))),
        Err(e) if config.rate_limit.fallback_to_memory => {
            tracing::error!(
                "Failed to connect to Redis: {}. Using in-memory fallback.",
                e
            );
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

#[cfg(not(feature = "redis"))]
async fn remote_client(
    _config: &AppConfig,
) -> Result<Option<Arc<dyn ScriptClient>>, RateLimitError> {
    tracing::warn!("Built without redis feature - using in-memory limiter");
    Ok(None)
}
