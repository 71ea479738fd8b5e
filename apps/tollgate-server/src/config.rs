//! Application configuration loaded from environment variables.

use std::env;
use std::time::Duration;

use tollgate_core::domain::{DEFAULT_LIMIT, DEFAULT_WINDOW};

#[cfg(feature = "redis")]
use tollgate_infra::RedisConfig;

/// Which counting store backs the limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Memory,
    Redis,
}

impl Backend {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "memory" | "mem" | "local" => Some(Backend::Memory),
            "redis" | "remote" => Some(Backend::Redis),
            _ => None,
        }
    }
}

/// Rate limiter settings.
#[derive(Debug, Clone)]
pub struct RateLimitSettings {
    pub max_requests: i64,
    pub window: Duration,
    pub backend: Backend,
    pub key_prefix: Option<String>,
    /// Honor an RFC 3339 `Date` request header as the request time.
    pub trust_date_header: bool,
    /// Start with the in-memory store when Redis cannot be reached.
    pub fallback_to_memory: bool,
    /// Cron schedule for sweeping ended in-memory windows.
    pub sweep_cron: String,
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub rate_limit: RateLimitSettings,
    #[cfg(feature = "redis")]
    pub redis: RedisConfig,
}

fn flag(name: &str) -> bool {
    env::var(name)
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false)
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let backend = env::var("RATE_LIMIT_BACKEND")
            .ok()
            .map(|v| {
                Backend::parse(&v).unwrap_or_else(|| {
                    tracing::warn!(value = %v, "Unknown RATE_LIMIT_BACKEND, using memory");
                    Backend::Memory
                })
            })
            .unwrap_or(Backend::Memory);

        // Non-positive values are normalized by the limiter itself
        let rate_limit = RateLimitSettings {
            max_requests: env::var("RATE_LIMIT_MAX_REQUESTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_LIMIT),
            window: env::var("RATE_LIMIT_WINDOW_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_WINDOW),
            backend,
            key_prefix: env::var("RATE_LIMIT_KEY_PREFIX")
                .ok()
                .filter(|s| !s.is_empty()),
            trust_date_header: flag("RATE_LIMIT_TRUST_DATE_HEADER"),
            fallback_to_memory: flag("RATE_LIMIT_FALLBACK_TO_MEMORY"),
            sweep_cron: env::var("RATE_LIMIT_SWEEP_CRON")
                .unwrap_or_else(|_| "0 */5 * * * *".to_string()),
        };

        Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            rate_limit,
            #[cfg(feature = "redis")]
            redis: RedisConfig::from_env(),
        }
    }
}
