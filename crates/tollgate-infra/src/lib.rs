//! # Tollgate Infrastructure
//!
//! Concrete counting stores behind the ports defined in `tollgate-core`,
//! and the [`Limiter`] facade that picks one of them at construction.
//!
//! ## Feature Flags
//!
//! - `redis` (default) - [`RedisScriptClient`], a `ScriptClient` over Redis
//! - `minimal` - in-process counting only

pub mod rate_limit;

#[cfg(feature = "redis")]
pub mod redis;

pub use rate_limit::{Limiter, LimiterOptions, LocalWindowStore, RemoteWindowStore};

#[cfg(feature = "redis")]
pub use self::redis::{RedisConfig, RedisScriptClient};
