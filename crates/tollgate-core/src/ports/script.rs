//! Remote script store port.

use async_trait::async_trait;

use crate::error::RateLimitError;

/// A single value in a script reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptValue {
    Integer(i64),
    Text(String),
    Nil,
}

impl ScriptValue {
    /// Reads the value as an integer, accepting decimal text.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            ScriptValue::Integer(n) => Some(*n),
            ScriptValue::Text(s) => s.trim().parse().ok(),
            ScriptValue::Nil => None,
        }
    }
}

/// Client of a store that runs server-side scripts atomically per key.
///
/// Implementations own connection management and their own call timeouts;
/// a timeout is reported as [`RateLimitError::Backend`].
#[async_trait]
pub trait ScriptClient: Send + Sync {
    /// Register `source` with the store and return its identifier.
    /// Loading the same source again yields the same identifier.
    async fn script_load(&self, source: &str) -> Result<String, RateLimitError>;

    /// Run a loaded script against `key`.
    ///
    /// Must report an unknown identifier as [`RateLimitError::NoScript`].
    async fn script_eval(
        &self,
        script_id: &str,
        key: &str,
        args: &[String],
    ) -> Result<Vec<ScriptValue>, RateLimitError>;

    /// Remove `key`, succeeding when it does not exist.
    async fn delete(&self, key: &str) -> Result<(), RateLimitError>;
}
