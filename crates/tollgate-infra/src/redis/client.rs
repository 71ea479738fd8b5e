//! Redis-backed script client with connection management.

use std::future::Future;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, ErrorKind, RedisError, Value};

use tollgate_core::RateLimitError;
use tollgate_core::ports::{ScriptClient, ScriptValue};

use super::config::RedisConfig;

/// Redis client for the remote counting store.
///
/// Uses connection manager for automatic reconnection. Each command is
/// bounded by `command_timeout`; nothing is retried here.
#[derive(Clone)]
pub struct RedisScriptClient {
    conn: ConnectionManager,
    config: RedisConfig,
}

impl RedisScriptClient {
    pub async fn new(config: RedisConfig) -> Result<Self, RateLimitError> {
        let client =
            Client::open(config.url.as_str()).map_err(|e| RateLimitError::Backend(e.to_string()))?;

        // Use timeout to prevent hanging if Redis is unreachable
        let conn_manager_fut = ConnectionManager::new(client);
        let conn = tokio::time::timeout(config.connect_timeout, conn_manager_fut)
            .await
            .map_err(|_| RateLimitError::Backend("Connection timed out".to_string()))?
            .map_err(|e| RateLimitError::Backend(e.to_string()))?;

        tracing::info!(url = %config.url, "Connected to Redis rate limit store");

        Ok(Self { conn, config })
    }

    /// Create from environment configuration.
    pub async fn from_env() -> Result<Self, RateLimitError> {
        Self::new(RedisConfig::from_env()).await
    }

    async fn bounded<T, F>(&self, op: &str, fut: F) -> Result<T, RateLimitError>
    where
        F: Future<Output = Result<T, RedisError>>,
    {
        tokio::time::timeout(self.config.command_timeout, fut)
            .await
            .map_err(|_| RateLimitError::Backend(format!("{} timed out", op)))?
            .map_err(|e| match e.kind() {
                ErrorKind::NoScriptError => RateLimitError::NoScript(e.to_string()),
                _ => RateLimitError::Backend(e.to_string()),
            })
    }
}

fn script_value(value: Value) -> Result<ScriptValue, RateLimitError> {
    match value {
        Value::Int(n) => Ok(ScriptValue::Integer(n)),
        Value::Nil => Ok(ScriptValue::Nil),
        Value::BulkString(bytes) => String::from_utf8(bytes)
            .map(ScriptValue::Text)
            .map_err(|e| RateLimitError::Decode(e.to_string())),
        Value::SimpleString(s) => Ok(ScriptValue::Text(s)),
        other => Err(RateLimitError::Decode(format!(
            "unsupported reply value: {:?}",
            other
        ))),
    }
}

#[async_trait]
impl ScriptClient for RedisScriptClient {
    async fn script_load(&self, source: &str) -> Result<String, RateLimitError> {
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("SCRIPT");
        cmd.arg("LOAD").arg(source);

        self.bounded("SCRIPT LOAD", cmd.query_async(&mut conn))
            .await
            .map_err(|e| match e {
                RateLimitError::Backend(reason) => RateLimitError::ScriptLoad(reason),
                other => other,
            })
    }

    async fn script_eval(
        &self,
        script_id: &str,
        key: &str,
        args: &[String],
    ) -> Result<Vec<ScriptValue>, RateLimitError> {
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("EVALSHA");
        cmd.arg(script_id).arg(1).arg(key);
        for arg in args {
            cmd.arg(arg);
        }

        let reply: Value = self.bounded("EVALSHA", cmd.query_async(&mut conn)).await?;

        match reply {
            Value::Array(items) => items.into_iter().map(script_value).collect(),
            other => Err(RateLimitError::Decode(format!(
                "expected an array reply, got {:?}",
                other
            ))),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), RateLimitError> {
        let mut conn = self.conn.clone();
        self.bounded("DEL", conn.del::<_, ()>(key)).await
    }
}
