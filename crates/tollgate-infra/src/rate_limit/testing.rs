//! In-process stand-in for a script store, for tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use tollgate_core::RateLimitError;
use tollgate_core::ports::{ScriptClient, ScriptValue};

use super::script::FIXED_WINDOW_SCRIPT;

struct Record {
    remains: i64,
    reset: i64,
    /// Expiry on the store's own clock, taken from the `now` argument
    expires_at: i64,
}

/// Executes the fixed window script's semantics under one mutex, the way
/// the store serializes script runs. Key expiry is evaluated against the
/// `now` argument of each call.
pub(crate) struct FakeScriptClient {
    records: Mutex<HashMap<String, Record>>,
    scripts: Mutex<HashSet<String>>,
    failure: Mutex<Option<RateLimitError>>,
    loads: AtomicUsize,
}

impl FakeScriptClient {
    pub(crate) fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            scripts: Mutex::new(HashSet::new()),
            failure: Mutex::new(None),
            loads: AtomicUsize::new(0),
        }
    }

    pub(crate) fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// Forget every loaded script, like SCRIPT FLUSH or a store restart.
    pub(crate) fn flush_scripts(&self) {
        self.scripts.lock().unwrap().clear();
    }

    /// Make every later call fail with `err`.
    pub(crate) fn fail_with(&self, err: RateLimitError) {
        *self.failure.lock().unwrap() = Some(err);
    }

    pub(crate) fn stored_remains(&self, key: &str) -> Option<i64> {
        self.records.lock().unwrap().get(key).map(|r| r.remains)
    }

    fn check_failure(&self) -> Result<(), RateLimitError> {
        match self.failure.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn script_id(source: &str) -> String {
    format!("fake-{}", source.len())
}

#[async_trait]
impl ScriptClient for FakeScriptClient {
    async fn script_load(&self, source: &str) -> Result<String, RateLimitError> {
        self.check_failure()?;
        if source != FIXED_WINDOW_SCRIPT {
            return Err(RateLimitError::ScriptLoad("unknown script".into()));
        }

        self.loads.fetch_add(1, Ordering::SeqCst);
        let id = script_id(source);
        self.scripts.lock().unwrap().insert(id.clone());
        Ok(id)
    }

    async fn script_eval(
        &self,
        script_id: &str,
        key: &str,
        args: &[String],
    ) -> Result<Vec<ScriptValue>, RateLimitError> {
        self.check_failure()?;
        if !self.scripts.lock().unwrap().contains(script_id) {
            return Err(RateLimitError::NoScript(script_id.to_string()));
        }

        let num = |i: usize| -> Result<i64, RateLimitError> {
            args.get(i)
                .and_then(|a| a.parse().ok())
                .ok_or_else(|| RateLimitError::Backend(format!("bad argument {}", i + 1)))
        };
        let (now, limit, window) = (num(0)?, num(1)?, num(2)?);

        let mut records = self.records.lock().unwrap();
        if records.get(key).is_some_and(|r| r.expires_at <= now) {
            records.remove(key);
        }

        match records.get_mut(key) {
            None => {
                let record = Record {
                    remains: limit - 1,
                    reset: now + window,
                    expires_at: now + window,
                };
                let reply = vec![
                    ScriptValue::Integer(record.remains),
                    ScriptValue::Integer(record.reset),
                ];
                records.insert(key.to_string(), record);
                Ok(reply)
            }
            Some(record) => {
                record.remains -= 1;
                Ok(vec![
                    ScriptValue::Integer(record.remains.max(-1)),
                    ScriptValue::Integer(record.reset),
                ])
            }
        }
    }

    async fn delete(&self, key: &str) -> Result<(), RateLimitError> {
        self.check_failure()?;
        self.records.lock().unwrap().remove(key);
        Ok(())
    }
}
