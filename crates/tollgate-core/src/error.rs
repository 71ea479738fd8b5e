//! Rate limiting error types.

use thiserror::Error;

/// Failures surfaced by a counting backend.
///
/// Every variant is a backend error: the engine never recovers from one
/// locally, it wraps the collaborator's message and hands it to the caller.
/// An exhausted quota is not an error, it is a negative `remaining`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RateLimitError {
    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Script load failed: {0}")]
    ScriptLoad(String),

    #[error("Script not loaded: {0}")]
    NoScript(String),

    #[error("Unexpected backend reply: {0}")]
    Decode(String),
}

impl RateLimitError {
    /// All rate limit errors originate in the backend.
    pub fn is_backend(&self) -> bool {
        true
    }

    /// True when the backend answered but the reply could not be decoded.
    pub fn is_decode(&self) -> bool {
        matches!(self, RateLimitError::Decode(_))
    }
}
