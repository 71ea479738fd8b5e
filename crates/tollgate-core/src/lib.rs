//! # Tollgate Core
//!
//! The domain layer of the tollgate rate limiter.
//! This crate holds the fixed-window model and the ports the counting
//! backends implement, with zero infrastructure dependencies.

pub mod domain;
pub mod error;
pub mod ports;

pub use error::RateLimitError;
