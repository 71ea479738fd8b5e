//! Redis implementation of the script store port.

mod client;
mod config;

pub use client::RedisScriptClient;
pub use config::RedisConfig;
