//! Ports - trait definitions for the limiter's collaborators.
//! These are the "interfaces" that infrastructure must implement.

mod clock;
mod rate_limit;
mod script;
mod store;

pub use clock::{Clock, SystemClock};
pub use rate_limit::RateLimiter;
pub use script::{ScriptClient, ScriptValue};
pub use store::WindowStore;
