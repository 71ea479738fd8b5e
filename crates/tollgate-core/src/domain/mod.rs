//! Domain model - quota, per-key window state and limiter results.

mod quota;
mod window;

pub use quota::{DEFAULT_LIMIT, DEFAULT_WINDOW, Quota};
pub use window::{RateLimitResult, RawWindow, ResetAt, WindowState};
