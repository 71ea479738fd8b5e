//! Background jobs.

#[cfg(feature = "scheduler")]
pub mod scheduler;

#[cfg(feature = "scheduler")]
pub use scheduler::{Scheduler, SchedulerConfig};
