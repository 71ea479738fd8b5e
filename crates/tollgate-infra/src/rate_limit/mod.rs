//! Fixed-window counting stores and the limiter facade.

mod limiter;
mod memory;
mod remote;
mod script;

#[cfg(test)]
mod testing;

pub use limiter::{Limiter, LimiterOptions};
pub use memory::LocalWindowStore;
pub use remote::RemoteWindowStore;
pub use script::FIXED_WINDOW_SCRIPT;
