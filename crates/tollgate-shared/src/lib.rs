//! # Tollgate Shared
//!
//! Response bodies shared by the tollgate server and its clients.

pub mod response;

pub use response::{ApiResponse, ErrorResponse};
