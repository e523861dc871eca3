//! Pipeline entry points.
//!
//! - `Acquirer`: Drive the fetch strategies against any `ForumClient`
//! - `run_acquire`: Acquire a configured community over HTTP
//! - `format_activity`: Join a snapshot into per-user activity records

pub mod acquire;
pub mod format;

pub use acquire::{Acquirer, run_acquire};
pub use format::{ActivityFormatter, UserActivity, format_activity};
