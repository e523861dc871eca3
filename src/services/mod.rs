//! Service layer for snapshot acquisition.
//!
//! This module contains the fetch strategies:
//! - Flat listings paged until empty (`PageFetcher`)
//! - Posts paged per topic (`TopicPostFetcher`)
//! - Likes and profiles looped per user (`UserFetcher`)
//!
//! All of them talk to the forum through [`ForumClient`] and share the
//! backoff policy in [`backoff`].

pub mod backoff;
pub mod client;
pub mod cursor;
mod pages;
mod payload;
mod topics;
mod users;

pub use backoff::RetryState;
pub use client::{ForumClient, HttpClient, Outcome};
pub use cursor::{OffsetCursor, PageCursor};
pub use pages::{Listing, PageFetcher};
pub use topics::{TopicPostFetcher, total_pages};
pub use users::{PROFILE_MARKER, UserFetcher};
