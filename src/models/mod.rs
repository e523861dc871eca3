// src/models/mod.rs

//! Domain models for snapshot acquisition.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod dataset;
mod forum;

// Re-export all public types
pub use config::{
    Community, Config, Endpoints, FetchConfig, PathsConfig, TOPIC_ID_PLACEHOLDER,
    USERNAME_PLACEHOLDER,
};
pub use dataset::{AcquisitionStats, RawDataset, TopicPosts, UserLikes, UserProfile};
pub use forum::{DirectoryItem, Topic, UserRef};
