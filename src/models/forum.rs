//! Forum entities read from the flat listings.
//!
//! Only the fields the fetch loops need are typed; everything else the
//! forum sends is kept verbatim in `extra` so the raw records reach the
//! analytics stage unchanged.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A discussion thread from the topic listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Topic {
    /// Topic identifier
    pub id: u64,

    /// Category the topic belongs to
    #[serde(default)]
    pub category_id: Option<u64>,

    /// Tag names, absent when the forum omits them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,

    /// Number of posts the listing declared for this topic
    #[serde(default)]
    pub posts_count: u64,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// An entry of the user directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DirectoryItem {
    pub user: UserRef,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DirectoryItem {
    pub fn username(&self) -> &str {
        &self.user.username
    }
}

/// The user object nested inside a directory entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserRef {
    /// Unique user key
    pub username: String,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
