//! The assembled acquisition output.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use super::{DirectoryItem, Topic};
use crate::error::{AppError, Result};

/// Everything acquired from one community in one run.
///
/// Ordering: `users` and `topics` keep request order, `posts` is keyed by
/// ascending topic id, `likes` and `profiles` keep first-seen user order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RawDataset {
    pub users: Vec<DirectoryItem>,
    pub topics: Vec<Topic>,
    pub posts: BTreeMap<u64, TopicPosts>,
    pub likes: Vec<UserLikes>,
    pub profiles: Vec<UserProfile>,
}

/// Posts gathered for one topic.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TopicPosts {
    pub category_id: Option<u64>,
    pub tags: Option<Vec<String>>,
    pub posts: Vec<Value>,
}

/// Like actions gathered for one user. Never empty.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserLikes {
    pub username: String,
    #[serde(rename = "user_actions")]
    pub actions: Vec<Value>,
}

/// Public profile of one user.
///
/// `username` is the name the profile was requested for, not whatever the
/// document spells; forums may answer with a different case or a new name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    pub username: String,
    pub document: Value,
}

impl RawDataset {
    /// Check that every posts key, like entry and profile refers to a
    /// topic or user present in the listings.
    pub fn check_integrity(&self) -> Result<()> {
        let topic_ids: HashSet<u64> = self.topics.iter().map(|t| t.id).collect();
        if let Some(id) = self.posts.keys().find(|id| !topic_ids.contains(id)) {
            return Err(AppError::validation(format!(
                "posts recorded for unknown topic {id}"
            )));
        }

        let usernames: HashSet<&str> = self.users.iter().map(|u| u.username()).collect();
        if let Some(entry) = self
            .likes
            .iter()
            .find(|l| !usernames.contains(l.username.as_str()))
        {
            return Err(AppError::validation(format!(
                "likes recorded for unknown user {}",
                entry.username
            )));
        }
        if let Some(entry) = self.likes.iter().find(|l| l.actions.is_empty()) {
            return Err(AppError::validation(format!(
                "empty likes record for user {}",
                entry.username
            )));
        }
        if let Some(profile) = self
            .profiles
            .iter()
            .find(|p| !usernames.contains(p.username.as_str()))
        {
            return Err(AppError::validation(format!(
                "profile recorded for unknown user {}",
                profile.username
            )));
        }
        Ok(())
    }

    /// Hex SHA-256 of the dataset's JSON encoding.
    pub fn fingerprint(&self) -> Result<String> {
        let bytes = serde_json::to_vec(self)?;
        Ok(hex::encode(Sha256::digest(&bytes)))
    }

    /// Total posts across all topics.
    pub fn post_count(&self) -> usize {
        self.posts.values().map(|t| t.posts.len()).sum()
    }
}

/// Counters and timing for one acquisition run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionStats {
    pub community: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub user_count: usize,
    pub topic_count: usize,
    pub post_count: usize,
    pub liking_user_count: usize,
    pub profile_count: usize,
    pub fingerprint: String,
}

impl AcquisitionStats {
    pub fn new(
        community: &str,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        dataset: &RawDataset,
    ) -> Result<Self> {
        Ok(Self {
            community: community.to_string(),
            start_time,
            end_time,
            user_count: dataset.users.len(),
            topic_count: dataset.topics.len(),
            post_count: dataset.post_count(),
            liking_user_count: dataset.likes.len(),
            profile_count: dataset.profiles.len(),
            fingerprint: dataset.fingerprint()?,
        })
    }

    pub fn elapsed_secs(&self) -> i64 {
        (self.end_time - self.start_time).num_seconds()
    }
}
