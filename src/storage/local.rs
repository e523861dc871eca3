//! Local filesystem snapshot storage.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! ├── arbitrum.json            # Latest snapshot of one community
//! ├── arbitrum.activity.json   # Per-user activity formatted from it
//! └── gnosis.json
//! ```

use std::path::{Path, PathBuf};

use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::pipeline::UserActivity;
use crate::storage::Snapshot;

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Location of a community's snapshot.
    pub fn snapshot_path(&self, community: &str) -> PathBuf {
        self.root_dir.join(format!("{community}.json"))
    }

    /// Write a snapshot, replacing any previous one for the same community.
    pub async fn write_snapshot(&self, snapshot: &Snapshot) -> Result<PathBuf> {
        let path = self.snapshot_path(&snapshot.stats.community);
        self.write_json(&path, snapshot).await?;
        log::info!("Snapshot saved to {}", path.display());
        Ok(path)
    }

    /// Location of a community's formatted activity.
    pub fn activity_path(&self, community: &str) -> PathBuf {
        self.root_dir.join(format!("{community}.activity.json"))
    }

    /// Write formatted activity next to the snapshot it came from.
    pub async fn write_activity(&self, community: &str, activity: &[UserActivity]) -> Result<PathBuf> {
        let path = self.activity_path(community);
        self.write_json(&path, activity).await?;
        log::info!("Activity for {} users saved to {}", activity.len(), path.display());
        Ok(path)
    }

    /// Load a community's snapshot, `None` if none was written yet.
    pub async fn load_snapshot(&self, community: &str) -> Result<Option<Snapshot>> {
        self.read_json(&self.snapshot_path(community)).await
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        self.ensure_dir(path).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }

    async fn write_json<T: Serialize + ?Sized>(&self, path: &Path, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(path, &bytes).await
    }

    /// Read JSON data, returning None if the file doesn't exist.
    async fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }
}
