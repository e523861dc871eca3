//! Snapshot persistence.
//!
//! The acquired dataset is handed to the analytics stage as a JSON file
//! per community, written next to the run's stats.

pub mod local;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{AcquisitionStats, RawDataset};

// Re-export for convenience
pub use local::LocalStorage;

/// A stored acquisition: run stats plus the dataset itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub stats: AcquisitionStats,
    pub dataset: RawDataset,
}

impl Snapshot {
    /// Check the stored dataset still matches its recorded fingerprint and
    /// key invariants.
    pub fn verify(&self) -> Result<()> {
        self.dataset.check_integrity()?;
        let fingerprint = self.dataset.fingerprint()?;
        if fingerprint != self.stats.fingerprint {
            return Err(crate::error::AppError::validation(format!(
                "snapshot fingerprint mismatch: recorded {}, computed {fingerprint}",
                self.stats.fingerprint
            )));
        }
        Ok(())
    }
}
