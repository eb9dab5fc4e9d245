//! Job state and result persistence.
//!
//! Every pass that changed the job set leaves one immutable snapshot behind:
//!
//! ```text
//! {output_dir}/
//! ├── jobs-1675593485516.json
//! ├── jobs-1675594085733.json
//! └── ...
//! ```
//!
//! Snapshots can be loaded back into a [`JobStore`] to resume or replay a run.

pub mod local;
mod store;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{Job, JobResult, SnapshotData};

// Re-export for convenience
pub use local::LocalStorage;
pub use store::JobStore;

/// Metadata about a snapshot write.
#[derive(Debug, Clone)]
pub struct SnapshotMetadata {
    /// Number of results in the file
    pub result_count: usize,
    /// Where the snapshot landed
    pub location: PathBuf,
    pub timestamp: DateTime<Utc>,
}

/// Trait for result storage backends.
#[async_trait]
pub trait ResultStorage: Send + Sync {
    /// Write the job set and a pass's results as a new snapshot; never
    /// overwrites an earlier one.
    async fn write_snapshot(&self, jobs: &[Job], results: &[JobResult])
    -> Result<SnapshotMetadata>;

    /// Read a snapshot back. Fails with `NotFound` when it does not exist.
    async fn read_snapshot(&self, location: &Path) -> Result<SnapshotData>;

    /// Most recent snapshot, if any.
    async fn latest_snapshot(&self) -> Result<Option<PathBuf>>;
}
