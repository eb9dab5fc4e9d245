//! Local filesystem storage implementation.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! ├── jobs-<unix-millis>.json      # One snapshot per pass
//! └── jobs-<unix-millis>-<n>.json  # Same-millisecond collision
//! ```
//!
//! Writes go to a temporary file that is renamed into place, so a process
//! killed mid-write never leaves a partial snapshot.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::{Job, JobResult, SnapshotData, SnapshotFile};
use crate::storage::{ResultStorage, SnapshotMetadata};

const SNAPSHOT_PREFIX: &str = "jobs-";
const SNAPSHOT_EXT: &str = ".json";

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

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
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
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }

    /// Write JSON data.
    async fn write_json<T: Serialize + ?Sized>(&self, path: &Path, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(path, &bytes).await
    }

    /// Pick an unused snapshot path for the given timestamp.
    async fn next_snapshot_path(&self, millis: i64) -> Result<PathBuf> {
        let mut attempt = 0u32;
        loop {
            let key = if attempt == 0 {
                format!("{SNAPSHOT_PREFIX}{millis}{SNAPSHOT_EXT}")
            } else {
                format!("{SNAPSHOT_PREFIX}{millis}-{attempt}{SNAPSHOT_EXT}")
            };
            let path = self.path(&key);
            if !tokio::fs::try_exists(&path).await? {
                return Ok(path);
            }
            attempt += 1;
        }
    }

    /// Resolve a user-supplied snapshot location.
    fn resolve(&self, location: &Path) -> PathBuf {
        if location.is_absolute() || location.exists() {
            location.to_path_buf()
        } else {
            self.root_dir.join(location)
        }
    }
}

/// Sort key `(millis, collision index)` of a snapshot file name.
fn snapshot_order(file_name: &str) -> Option<(i64, u32)> {
    let stem = file_name
        .strip_prefix(SNAPSHOT_PREFIX)?
        .strip_suffix(SNAPSHOT_EXT)?;
    match stem.split_once('-') {
        Some((millis, n)) => Some((millis.parse().ok()?, n.parse().ok()?)),
        None => Some((stem.parse().ok()?, 0)),
    }
}

#[async_trait]
impl ResultStorage for LocalStorage {
    async fn write_snapshot(
        &self,
        jobs: &[Job],
        results: &[JobResult],
    ) -> Result<SnapshotMetadata> {
        let data = SnapshotData::new(jobs.to_vec(), results.to_vec());
        let path = self.next_snapshot_path(data.created_at.timestamp_millis()).await?;

        self.write_json(&path, &data).await?;
        log::info!(
            "Snapshot: {} jobs, {} results written to {}",
            data.jobs.len(),
            data.count,
            path.display()
        );

        Ok(SnapshotMetadata {
            result_count: data.count,
            location: path,
            timestamp: data.created_at,
        })
    }

    async fn read_snapshot(&self, location: &Path) -> Result<SnapshotData> {
        let path = self.resolve(location);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AppError::not_found(format!(
                    "Saved results file {}",
                    path.display()
                )));
            }
            Err(e) => return Err(AppError::Io(e)),
        };

        let file: SnapshotFile = serde_json::from_slice(&bytes)?;
        Ok(file.into_data())
    }

    async fn latest_snapshot(&self) -> Result<Option<PathBuf>> {
        let mut entries = match tokio::fs::read_dir(&self.root_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(AppError::Io(e)),
        };

        let mut latest: Option<((i64, u32), PathBuf)> = None;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(order) = name.to_str().and_then(snapshot_order) else {
                continue;
            };
            if latest.as_ref().is_none_or(|(best, _)| order > *best) {
                latest = Some((order, entry.path()));
            }
        }

        Ok(latest.map(|(_, path)| path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Itinerary, Job, JobFailure};
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn result(flight_number: &str) -> JobResult {
        let job = Job::new(
            Itinerary {
                origin: "EWR".into(),
                destination: "TLV".into(),
                departure_date: NaiveDate::from_ymd_opt(2030, 2, 11).unwrap(),
                flight_number: flight_number.into(),
                target_class: "PZ".into(),
            },
            None,
        );
        JobResult::failed(job, JobFailure::Fetch("timeout".into()))
    }

    #[test]
    fn test_snapshot_order() {
        assert_eq!(snapshot_order("jobs-1675593485516.json"), Some((1675593485516, 0)));
        assert_eq!(snapshot_order("jobs-1675593485516-2.json"), Some((1675593485516, 2)));
        assert_eq!(snapshot_order("jobs-abc.json"), None);
        assert_eq!(snapshot_order("config.toml"), None);
    }

    #[tokio::test]
    async fn test_write_and_read_snapshot() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        let pending = result("999");
        let mut done = result("1").job;
        done.completed = true;
        let jobs = vec![done, pending.job.clone()];

        let meta = storage
            .write_snapshot(&jobs, std::slice::from_ref(&pending))
            .await
            .unwrap();
        assert_eq!(meta.result_count, 1);
        assert!(meta.location.exists());

        let loaded = storage.read_snapshot(&meta.location).await.unwrap();
        assert_eq!(loaded.results, vec![pending]);
        assert_eq!(loaded.jobs, jobs);
        assert_eq!(loaded.created_at, meta.timestamp);
    }

    #[tokio::test]
    async fn test_snapshots_never_overwrite() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        let first = storage.write_snapshot(&[], &[result("1")]).await.unwrap();
        let second = storage.write_snapshot(&[], &[result("2")]).await.unwrap();
        assert_ne!(first.location, second.location);

        let latest = storage.latest_snapshot().await.unwrap().unwrap();
        assert_eq!(latest, second.location);
        assert_eq!(
            storage.read_snapshot(&first.location).await.unwrap().results,
            vec![result("1")]
        );
    }

    #[tokio::test]
    async fn test_read_missing_snapshot_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        let err = storage
            .read_snapshot(Path::new("jobs-1.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_latest_snapshot_missing_dir() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path().join("nope"));
        assert!(storage.latest_snapshot().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reads_bare_array_file() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        let path = tmp.path().join("saved.json");
        std::fs::write(&path, serde_json::to_vec(&vec![result("999")]).unwrap()).unwrap();

        let loaded = storage.read_snapshot(&path).await.unwrap();
        assert_eq!(loaded.results.len(), 1);
        assert!(loaded.jobs.is_empty());
        assert_eq!(loaded.restored_jobs(), vec![result("999").job]);
    }
}
