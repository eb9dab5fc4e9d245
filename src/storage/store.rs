//! Authoritative set of watch jobs.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::{AppError, Result};
use crate::models::{Job, JobId, JobResult};
use crate::storage::{ResultStorage, SnapshotMetadata};

/// Owns the jobs and mediates their persistence.
///
/// Jobs are never removed; completed ones stay for listing and audit. Only
/// the pipeline mutates completion state.
pub struct JobStore {
    jobs: Vec<Job>,
    storage: Arc<dyn ResultStorage>,
}

impl JobStore {
    /// Create a store, rejecting jobs that share an id.
    pub fn new(jobs: Vec<Job>, storage: Arc<dyn ResultStorage>) -> Result<Self> {
        Self::check_unique(&jobs)?;
        Ok(Self { jobs, storage })
    }

    fn check_unique(jobs: &[Job]) -> Result<()> {
        let mut seen = HashSet::new();
        for job in jobs {
            if !seen.insert(&job.id) {
                return Err(AppError::validation(format!(
                    "Duplicate job {} ({})",
                    job.id, job.itinerary
                )));
            }
        }
        Ok(())
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn get(&self, id: &JobId) -> Option<&Job> {
        self.jobs.iter().find(|job| &job.id == id)
    }

    /// 1-based position used in log context.
    pub fn position(&self, id: &JobId) -> Option<usize> {
        self.jobs.iter().position(|job| &job.id == id).map(|i| i + 1)
    }

    pub fn pending_count(&self) -> usize {
        self.jobs.iter().filter(|job| !job.completed).count()
    }

    /// True iff every tracked job is completed (vacuously true when empty).
    pub fn all_completed(&self) -> bool {
        self.jobs.iter().all(|job| job.completed)
    }

    /// Replace the job list with the jobs recorded in a snapshot.
    ///
    /// Files without a job list restore the jobs nested in their results.
    /// Returns the loaded results so callers can replay their flights.
    pub async fn load(&mut self, source: &Path) -> Result<Vec<JobResult>> {
        let data = self.storage.read_snapshot(source).await?;
        let jobs = data.restored_jobs();
        Self::check_unique(&jobs)?;

        log::info!(
            "Loaded {} jobs ({} completed) from {}",
            jobs.len(),
            jobs.iter().filter(|job| job.completed).count(),
            source.display()
        );
        self.jobs = jobs;
        Ok(data.results)
    }

    /// Persist the full job set with a pass's results, refreshing each
    /// nested job from the store first.
    pub async fn snapshot(&self, results: &[JobResult]) -> Result<SnapshotMetadata> {
        let refreshed: Vec<JobResult> = results
            .iter()
            .map(|result| {
                let mut result = result.clone();
                if let Some(job) = self.get(&result.job.id) {
                    result.job = job.clone();
                }
                result
            })
            .collect();

        self.storage.write_snapshot(&self.jobs, &refreshed).await
    }

    /// Mark a job completed and stamp the time.
    ///
    /// Returns `false` when the job was already completed; the original
    /// stamp is kept.
    pub(crate) fn mark_completed(&mut self, id: &JobId, now: DateTime<Utc>) -> Result<bool> {
        let job = self
            .jobs
            .iter_mut()
            .find(|job| &job.id == id)
            .ok_or_else(|| AppError::not_found(format!("Job {id}")))?;

        if job.completed {
            return Ok(false);
        }
        job.completed = true;
        job.completed_at = Some(now);
        Ok(true)
    }

    /// Complete every pending job whose departure has passed.
    ///
    /// Never notifies; running it twice changes nothing the second time.
    pub(crate) fn expire_departed(&mut self, now: DateTime<Utc>, grace_days: u32) -> Vec<JobId> {
        let mut expired = Vec::new();
        for (index, job) in self.jobs.iter_mut().enumerate() {
            if job.completed || !job.itinerary.has_departed(now, grace_days) {
                continue;
            }
            log::info!(
                "[Job #{}] Departure date {} has passed, retiring",
                index + 1,
                job.itinerary.departure_date
            );
            job.completed = true;
            job.completed_at = Some(now);
            expired.push(job.id.clone());
        }
        expired
    }
}
