// src/models/result.rs

//! Per-pass job results and the snapshot file format.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::{Flight, Job, JobId};

/// Error recorded when the runner could not locate the target flight.
pub const FLIGHT_NOT_FOUND: &str = "Unable to locate desired flight";

/// Why a job produced no usable flight in a pass.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum JobFailure {
    /// Flight source failed; retried next tick
    Fetch(String),
    /// Search ran but the flight number was absent
    NotFound(String),
    /// Departure date no longer searchable; terminal
    ExpiredItinerary(String),
}

impl JobFailure {
    pub fn message(&self) -> &str {
        match self {
            Self::Fetch(m) | Self::NotFound(m) | Self::ExpiredItinerary(m) => m,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::ExpiredItinerary(_))
    }
}

impl fmt::Display for JobFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl From<AppError> for JobFailure {
    fn from(error: AppError) -> Self {
        match error {
            AppError::ExpiredItinerary(message) => Self::ExpiredItinerary(message),
            AppError::NotFound(message) => Self::NotFound(message),
            other => Self::Fetch(other.to_string()),
        }
    }
}

impl From<JobFailure> for AppError {
    fn from(failure: JobFailure) -> Self {
        match failure {
            JobFailure::Fetch(message) => AppError::fetch("recorded result", message),
            JobFailure::NotFound(message) => AppError::NotFound(message),
            JobFailure::ExpiredItinerary(message) => AppError::ExpiredItinerary(message),
        }
    }
}

/// Outcome of one pass for one job.
///
/// Exactly one of `flight` / `error` is set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobResult {
    /// Job state as of the end of the pass
    pub job: Job,

    #[serde(default)]
    pub flight: Option<Flight>,

    #[serde(default)]
    pub error: Option<JobFailure>,
}

impl JobResult {
    pub fn found(job: Job, flight: Flight) -> Self {
        Self {
            job,
            flight: Some(flight),
            error: None,
        }
    }

    pub fn failed(job: Job, error: JobFailure) -> Self {
        Self {
            job,
            flight: None,
            error: Some(error),
        }
    }

    pub fn job_id(&self) -> &JobId {
        &self.job.id
    }
}

/// Contents of one snapshot file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotData {
    /// When the pass finished
    pub created_at: DateTime<Utc>,
    pub count: usize,
    /// Every tracked job, completed ones included
    #[serde(default)]
    pub jobs: Vec<Job>,
    /// Results of the pass that wrote the snapshot
    pub results: Vec<JobResult>,
}

impl SnapshotData {
    pub fn new(jobs: Vec<Job>, results: Vec<JobResult>) -> Self {
        Self {
            created_at: Utc::now(),
            count: results.len(),
            jobs,
            results,
        }
    }

    /// Jobs to restore: the recorded job list, or the result jobs when the
    /// file carries none.
    pub fn restored_jobs(&self) -> Vec<Job> {
        if !self.jobs.is_empty() {
            return self.jobs.clone();
        }

        let mut jobs: Vec<Job> = Vec::with_capacity(self.results.len());
        for result in &self.results {
            match jobs.iter().position(|job| job.id == result.job.id) {
                // keep the most advanced state for repeated entries
                Some(i) => {
                    if result.job.completed && !jobs[i].completed {
                        jobs[i] = result.job.clone();
                    }
                }
                None => jobs.push(result.job.clone()),
            }
        }
        jobs
    }
}

/// Accepted on-disk layouts; bare arrays come from hand-assembled batches.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum SnapshotFile {
    Wrapped(SnapshotData),
    Bare(Vec<JobResult>),
}

impl SnapshotFile {
    pub fn into_data(self) -> SnapshotData {
        match self {
            Self::Wrapped(data) => data,
            Self::Bare(results) => SnapshotData::new(Vec::new(), results),
        }
    }
}
