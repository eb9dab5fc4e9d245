// src/pipeline/runner.rs

//! Job runner: one sequential dispatch over the pending jobs.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::{AppError, Result};
use crate::models::{FLIGHT_NOT_FOUND, Flight, Itinerary, Job, JobFailure, JobResult};
use crate::services::FlightSource;
use crate::storage::JobStore;

/// Drives each pending job through the flight source.
///
/// Jobs run one at a time; the source is a single shared resource.
pub struct JobRunner {
    source: Arc<dyn FlightSource>,
    fetch_timeout: Duration,
    grace_days: u32,
}

impl JobRunner {
    pub fn new(source: Arc<dyn FlightSource>, fetch_timeout: Duration, grace_days: u32) -> Self {
        Self {
            source,
            fetch_timeout,
            grace_days,
        }
    }

    /// Run one pass at the current time.
    pub async fn run(&self, store: &mut JobStore) -> Vec<JobResult> {
        self.run_at(store, Utc::now()).await
    }

    /// Run one pass as of `now`.
    ///
    /// Completed jobs are skipped and departed jobs retired before anything
    /// is dispatched. Results keep store order; a failing job never stops the
    /// jobs after it.
    pub async fn run_at(&self, store: &mut JobStore, now: DateTime<Utc>) -> Vec<JobResult> {
        store.expire_departed(now, self.grace_days);

        let mut pending: Vec<(usize, Job)> = Vec::new();
        for (index, job) in store.jobs().iter().enumerate() {
            if job.completed {
                log::debug!("[Job #{}] Already completed, skipping...", index + 1);
            } else {
                pending.push((index + 1, job.clone()));
            }
        }

        let mut results = Vec::with_capacity(pending.len());
        for (label, job) in pending {
            results.push(self.run_job(label, job).await);
        }
        results
    }

    async fn run_job(&self, label: usize, job: Job) -> JobResult {
        log::info!("[Job #{}] Executing {}...", label, job.itinerary);

        let flights = match self.fetch(&job.itinerary).await {
            Ok(flights) => flights,
            Err(e) => {
                log::warn!("[Job #{}] Search failed: {}", label, e);
                return JobResult::failed(job, JobFailure::from(e));
            }
        };
        log::debug!("[Job #{}] Total flights found: {}", label, flights.len());

        match select_flight(&flights, &job.itinerary.flight_number) {
            Some(flight) => {
                log::debug!("[Job #{}] Located target flight: UA {}", label, flight.flight_number);
                let flight = flight.clone();
                JobResult::found(job, flight)
            }
            None => {
                log::warn!(
                    "[Job #{}] Unable to locate target flight: {}",
                    label,
                    job.itinerary.flight_number
                );
                JobResult::failed(job, JobFailure::NotFound(FLIGHT_NOT_FOUND.to_string()))
            }
        }
    }

    async fn fetch(&self, itinerary: &Itinerary) -> Result<Vec<Flight>> {
        let search = self.source.fetch_flights(
            &itinerary.origin,
            &itinerary.destination,
            itinerary.departure_date,
        );
        tokio::time::timeout(self.fetch_timeout, search)
            .await
            .map_err(|_| AppError::Timeout {
                context: format!("Search for {itinerary}"),
                secs: self.fetch_timeout.as_secs(),
            })?
    }
}

/// Pick the offer with the watched flight number.
pub fn select_flight<'a>(flights: &'a [Flight], flight_number: &str) -> Option<&'a Flight> {
    flights.iter().find(|f| f.flight_number == flight_number)
}
