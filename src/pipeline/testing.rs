//! Shared doubles for pipeline tests.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};

use crate::error::{AppError, Result};
use crate::models::{Flight, Itinerary, Job, JobResult, SnapshotData};
use crate::services::{FlightSource, Notifier};
use crate::storage::{JobStore, ResultStorage, SnapshotMetadata};

pub fn flight(number: &str, codes: &[&str]) -> Flight {
    serde_json::from_value(serde_json::json!({
        "FlightNumber": number,
        "Origin": "EWR",
        "Destination": "TLV",
        "DepartDateTime": "2030-02-11 22:35",
        "DestinationDateTime": "2030-02-12 16:10",
        "BookingClassAvailList": codes,
    }))
    .unwrap()
}

fn job_on(flight_number: &str, destination: &str, date: NaiveDate) -> Job {
    Job::new(
        Itinerary {
            origin: "EWR".into(),
            destination: destination.into(),
            departure_date: date,
            flight_number: flight_number.into(),
            target_class: "PZ".into(),
        },
        Some("+15550001".into()),
    )
}

pub fn future_job(flight_number: &str) -> Job {
    future_job_to(flight_number, "TLV")
}

pub fn future_job_to(flight_number: &str, destination: &str) -> Job {
    job_on(
        flight_number,
        destination,
        (Utc::now() + chrono::Duration::days(30)).date_naive(),
    )
}

pub fn past_job(flight_number: &str) -> Job {
    job_on(
        flight_number,
        "TLV",
        (Utc::now() - chrono::Duration::days(1)).date_naive(),
    )
}

pub fn store_with(jobs: Vec<Job>) -> JobStore {
    store_with_storage(jobs).0
}

pub fn store_with_storage(jobs: Vec<Job>) -> (JobStore, Arc<MemoryStorage>) {
    let storage = Arc::new(MemoryStorage::default());
    let store = JobStore::new(jobs, storage.clone()).unwrap();
    (store, storage)
}

/// Flight source returning a fixed batch and counting calls.
#[derive(Default)]
pub struct MockSource {
    flights: Vec<Flight>,
    failing: Mutex<Vec<String>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockSource {
    pub fn returning(flights: Vec<Flight>) -> Self {
        Self {
            flights,
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Make searches towards `destination` fail.
    pub fn fail_destination(&self, destination: &str) {
        self.failing.lock().unwrap().push(destination.to_string());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FlightSource for MockSource {
    async fn fetch_flights(
        &self,
        _origin: &str,
        destination: &str,
        _date: NaiveDate,
    ) -> Result<Vec<Flight>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let failing = self.failing.lock().unwrap().contains(&destination.to_string());
        if failing {
            return Err(AppError::fetch("mock", "connection reset"));
        }
        Ok(self.flights.clone())
    }
}

/// Notifier recording every delivery.
#[derive(Default)]
pub struct MockNotifier {
    sent: Mutex<Vec<(String, String)>>,
    fail: bool,
}

impl MockNotifier {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn notify(&self, address: &str, message: &str) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((address.to_string(), message.to_string()));
        if self.fail {
            return Err(AppError::notification(address, "provider unavailable"));
        }
        Ok(())
    }
}

/// In-memory result storage.
#[derive(Default)]
pub struct MemoryStorage {
    snapshots: Mutex<Vec<SnapshotData>>,
}

impl MemoryStorage {
    pub fn snapshots(&self) -> Vec<SnapshotData> {
        self.snapshots.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResultStorage for MemoryStorage {
    async fn write_snapshot(
        &self,
        jobs: &[Job],
        results: &[JobResult],
    ) -> Result<SnapshotMetadata> {
        let mut snapshots = self.snapshots.lock().unwrap();
        snapshots.push(SnapshotData::new(jobs.to_vec(), results.to_vec()));
        Ok(SnapshotMetadata {
            result_count: results.len(),
            location: PathBuf::from(format!("memory-{}", snapshots.len())),
            timestamp: Utc::now(),
        })
    }

    async fn read_snapshot(&self, location: &Path) -> Result<SnapshotData> {
        let index: usize = location
            .to_str()
            .and_then(|s| s.strip_prefix("memory-"))
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| AppError::not_found(location.display().to_string()))?;
        self.snapshots
            .lock()
            .unwrap()
            .get(index.wrapping_sub(1))
            .cloned()
            .ok_or_else(|| AppError::not_found(location.display().to_string()))
    }

    async fn latest_snapshot(&self) -> Result<Option<PathBuf>> {
        let count = self.snapshots.lock().unwrap().len();
        Ok((count > 0).then(|| PathBuf::from(format!("memory-{count}"))))
    }
}
