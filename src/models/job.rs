// src/models/job.rs

//! Itinerary and watch job data structures.

use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Fixed travel parameters a job watches.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Itinerary {
    /// Origin airport code (e.g., "EWR")
    pub origin: String,

    /// Destination airport code (e.g., "TLV")
    pub destination: String,

    /// Local departure date, no time component
    pub departure_date: NaiveDate,

    /// Carrier flight number (e.g., "999")
    pub flight_number: String,

    /// Fare class the operator wants (e.g., "PZ")
    pub target_class: String,
}

impl Itinerary {
    /// Date formatted the way the booking site expects it.
    pub fn search_date(&self) -> String {
        self.departure_date.format("%m/%d/%Y").to_string()
    }

    /// Whether the departure date plus `grace_days` lies strictly before `now`.
    ///
    /// The cutoff is midnight UTC at the start of the departure date.
    pub fn has_departed(&self, now: DateTime<Utc>, grace_days: u32) -> bool {
        let cutoff = self.departure_date.and_time(NaiveTime::MIN).and_utc()
            + Duration::days(i64::from(grace_days));
        cutoff < now
    }
}

impl fmt::Display for Itinerary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "UA {} {}-{} on {}",
            self.flight_number,
            self.origin,
            self.destination,
            self.search_date()
        )
    }
}

/// Stable job identifier derived from the job's definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Derive an identifier from the itinerary and notification address.
    pub fn derive(itinerary: &Itinerary, address: Option<&str>) -> Self {
        let mut hasher = Sha256::new();
        for part in [
            itinerary.origin.as_str(),
            itinerary.destination.as_str(),
            &itinerary.departure_date.to_string(),
            itinerary.flight_number.as_str(),
            itinerary.target_class.as_str(),
            address.unwrap_or(""),
        ] {
            hasher.update(part.as_bytes());
            hasher.update([0u8]);
        }
        let digest = hex::encode(hasher.finalize());
        Self(digest[..12].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A job as written in `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDefinition {
    /// Notification address; falls back to the notifier's default recipient
    #[serde(default)]
    pub address: Option<String>,

    #[serde(flatten)]
    pub itinerary: Itinerary,
}

/// A long-lived watch unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Job {
    pub id: JobId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    pub itinerary: Itinerary,

    #[serde(default)]
    pub completed: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Create a pending job.
    pub fn new(itinerary: Itinerary, address: Option<String>) -> Self {
        Self {
            id: JobId::derive(&itinerary, address.as_deref()),
            address,
            itinerary,
            completed: false,
            completed_at: None,
        }
    }
}

impl From<JobDefinition> for Job {
    fn from(def: JobDefinition) -> Self {
        Self::new(def.itinerary, def.address)
    }
}
