// src/models/mod.rs

//! Domain models for the upgrade watcher.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod flight;
mod job;
mod result;

// Re-export all public types
pub use config::{
    ClassifierConfig, Config, ExpiryConfig, LoggingConfig, NotifierConfig, ScheduleConfig,
    SourceConfig, StorageConfig,
};
pub use flight::{AirportRef, Flight, UpgradeMatch};
pub use job::{Itinerary, Job, JobDefinition, JobId};
pub use result::{FLIGHT_NOT_FOUND, JobFailure, JobResult, SnapshotData, SnapshotFile};
