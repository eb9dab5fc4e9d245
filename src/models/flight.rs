// src/models/flight.rs

//! Flight offers returned by the flight source.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::utils::time;

/// Airport reference as embedded in flight offers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct AirportRef {
    pub code: String,

    #[serde(default)]
    pub description: Option<String>,
}

/// A single offer for one itinerary.
///
/// Field names follow the booking API so recorded batches and live responses
/// share one shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct Flight {
    pub flight_number: String,

    pub origin: String,

    pub destination: String,

    /// Final stop for multi-leg offers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_destination: Option<AirportRef>,

    /// Local departure time; `None` when absent or unparseable
    #[serde(default, with = "time::lenient", skip_serializing_if = "Option::is_none")]
    pub depart_date_time: Option<NaiveDateTime>,

    #[serde(
        rename = "DestinationDateTime",
        default,
        with = "time::lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub arrival_date_time: Option<NaiveDateTime>,

    /// Raw availability codes such as `PZ4`
    #[serde(default)]
    pub booking_class_avail_list: Vec<String>,
}

/// Upgrade-eligible inventory recognised on a flight.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct UpgradeMatch {
    pub fare_class: String,
    pub quantity: u8,
}
