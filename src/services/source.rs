// src/services/source.rs

//! Flight sources.
//!
//! The pipeline only needs "flights for this route and date"; how they are
//! obtained is up to the implementation:
//!
//! - [`HttpFlightSource`] queries the booking site's flight results endpoint.
//! - [`ReplayFlightSource`] serves flights recorded in a previous snapshot.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{Flight, Itinerary, JobFailure, JobResult, SourceConfig};
use crate::utils::http;

/// Provider of flight offers for an itinerary.
#[async_trait]
pub trait FlightSource: Send + Sync {
    /// Fetch all offers for a route on a date.
    async fn fetch_flights(
        &self,
        origin: &str,
        destination: &str,
        date: NaiveDate,
    ) -> Result<Vec<Flight>>;
}

/// Search request body sent to the flight results endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct SearchRequest<'a> {
    origin: &'a str,
    destination: &'a str,
    depart_date: String,
    trip_type: &'static str,
    upgrade_type: &'a str,
}

/// Response envelope of the flight results endpoint.
#[derive(Debug, Deserialize)]
struct SearchResponse {
    status: String,
    #[serde(default)]
    data: Option<SearchData>,
    #[serde(default)]
    errors: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SearchData {
    #[serde(default)]
    trips: Vec<Trip>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Trip {
    #[serde(default)]
    flights: Option<Vec<Flight>>,
}

/// Flight source backed by the booking site's JSON endpoint.
pub struct HttpFlightSource {
    config: SourceConfig,
    client: Client,
}

impl HttpFlightSource {
    /// Create a source with a client built from the given configuration.
    pub fn new(config: SourceConfig) -> Result<Self> {
        let client = http::create_async_client(&config.user_agent, config.timeout())?;
        Ok(Self { config, client })
    }

    /// One-way upgrade search for a route and date.
    fn build_request<'a>(
        &'a self,
        origin: &'a str,
        destination: &'a str,
        date: NaiveDate,
    ) -> SearchRequest<'a> {
        SearchRequest {
            origin,
            destination,
            depart_date: date.format("%m/%d/%Y").to_string(),
            trip_type: "OW",
            upgrade_type: &self.config.upgrade_type,
        }
    }

    /// Turn a response body into flights, classifying upstream errors.
    fn parse_response(&self, context: &str, body: &[u8]) -> Result<Vec<Flight>> {
        let response: SearchResponse = serde_json::from_slice(body)
            .map_err(|e| AppError::fetch(context, format!("Malformed response: {e}")))?;

        if response.status != "success" {
            let errors: Vec<String> = response
                .errors
                .unwrap_or_default()
                .iter()
                .map(|e| match e {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect();
            let message = if errors.is_empty() {
                format!("status '{}'", response.status)
            } else {
                errors.join(", ")
            };

            if self.is_expired_message(&message) {
                return Err(AppError::expired(message));
            }
            return Err(AppError::fetch(context, message));
        }

        let flights = response
            .data
            .and_then(|data| data.trips.into_iter().next())
            .and_then(|trip| trip.flights);

        match flights {
            Some(flights) => {
                log::debug!("{}: flight batch acquired ({} offers)", context, flights.len());
                Ok(flights)
            }
            None => {
                log::warn!("{}: no flights found in batch", context);
                Ok(Vec::new())
            }
        }
    }

    fn is_expired_message(&self, message: &str) -> bool {
        let message = message.to_lowercase();
        self.config
            .expired_markers
            .iter()
            .any(|marker| message.contains(&marker.to_lowercase()))
    }
}

#[async_trait]
impl FlightSource for HttpFlightSource {
    async fn fetch_flights(
        &self,
        origin: &str,
        destination: &str,
        date: NaiveDate,
    ) -> Result<Vec<Flight>> {
        let context = format!("{origin}-{destination} {date}");
        let request = self.build_request(origin, destination, date);

        log::debug!("Searching {}...", context);
        let body = serde_json::to_vec(&request)?;
        let response = self
            .client
            .post(&self.config.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?
            .error_for_status()?;
        let bytes = response.bytes().await?;

        self.parse_response(&context, &bytes)
    }
}

type RouteKey = (String, String, NaiveDate);

/// Flight source replaying the flights recorded in a snapshot.
#[derive(Debug, Default)]
pub struct ReplayFlightSource {
    recorded: HashMap<RouteKey, std::result::Result<Vec<Flight>, JobFailure>>,
}

impl ReplayFlightSource {
    /// Index recorded results by route and date.
    ///
    /// A recorded flight wins over a recorded failure for the same route.
    pub fn from_results(results: &[JobResult]) -> Self {
        let mut recorded: HashMap<RouteKey, std::result::Result<Vec<Flight>, JobFailure>> =
            HashMap::new();

        for result in results {
            let key = route_key(&result.job.itinerary);
            match (&result.flight, &result.error) {
                (Some(flight), _) => {
                    let entry = recorded.entry(key).or_insert_with(|| Ok(Vec::new()));
                    if entry.is_err() {
                        *entry = Ok(Vec::new());
                    }
                    if let Ok(flights) = entry {
                        flights.push(flight.clone());
                    }
                }
                (None, Some(failure)) => {
                    recorded.entry(key).or_insert_with(|| Err(failure.clone()));
                }
                (None, None) => {}
            }
        }

        Self { recorded }
    }

    pub fn route_count(&self) -> usize {
        self.recorded.len()
    }
}

fn route_key(itinerary: &Itinerary) -> RouteKey {
    (
        itinerary.origin.clone(),
        itinerary.destination.clone(),
        itinerary.departure_date,
    )
}

#[async_trait]
impl FlightSource for ReplayFlightSource {
    async fn fetch_flights(
        &self,
        origin: &str,
        destination: &str,
        date: NaiveDate,
    ) -> Result<Vec<Flight>> {
        let key = (origin.to_string(), destination.to_string(), date);
        match self.recorded.get(&key) {
            Some(Ok(flights)) => Ok(flights.clone()),
            Some(Err(failure)) => Err(failure.clone().into()),
            None => Err(AppError::not_found(format!(
                "No recorded flights for {origin}-{destination} on {date}"
            ))),
        }
    }
}
