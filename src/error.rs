// src/error.rs

//! Unified error handling for the upgrade watcher.

use std::fmt;

use thiserror::Error;

/// Result type alias for watcher operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Fare class pattern could not be compiled
    #[error("Pattern error: {0}")]
    Regex(#[from] regex::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Flight source failed (network, parse, upstream error)
    #[error("Fetch error for {context}: {message}")]
    Fetch { context: String, message: String },

    /// Target flight or saved-results file missing
    #[error("Not found: {0}")]
    NotFound(String),

    /// Departure date can no longer be searched
    #[error("Itinerary expired: {0}")]
    ExpiredItinerary(String),

    /// Alert delivery failed
    #[error("Notification to {recipient} failed: {message}")]
    Notification { recipient: String, message: String },

    /// A bounded operation ran out of time
    #[error("{context} timed out after {secs}s")]
    Timeout { context: String, secs: u64 },
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a fetch error with context.
    pub fn fetch(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Fetch {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Create a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create an expired-itinerary error.
    pub fn expired(message: impl Into<String>) -> Self {
        Self::ExpiredItinerary(message.into())
    }

    /// Create a notification delivery error.
    pub fn notification(recipient: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Notification {
            recipient: recipient.into(),
            message: message.to_string(),
        }
    }
}
