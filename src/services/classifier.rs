// src/services/classifier.rs

//! Fare classifier.
//!
//! Turns raw booking-class availability codes (`PZ4`, `RN1`, ...) into
//! upgrade matches. This is the only place fare codes are parsed; the
//! recognised classes come from `[classifier] upgrade_classes`.

use regex::Regex;

use crate::error::{AppError, Result};
use crate::models::{ClassifierConfig, Flight, UpgradeMatch};

/// Pure mapping from availability codes to upgrade inventory.
#[derive(Debug, Clone)]
pub struct FareClassifier {
    pattern: Regex,
    classes: Vec<String>,
}

impl FareClassifier {
    /// Build a classifier recognising the given two-letter classes.
    pub fn new<S: AsRef<str>>(classes: &[S]) -> Result<Self> {
        if classes.is_empty() {
            return Err(AppError::config("At least one upgrade class is required"));
        }

        let classes: Vec<String> = classes.iter().map(|c| c.as_ref().to_string()).collect();
        let alternatives = classes
            .iter()
            .map(|c| regex::escape(c))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = Regex::new(&format!("^({alternatives})([1-9])$"))?;

        Ok(Self { pattern, classes })
    }

    pub fn from_config(config: &ClassifierConfig) -> Result<Self> {
        Self::new(&config.upgrade_classes)
    }

    /// Recognised upgrade classes.
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Classify a flight's availability list.
    pub fn classify(&self, flight: &Flight) -> Vec<UpgradeMatch> {
        self.classify_codes(&flight.booking_class_avail_list)
    }

    /// Classify raw codes, keeping input order.
    ///
    /// Codes outside the allow-list, without a trailing digit, or with `0`
    /// seats are skipped.
    pub fn classify_codes<S: AsRef<str>>(&self, codes: &[S]) -> Vec<UpgradeMatch> {
        codes
            .iter()
            .filter_map(|code| self.classify_code(code.as_ref()))
            .collect()
    }

    fn classify_code(&self, code: &str) -> Option<UpgradeMatch> {
        let caps = self.pattern.captures(code)?;
        let quantity = caps.get(2)?.as_str().parse().ok()?;
        Some(UpgradeMatch {
            fare_class: caps.get(1)?.as_str().to_string(),
            quantity,
        })
    }
}
