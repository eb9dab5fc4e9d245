// src/utils/time.rs

//! Airline timestamp (de)serialization.
//!
//! The booking API reports local schedule times without an offset, in either
//! `2023-02-11 22:35` or `02/11/2023 22:35` form. Values are written back in
//! the first form.

use chrono::NaiveDateTime;
use serde::Serializer;

const WRITE_FORMAT: &str = "%Y-%m-%d %H:%M";

const READ_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M %p",
];

/// Parse an airline schedule timestamp.
pub fn parse_schedule_time(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    READ_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

fn serialize<S: Serializer>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&value.format(WRITE_FORMAT).to_string())
}

/// Optional timestamps; values that do not parse are dropped rather than
/// failing the enclosing document.
pub mod lenient {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<NaiveDateTime>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(value) => super::serialize(value, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NaiveDateTime>, D::Error> {
        let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
        Ok(match raw {
            Some(serde_json::Value::String(raw)) => {
                let parsed = super::parse_schedule_time(&raw);
                if parsed.is_none() {
                    log::debug!("Ignoring unrecognised schedule time '{}'", raw);
                }
                parsed
            }
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_supported_formats() {
        let a = parse_schedule_time("2023-02-11 22:35").unwrap();
        let b = parse_schedule_time("02/11/2023 22:35").unwrap();
        let c = parse_schedule_time("02/11/2023 10:35 PM").unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);
        assert_eq!(a.day(), 11);
        assert_eq!(a.hour(), 22);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_schedule_time("tomorrow-ish").is_none());
    }
}
