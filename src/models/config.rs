//! Application configuration structures.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{Job, JobDefinition};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Timer settings
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Flight search endpoint settings
    #[serde(default)]
    pub source: SourceConfig,

    /// Upgrade fare class allow-list
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Departure-date expiry rule
    #[serde(default)]
    pub expiry: ExpiryConfig,

    /// Alert delivery settings
    #[serde(default)]
    pub notifier: NotifierConfig,

    /// Snapshot persistence settings
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Jobs to watch
    #[serde(default)]
    pub jobs: Vec<JobDefinition>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Materialise the configured job definitions.
    pub fn build_jobs(&self) -> Vec<Job> {
        self.jobs.iter().cloned().map(Job::from).collect()
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.schedule.interval_minutes == 0 {
            return Err(AppError::validation("schedule.interval_minutes must be > 0"));
        }
        if self.source.timeout_secs == 0 {
            return Err(AppError::validation("source.timeout_secs must be > 0"));
        }
        if self.source.user_agent.trim().is_empty() {
            return Err(AppError::validation("source.user_agent is empty"));
        }
        url::Url::parse(&self.source.endpoint)?;

        if self.classifier.upgrade_classes.is_empty() {
            return Err(AppError::validation("classifier.upgrade_classes is empty"));
        }
        for class in &self.classifier.upgrade_classes {
            if !is_fare_class(class) {
                return Err(AppError::validation(format!(
                    "Invalid upgrade class '{class}': expected two upper-case letters or digits"
                )));
            }
        }

        let mut seen = HashSet::new();
        for (index, def) in self.jobs.iter().enumerate() {
            let label = format!("jobs[{index}]");
            let it = &def.itinerary;
            if !is_airport_code(&it.origin) {
                return Err(AppError::validation(format!(
                    "{label}: invalid origin '{}'",
                    it.origin
                )));
            }
            if !is_airport_code(&it.destination) {
                return Err(AppError::validation(format!(
                    "{label}: invalid destination '{}'",
                    it.destination
                )));
            }
            if it.flight_number.trim().is_empty() {
                return Err(AppError::validation(format!("{label}: flight_number is empty")));
            }
            if !self.classifier.upgrade_classes.contains(&it.target_class) {
                return Err(AppError::validation(format!(
                    "{label}: target class '{}' is not a configured upgrade class",
                    it.target_class
                )));
            }
            if !seen.insert((it.clone(), def.address.clone())) {
                return Err(AppError::validation(format!("{label}: duplicate job")));
            }
        }

        if self.notifier.enabled {
            let n = &self.notifier;
            if n.account_sid.is_none() || n.auth_token.is_none() {
                return Err(AppError::validation(
                    "notifier.account_sid and notifier.auth_token are required when enabled",
                ));
            }
            if n.from_number.is_none() {
                return Err(AppError::validation(
                    "notifier.from_number is required when enabled",
                ));
            }
            url::Url::parse(&n.api_base)?;
        }

        Ok(())
    }
}

fn is_airport_code(code: &str) -> bool {
    code.len() == 3 && code.chars().all(|c| c.is_ascii_uppercase())
}

fn is_fare_class(class: &str) -> bool {
    class.len() == 2
        && class
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}

/// Scheduler timer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Minutes between passes
    #[serde(default = "defaults::interval_minutes")]
    pub interval_minutes: u64,
}

impl ScheduleConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes * 60)
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_minutes: defaults::interval_minutes(),
        }
    }
}

/// Flight search endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Flight results endpoint
    #[serde(default = "defaults::endpoint")]
    pub endpoint: String,

    /// User-Agent header for search requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Upper bound for a single itinerary search
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Upgrade search mode requested from the site
    #[serde(default = "defaults::upgrade_type")]
    pub upgrade_type: String,

    /// Upstream error fragments meaning the date can no longer be searched
    #[serde(default = "defaults::expired_markers")]
    pub expired_markers: Vec<String>,
}

impl SourceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            endpoint: defaults::endpoint(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            upgrade_type: defaults::upgrade_type(),
            expired_markers: defaults::expired_markers(),
        }
    }
}

/// Fare classes that represent upgrade inventory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default = "defaults::upgrade_classes")]
    pub upgrade_classes: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            upgrade_classes: defaults::upgrade_classes(),
        }
    }
}

/// Departure-date expiry rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpiryConfig {
    /// Days past the departure date before a job is retired
    #[serde(default = "defaults::grace_days")]
    pub grace_days: u32,
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self {
            grace_days: defaults::grace_days(),
        }
    }
}

/// SMS delivery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierConfig {
    /// Send real SMS; when false alerts are only logged
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "defaults::api_base")]
    pub api_base: String,

    #[serde(default)]
    pub account_sid: Option<String>,

    #[serde(default)]
    pub auth_token: Option<String>,

    #[serde(default)]
    pub from_number: Option<String>,

    /// Used for jobs without their own address
    #[serde(default)]
    pub default_recipient: Option<String>,

    /// Receives a copy of every alert
    #[serde(default)]
    pub owner_recipient: Option<String>,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_base: defaults::api_base(),
            account_sid: None,
            auth_token: None,
            from_number: None,
            default_recipient: None,
            owner_recipient: None,
        }
    }
}

/// Snapshot persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory receiving `jobs-<timestamp>.json` snapshots
    #[serde(default = "defaults::output_dir")]
    pub output_dir: PathBuf,

    /// Saved results to replay instead of searching live
    #[serde(default)]
    pub replay_file: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            output_dir: defaults::output_dir(),
            replay_file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    // Schedule defaults
    pub fn interval_minutes() -> u64 {
        10
    }

    // Source defaults
    pub fn endpoint() -> String {
        "https://www.united.com/ual/en/us/flight-search/book-a-flight/flightshopping/getflightresults/rev".into()
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; upgrade-watch/0.1)".into()
    }
    pub fn timeout() -> u64 {
        120
    }
    pub fn upgrade_type() -> String {
        "MUA".into()
    }
    pub fn expired_markers() -> Vec<String> {
        vec![
            "date is in the past".into(),
            "no longer valid".into(),
            "invalid departure date".into(),
        ]
    }

    // Classifier defaults
    pub fn upgrade_classes() -> Vec<String> {
        vec!["PZ".into(), "PN".into(), "RN".into()]
    }

    // Expiry defaults
    pub fn grace_days() -> u32 {
        1
    }

    // Notifier defaults
    pub fn api_base() -> String {
        "https://api.twilio.com/2010-04-01".into()
    }

    // Storage defaults
    pub fn output_dir() -> PathBuf {
        PathBuf::from("temp")
    }

    pub fn log_level() -> String {
        "info".into()
    }
}
