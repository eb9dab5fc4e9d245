//! Service layer for the upgrade watcher.
//!
//! This module contains the collaborators the pipeline drives:
//! - Fare classification (`FareClassifier`)
//! - Flight lookup (`FlightSource`, `HttpFlightSource`, `ReplayFlightSource`)
//! - Alert delivery (`Notifier`, `SmsNotifier` over an `SmsGateway`, `LogNotifier`)

mod classifier;
pub mod notifier;
mod source;

pub use classifier::FareClassifier;
pub use notifier::{
    LogNotifier, Notifier, SmsGateway, SmsNotifier, TwilioGateway, upgrade_message,
};
pub use source::{FlightSource, HttpFlightSource, ReplayFlightSource};
