// src/services/notifier.rs

//! Alert delivery.

use async_trait::async_trait;
use reqwest::Client;

use crate::error::{AppError, Result};
use crate::models::{Itinerary, NotifierConfig, UpgradeMatch};
use crate::utils::http;

/// Delivers a plain-text alert to an address.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, address: &str, message: &str) -> Result<()>;
}

/// Operator-facing alert text for a confirmed upgrade.
pub fn upgrade_message(itinerary: &Itinerary, upgrade: &UpgradeMatch) -> String {
    format!(
        "Upgrade available! UA {} {}-{} on {}: {} seat(s) in {}",
        itinerary.flight_number,
        itinerary.origin,
        itinerary.destination,
        itinerary.search_date(),
        upgrade.quantity,
        upgrade.fare_class
    )
}

/// Notifier that only writes alerts to the log.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, address: &str, message: &str) -> Result<()> {
        log::info!("Alert for {} (delivery disabled): {}", address, message);
        Ok(())
    }
}

/// Sends a single SMS.
#[async_trait]
pub trait SmsGateway: Send + Sync {
    async fn send(&self, to: &str, body: &str) -> Result<()>;
}

/// Gateway posting to the Twilio messages API.
pub struct TwilioGateway {
    client: Client,
    messages_url: String,
    account_sid: String,
    auth_token: String,
    from_number: String,
}

impl TwilioGateway {
    pub fn new(config: &NotifierConfig) -> Result<Self> {
        let account_sid = config
            .account_sid
            .clone()
            .ok_or_else(|| AppError::config("notifier.account_sid is not set"))?;
        let auth_token = config
            .auth_token
            .clone()
            .ok_or_else(|| AppError::config("notifier.auth_token is not set"))?;
        let from_number = config
            .from_number
            .clone()
            .ok_or_else(|| AppError::config("notifier.from_number is not set"))?;

        let client = http::create_async_client(
            concat!("upgrade-watch/", env!("CARGO_PKG_VERSION")),
            std::time::Duration::from_secs(30),
        )?;
        let messages_url = format!(
            "{}/Accounts/{}/Messages.json",
            config.api_base.trim_end_matches('/'),
            account_sid
        );

        Ok(Self {
            client,
            messages_url,
            account_sid,
            auth_token,
            from_number,
        })
    }

    /// Form fields of a message request.
    fn form<'a>(&'a self, to: &'a str, body: &'a str) -> [(&'static str, &'a str); 3] {
        [("To", to), ("From", self.from_number.as_str()), ("Body", body)]
    }
}

#[async_trait]
impl SmsGateway for TwilioGateway {
    async fn send(&self, to: &str, body: &str) -> Result<()> {
        let response = self
            .client
            .post(&self.messages_url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&self.form(to, body))
            .send()
            .await
            .map_err(|e| AppError::notification(to, e))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(AppError::notification(to, format!("{status}: {detail}")));
        }
        Ok(())
    }
}

/// SMS notifier; the owner, when configured, gets a copy of every alert
/// before the main recipient.
pub struct SmsNotifier {
    gateway: Box<dyn SmsGateway>,
    owner_number: Option<String>,
}

impl SmsNotifier {
    /// Notifier sending through Twilio.
    pub fn new(config: &NotifierConfig) -> Result<Self> {
        let gateway = TwilioGateway::new(config)?;
        Ok(Self::with_gateway(gateway, config.owner_recipient.clone()))
    }

    pub fn with_gateway(gateway: impl SmsGateway + 'static, owner_number: Option<String>) -> Self {
        Self {
            gateway: Box::new(gateway),
            owner_number,
        }
    }
}

#[async_trait]
impl Notifier for SmsNotifier {
    async fn notify(&self, address: &str, message: &str) -> Result<()> {
        if let Some(owner) = self.owner_number.as_deref().filter(|o| *o != address) {
            log::debug!("Sending owner alert -> {}", owner);
            if let Err(e) = self.gateway.send(owner, message).await {
                log::warn!("Owner alert failed: {}", e);
            }
        }

        log::debug!("Sending main alert -> {}", address);
        self.gateway.send(address, message).await
    }
}

/// Build the notifier selected by configuration.
pub fn from_config(config: &NotifierConfig) -> Result<Box<dyn Notifier>> {
    if config.enabled {
        Ok(Box::new(SmsNotifier::new(config)?))
    } else {
        Ok(Box::new(LogNotifier))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::sync::{Arc, Mutex};

    /// Gateway recording recipients; sends to `fail_for` are rejected.
    #[derive(Clone, Default)]
    struct RecordingGateway {
        sent: Arc<Mutex<Vec<String>>>,
        fail_for: Option<String>,
    }

    #[async_trait]
    impl SmsGateway for RecordingGateway {
        async fn send(&self, to: &str, _body: &str) -> Result<()> {
            self.sent.lock().unwrap().push(to.to_string());
            if self.fail_for.as_deref() == Some(to) {
                return Err(AppError::notification(to, "rejected"));
            }
            Ok(())
        }
    }

    fn credentials() -> NotifierConfig {
        NotifierConfig {
            enabled: true,
            account_sid: Some("AC123".into()),
            auth_token: Some("secret".into()),
            from_number: Some("+15550000".into()),
            ..NotifierConfig::default()
        }
    }

    #[test]
    fn test_upgrade_message_contents() {
        let itinerary = Itinerary {
            origin: "EWR".into(),
            destination: "TLV".into(),
            departure_date: NaiveDate::from_ymd_opt(2023, 2, 11).unwrap(),
            flight_number: "999".into(),
            target_class: "PZ".into(),
        };
        let upgrade = UpgradeMatch {
            fare_class: "PZ".into(),
            quantity: 4,
        };

        let message = upgrade_message(&itinerary, &upgrade);
        assert!(message.contains("999"));
        assert!(message.contains("02/11/2023"));
        assert!(message.contains("4 seat(s) in PZ"));
    }

    #[test]
    fn test_sms_notifier_requires_credentials() {
        let config = NotifierConfig {
            enabled: true,
            ..NotifierConfig::default()
        };
        assert!(SmsNotifier::new(&config).is_err());
    }

    #[test]
    fn test_twilio_gateway_request() {
        let gateway = TwilioGateway::new(&credentials()).unwrap();
        assert_eq!(
            gateway.messages_url,
            "https://api.twilio.com/2010-04-01/Accounts/AC123/Messages.json"
        );
        assert_eq!(
            gateway.form("+15550001", "hello"),
            [("To", "+15550001"), ("From", "+15550000"), ("Body", "hello")]
        );
        assert!(from_config(&credentials()).is_ok());
    }

    #[tokio::test]
    async fn test_owner_copy_sent_first() {
        let gateway = RecordingGateway::default();
        let notifier = SmsNotifier::with_gateway(gateway.clone(), Some("+15559999".into()));

        notifier.notify("+15550001", "hello").await.unwrap();

        assert_eq!(*gateway.sent.lock().unwrap(), vec!["+15559999", "+15550001"]);
    }

    #[tokio::test]
    async fn test_owner_copy_skipped_for_owner_address() {
        let gateway = RecordingGateway::default();
        let notifier = SmsNotifier::with_gateway(gateway.clone(), Some("+15559999".into()));

        notifier.notify("+15559999", "hello").await.unwrap();

        assert_eq!(*gateway.sent.lock().unwrap(), vec!["+15559999"]);
    }

    #[tokio::test]
    async fn test_owner_failure_does_not_block_main_alert() {
        let gateway = RecordingGateway {
            fail_for: Some("+15559999".into()),
            ..RecordingGateway::default()
        };
        let notifier = SmsNotifier::with_gateway(gateway.clone(), Some("+15559999".into()));

        assert!(notifier.notify("+15550001", "hello").await.is_ok());
        assert_eq!(*gateway.sent.lock().unwrap(), vec!["+15559999", "+15550001"]);
    }

    #[tokio::test]
    async fn test_main_failure_is_reported() {
        let gateway = RecordingGateway {
            fail_for: Some("+15550001".into()),
            ..RecordingGateway::default()
        };
        let notifier = SmsNotifier::with_gateway(gateway, None);

        let err = notifier.notify("+15550001", "hello").await.unwrap_err();
        assert!(matches!(err, AppError::Notification { .. }));
    }

    #[tokio::test]
    async fn test_log_notifier_always_succeeds() {
        assert!(LogNotifier.notify("+15550001", "hello").await.is_ok());
    }
}
