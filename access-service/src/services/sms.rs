use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::sync::Mutex;
use std::time::Duration;

use super::error::ServiceError;
use crate::config::TwilioConfig;

const TWILIO_API_BASE: &str = "https://api.twilio.com/2010-04-01";

#[async_trait]
pub trait SmsProvider: Send + Sync {
    async fn send_sms(&self, to: &str, body: &str) -> Result<(), ServiceError>;
}

pub struct TwilioSmsService {
    client: Client,
    account_sid: String,
    auth_token: SecretString,
    from_number: String,
}

#[derive(Debug, Deserialize)]
struct TwilioMessageResponse {
    sid: String,
    status: String,
}

impl TwilioSmsService {
    pub fn new(config: &TwilioConfig) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ServiceError::Delivery(format!("Failed to build HTTP client: {}", e)))?;

        tracing::info!("Twilio SMS service initialized");

        Ok(Self {
            client,
            account_sid: config.account_sid.clone(),
            auth_token: config.auth_token.clone(),
            from_number: config.phone_number.clone(),
        })
    }
}

#[async_trait]
impl SmsProvider for TwilioSmsService {
    async fn send_sms(&self, to: &str, body: &str) -> Result<(), ServiceError> {
        if self.account_sid.is_empty() || self.from_number.is_empty() {
            return Err(ServiceError::Delivery("Twilio is not configured".to_string()));
        }

        let url = format!("{}/Accounts/{}/Messages.json", TWILIO_API_BASE, self.account_sid);
        let params = [("To", to), ("From", self.from_number.as_str()), ("Body", body)];

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.account_sid, Some(self.auth_token.expose_secret()))
            .form(&params)
            .send()
            .await
            .map_err(|e| ServiceError::Delivery(format!("Failed to connect to Twilio: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Delivery(format!(
                "Twilio API returned error status {}: {}",
                status, body
            )));
        }

        let message: TwilioMessageResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::Delivery(format!("Failed to parse Twilio response: {}", e)))?;

        tracing::info!(sid = %message.sid, status = %message.status, "SMS sent successfully via Twilio");

        Ok(())
    }
}

/// Records every message instead of sending it.
#[derive(Default)]
pub struct MockSmsService {
    pub sent: Mutex<Vec<(String, String)>>,
    pub fail: bool,
}

impl MockSmsService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl SmsProvider for MockSmsService {
    async fn send_sms(&self, to: &str, body: &str) -> Result<(), ServiceError> {
        if self.fail {
            return Err(ServiceError::Delivery("mock SMS gateway down".to_string()));
        }

        tracing::info!(body_length = body.len(), "[MOCK] SMS would be sent");

        self.sent
            .lock()
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Mock SMS mutex poisoned: {}", e)))?
            .push((to.to_string(), body.to_string()));
        Ok(())
    }
}
