use std::sync::Arc;

use super::error::ServiceError;
use super::kv_store::KeyValueStore;
use crate::models::{OtpChannel, OtpRecord};

/// Record lifetime in the store. Longer than any code expiry so a verified
/// record survives until sign-up consumes it.
pub const DEFAULT_RECORD_TTL_SECONDS: u64 = 30 * 60;

/// Window of the resend attempt counter.
pub const DEFAULT_RESEND_WINDOW_SECONDS: u64 = 30 * 60;

/// OTP records and resend counters on top of the key-value store.
#[derive(Clone)]
pub struct OtpRepository {
    store: Arc<dyn KeyValueStore>,
    record_ttl_seconds: u64,
    resend_window_seconds: u64,
}

impl OtpRepository {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            record_ttl_seconds: DEFAULT_RECORD_TTL_SECONDS,
            resend_window_seconds: DEFAULT_RESEND_WINDOW_SECONDS,
        }
    }

    pub fn with_ttls(mut self, record_ttl_seconds: u64, resend_window_seconds: u64) -> Self {
        self.record_ttl_seconds = record_ttl_seconds;
        self.resend_window_seconds = resend_window_seconds;
        self
    }

    pub fn record_key(channel: OtpChannel, identifier: &str) -> String {
        format!("{}:{}", channel.key_prefix(), identifier)
    }

    pub fn resend_key(channel: OtpChannel, identifier: &str) -> String {
        format!("resend_attempt:{}:{}", channel.as_str(), identifier)
    }

    pub async fn get(
        &self,
        channel: OtpChannel,
        identifier: &str,
    ) -> Result<Option<OtpRecord>, ServiceError> {
        let Some(raw) = self.store.get(&Self::record_key(channel, identifier)).await? else {
            return Ok(None);
        };

        let record = serde_json::from_str(&raw).map_err(|e| {
            ServiceError::Internal(anyhow::anyhow!("Corrupt OTP record for {}: {}", channel, e))
        })?;
        Ok(Some(record))
    }

    /// Write the record, replacing any previous one for the key.
    pub async fn put(&self, channel: OtpChannel, record: &OtpRecord) -> Result<(), ServiceError> {
        let raw = serde_json::to_string(record)
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Failed to encode OTP record: {}", e)))?;

        self.store
            .set_ex(
                &Self::record_key(channel, &record.identifier),
                &raw,
                self.record_ttl_seconds,
            )
            .await
    }

    /// Returns whether a record was removed.
    pub async fn delete(&self, channel: OtpChannel, identifier: &str) -> Result<bool, ServiceError> {
        self.store.delete(&Self::record_key(channel, identifier)).await
    }

    pub async fn increment_resend_counter(
        &self,
        channel: OtpChannel,
        identifier: &str,
    ) -> Result<i64, ServiceError> {
        self.store
            .incr_with_ttl(&Self::resend_key(channel, identifier), self.resend_window_seconds)
            .await
    }
}
