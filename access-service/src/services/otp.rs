//! OTP verification engine.
//!
//! One record per (channel, identifier), moving Absent -> Pending -> Verified.
//! Delivery runs on a spawned task; the request never waits for it.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::Instrument;

use super::email::EmailProvider;
use super::error::ServiceError;
use super::otp_store::OtpRepository;
use super::sms::SmsProvider;
use crate::models::{OtpChannel, OtpRecord, OtpState};
use crate::utils::identifier::{
    format_duration, format_phone_number, generate_otp, is_valid_email, normalize_email,
    normalize_phone,
};

pub const EMAIL_OTP_SUBJECT: &str = "Email OTP Verification Code";

#[derive(Debug, Clone)]
pub struct OtpPolicy {
    pub code_length: usize,
    pub email_validity: Duration,
    pub phone_validity: Duration,
    /// Resends allowed per counter window.
    pub max_resend_attempts: i64,
}

impl Default for OtpPolicy {
    fn default() -> Self {
        Self {
            code_length: 6,
            email_validity: Duration::seconds(60),
            phone_validity: Duration::minutes(15),
            max_resend_attempts: 3,
        }
    }
}

impl OtpPolicy {
    pub fn validity(&self, channel: OtpChannel) -> Duration {
        match channel {
            OtpChannel::Email => self.email_validity,
            OtpChannel::Phone => self.phone_validity,
        }
    }
}

/// Decide a verify attempt against a stored record.
///
/// Checked in order: already verified, expired (at or after the expiry
/// instant), code mismatch.
pub fn check_code(record: &OtpRecord, code: &str, now: DateTime<Utc>) -> Result<(), ServiceError> {
    if record.is_verified {
        return Err(ServiceError::OtpAlreadyVerified);
    }
    if record.is_expired_at(now) {
        return Err(ServiceError::OtpExpired);
    }
    if !bool::from(record.code.as_bytes().ct_eq(code.as_bytes())) {
        return Err(ServiceError::OtpMismatch);
    }
    Ok(())
}

#[derive(Clone)]
pub struct OtpService {
    repo: OtpRepository,
    email: Arc<dyn EmailProvider>,
    sms: Arc<dyn SmsProvider>,
    policy: OtpPolicy,
    sender_name: String,
    country_code: String,
}

impl OtpService {
    pub fn new(
        repo: OtpRepository,
        email: Arc<dyn EmailProvider>,
        sms: Arc<dyn SmsProvider>,
        sender_name: impl Into<String>,
        country_code: impl Into<String>,
    ) -> Self {
        Self {
            repo,
            email,
            sms,
            policy: OtpPolicy::default(),
            sender_name: sender_name.into(),
            country_code: country_code.into(),
        }
    }

    pub fn with_policy(mut self, policy: OtpPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &OtpPolicy {
        &self.policy
    }

    /// Canonical key identifier: lower-cased email, or the E.164 digits of a
    /// phone number.
    pub fn normalize(&self, channel: OtpChannel, value: &str) -> Result<String, ServiceError> {
        match channel {
            OtpChannel::Email => {
                let email = normalize_email(value);
                if !is_valid_email(&email) {
                    return Err(ServiceError::Validation("invalid email".to_string()));
                }
                Ok(email)
            }
            OtpChannel::Phone => {
                let formatted = format_phone_number(value, &self.country_code)
                    .map_err(ServiceError::Validation)?;
                Ok(normalize_phone(&formatted))
            }
        }
    }

    pub async fn get(&self, channel: OtpChannel, value: &str) -> Result<Option<OtpRecord>, ServiceError> {
        let id = self.normalize(channel, value)?;
        self.repo.get(channel, &id).await
    }

    pub async fn state(&self, channel: OtpChannel, value: &str) -> Result<OtpState, ServiceError> {
        Ok(self
            .get(channel, value)
            .await?
            .map(|r| r.state())
            .unwrap_or(OtpState::Absent))
    }

    /// Issue a code for an Absent key.
    #[tracing::instrument(skip(self, value), fields(channel = %channel))]
    pub async fn create(&self, channel: OtpChannel, value: &str) -> Result<(), ServiceError> {
        let id = self.normalize(channel, value)?;

        if self.repo.get(channel, &id).await?.is_some() {
            return Err(ServiceError::OtpAlreadyExists);
        }

        self.issue(channel, id).await
    }

    #[tracing::instrument(skip(self, value, code), fields(channel = %channel))]
    pub async fn verify(&self, channel: OtpChannel, value: &str, code: &str) -> Result<(), ServiceError> {
        let id = self.normalize(channel, value)?;

        let mut record = self
            .repo
            .get(channel, &id)
            .await?
            .ok_or(ServiceError::OtpNotFound)?;

        check_code(&record, code, Utc::now())?;

        record.is_verified = true;
        self.repo.put(channel, &record).await?;

        tracing::info!("OTP verified");
        Ok(())
    }

    /// Regenerate the code of a Pending key, bounded by the resend counter.
    #[tracing::instrument(skip(self, value), fields(channel = %channel))]
    pub async fn resend(&self, channel: OtpChannel, value: &str) -> Result<(), ServiceError> {
        let id = self.normalize(channel, value)?;

        let record = self
            .repo
            .get(channel, &id)
            .await?
            .ok_or(ServiceError::OtpNotFound)?;

        if record.is_verified {
            return Err(ServiceError::OtpAlreadyVerified);
        }

        let attempt = self.repo.increment_resend_counter(channel, &id).await?;
        if attempt > self.policy.max_resend_attempts {
            tracing::warn!(attempt, "OTP resend limit reached");
            return Err(ServiceError::OtpMaxAttemptsExceeded);
        }

        self.issue(channel, id).await
    }

    #[tracing::instrument(skip(self, value), fields(channel = %channel))]
    pub async fn delete(&self, channel: OtpChannel, value: &str) -> Result<(), ServiceError> {
        let id = self.normalize(channel, value)?;

        if self.repo.delete(channel, &id).await? {
            Ok(())
        } else {
            Err(ServiceError::OtpNotFound)
        }
    }

    /// Succeeds only when a Verified record exists for the key.
    pub async fn require_verified(&self, channel: OtpChannel, value: &str) -> Result<(), ServiceError> {
        match self.get(channel, value).await? {
            Some(record) if record.is_verified => Ok(()),
            _ => Err(ServiceError::ChannelNotVerified(channel)),
        }
    }

    async fn issue(&self, channel: OtpChannel, id: String) -> Result<(), ServiceError> {
        let validity = self.policy.validity(channel);
        let record = OtpRecord::new(id, generate_otp(self.policy.code_length), validity);

        self.repo.put(channel, &record).await?;
        self.dispatch(channel, &record, validity);

        tracing::info!(expires_at = %record.expires_at, "OTP issued");
        Ok(())
    }

    fn dispatch(&self, channel: OtpChannel, record: &OtpRecord, validity: Duration) {
        let window = format_duration(validity.to_std().unwrap_or_default());

        match channel {
            OtpChannel::Email => {
                let email = self.email.clone();
                let to = record.identifier.clone();
                let body = email_body(&record.code, &window);
                tokio::spawn(
                    async move {
                        if let Err(e) = email.send_email(&to, EMAIL_OTP_SUBJECT, &body).await {
                            tracing::error!(error = %e, "Failed to deliver email OTP");
                        }
                    }
                    .in_current_span(),
                );
            }
            OtpChannel::Phone => {
                let sms = self.sms.clone();
                let to = format!("+{}", record.identifier);
                let body = sms_body(&self.sender_name, &record.code, &window);
                tokio::spawn(
                    async move {
                        if let Err(e) = sms.send_sms(&to, &body).await {
                            tracing::error!(error = %e, "Failed to deliver SMS OTP");
                        }
                    }
                    .in_current_span(),
                );
            }
        }
    }
}

pub fn sms_body(sender_name: &str, code: &str, window: &str) -> String {
    format!(
        "[{}] Your verification code is {}, valid for ({})",
        sender_name, code, window
    )
}

fn email_body(code: &str, window: &str) -> String {
    format!(
        r###"<html>
    <body style="font-family: Arial, sans-serif;">
        <h2>Your verification code</h2>
        <p>Use the code below to verify your email address:</p>
        <p style="font-size: 28px; letter-spacing: 6px;"><strong>{}</strong></p>
        <p style="color: #666; font-size: 12px;">
            This code is valid for {}. If you didn't request it, please ignore this email.
        </p>
    </body>
</html>
"###,
        code, window
    )
}
