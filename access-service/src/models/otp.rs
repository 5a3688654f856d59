//! OTP record model - one verification record per (channel, identifier).

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Delivery channel an OTP proves control of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OtpChannel {
    Email,
    Phone,
}

impl OtpChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            OtpChannel::Email => "email",
            OtpChannel::Phone => "phone",
        }
    }

    /// Key prefix of the record in the key-value store.
    pub fn key_prefix(&self) -> &'static str {
        match self {
            OtpChannel::Email => "otp_email",
            OtpChannel::Phone => "otp_phone",
        }
    }
}

impl std::fmt::Display for OtpChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OtpChannel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "email" => Ok(OtpChannel::Email),
            "phone" => Ok(OtpChannel::Phone),
            _ => Err(format!("Invalid verification channel: {}", s)),
        }
    }
}

/// Observable state of a (channel, identifier) key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OtpState {
    Absent,
    Pending,
    Verified,
}

/// Stored verification record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpRecord {
    pub identifier: String,
    pub code: String,
    pub is_verified: bool,
    pub expires_at: DateTime<Utc>,
}

impl OtpRecord {
    /// Create a pending record expiring `validity` from now.
    pub fn new(identifier: String, code: String, validity: Duration) -> Self {
        Self {
            identifier,
            code,
            is_verified: false,
            expires_at: Utc::now() + validity,
        }
    }

    /// A record is expired at and after its expiry instant.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn state(&self) -> OtpState {
        if self.is_verified {
            OtpState::Verified
        } else {
            OtpState::Pending
        }
    }
}

/// Request to issue, resend or delete an OTP.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct OtpRequest {
    pub channel: OtpChannel,
    #[validate(length(min = 1, max = 254))]
    pub value: String,
}

/// Request to verify an OTP.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct VerifyOtpRequest {
    pub channel: OtpChannel,
    #[validate(length(min = 1, max = 254))]
    pub value: String,
    #[validate(length(min = 6, max = 6))]
    pub code: String,
}

/// Response after an OTP state change.
#[derive(Debug, Clone, Serialize)]
pub struct OtpResponse {
    pub channel: OtpChannel,
    pub state: OtpState,
}
