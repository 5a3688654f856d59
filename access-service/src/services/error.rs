use service_core::error::AppError;
use thiserror::Error;

use crate::models::{DenialReason, OtpChannel};

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),

    // ==================== Not found ====================
    #[error("User not found")]
    UserNotFound,

    #[error("OTP not found")]
    OtpNotFound,

    // ==================== Already exists ====================
    #[error("OTP already exists")]
    OtpAlreadyExists,

    #[error("email is exists")]
    EmailTaken,

    #[error("phone is exists")]
    PhoneTaken,

    #[error("username is exists")]
    UsernameTaken,

    // ==================== OTP state ====================
    #[error("OTP expired")]
    OtpExpired,

    #[error("OTP does not match")]
    OtpMismatch,

    #[error("OTP already verified")]
    OtpAlreadyVerified,

    #[error("OTP resend attempts exceeded")]
    OtpMaxAttemptsExceeded,

    #[error("{0} is not verified")]
    ChannelNotVerified(OtpChannel),

    // ==================== Tokens and sessions ====================
    #[error("Invalid token")]
    InvalidToken,

    #[error("Invalid refresh token")]
    InvalidRefreshToken,

    #[error("Refresh token already exists")]
    RefreshTokenExists,

    #[error("Invalid credentials")]
    InvalidCredentials,

    // ==================== Authorization ====================
    #[error("Unauthorized: {0}")]
    Unauthorized(DenialReason),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Delivery error: {0}")]
    Delivery(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Database(e) => AppError::DatabaseError(anyhow::anyhow!(e)),
            ServiceError::Redis(e) => AppError::RedisError(e),
            ServiceError::Internal(e) => AppError::InternalError(e),
            ServiceError::UserNotFound => AppError::NotFound(anyhow::anyhow!("User not found")),
            ServiceError::OtpNotFound => AppError::NotFound(anyhow::anyhow!("OTP not found")),
            e @ (ServiceError::OtpAlreadyExists
            | ServiceError::EmailTaken
            | ServiceError::PhoneTaken
            | ServiceError::UsernameTaken
            | ServiceError::OtpAlreadyVerified
            | ServiceError::RefreshTokenExists) => AppError::Conflict(anyhow::anyhow!(e.to_string())),
            e @ (ServiceError::OtpExpired
            | ServiceError::OtpMismatch
            | ServiceError::ChannelNotVerified(_)) => {
                AppError::BadRequest(anyhow::anyhow!(e.to_string()))
            }
            ServiceError::OtpMaxAttemptsExceeded => {
                AppError::TooManyRequests("OTP resend attempts exceeded".to_string(), None)
            }
            ServiceError::InvalidToken => AppError::AuthError(anyhow::anyhow!("Invalid token")),
            ServiceError::InvalidRefreshToken => {
                AppError::AuthError(anyhow::anyhow!("Invalid refresh token"))
            }
            ServiceError::InvalidCredentials => {
                AppError::AuthError(anyhow::anyhow!("Invalid credentials"))
            }
            ServiceError::Unauthorized(reason) => {
                tracing::info!(reason = %reason, "Permission denied");
                AppError::Forbidden(anyhow::anyhow!("Forbidden"))
            }
            ServiceError::Validation(e) => AppError::BadRequest(anyhow::anyhow!(e)),
            ServiceError::Delivery(e) => AppError::EmailError(e),
        }
    }
}
