use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

use super::error::ServiceError;
use crate::config::JwtConfig;
use crate::models::{ApplicationGrant, ApplicationScope, User};

/// Signs and verifies access and refresh tokens. Stateless: whether a refresh
/// token is still the live one is decided by the session manager.
#[derive(Clone)]
pub struct JwtService {
    access_encoding_key: EncodingKey,
    access_decoding_key: DecodingKey,
    refresh_encoding_key: EncodingKey,
    refresh_decoding_key: DecodingKey,
    access_token_expiry_minutes: i64,
    refresh_token_expiry_days: i64,
}

/// Identity a token pair is issued for.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: i64,
    pub uuid: Uuid,
    pub username: String,
    pub email: String,
    pub application: Option<ApplicationGrant>,
}

impl From<&User> for Identity {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            uuid: user.uuid,
            username: user.username.clone(),
            email: user.email.clone(),
            application: None,
        }
    }
}

/// Claims for access tokens (short-lived)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Subject (numeric user ID)
    pub sub: String,
    pub uuid: Uuid,
    pub username: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<ApplicationScope>,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

impl AccessTokenClaims {
    pub fn user_id(&self) -> Result<i64, ServiceError> {
        self.sub.parse().map_err(|_| ServiceError::InvalidToken)
    }

    pub fn application(&self) -> Option<ApplicationGrant> {
        grant_from(self.app_id, self.scope)
    }
}

/// Claims for refresh tokens (long-lived)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshTokenClaims {
    /// Subject (numeric user ID)
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<ApplicationScope>,
    pub iat: i64,
    pub exp: i64,
    /// Distinguishes refresh tokens issued within the same second.
    pub jti: String,
}

impl RefreshTokenClaims {
    pub fn user_id(&self) -> Result<i64, ServiceError> {
        self.sub.parse().map_err(|_| ServiceError::InvalidRefreshToken)
    }

    pub fn application(&self) -> Option<ApplicationGrant> {
        grant_from(self.app_id, self.scope)
    }
}

fn grant_from(app_id: Option<i64>, scope: Option<ApplicationScope>) -> Option<ApplicationGrant> {
    match (app_id, scope) {
        (Some(application_id), Some(scope)) => Some(ApplicationGrant {
            application_id,
            scope,
        }),
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl JwtService {
    pub fn new(config: &JwtConfig) -> Self {
        let access_secret = config.access_token_secret.expose_secret().as_bytes();
        let refresh_secret = config.refresh_token_secret.expose_secret().as_bytes();

        tracing::info!("JWT service initialized with HS256 secrets");

        Self {
            access_encoding_key: EncodingKey::from_secret(access_secret),
            access_decoding_key: DecodingKey::from_secret(access_secret),
            refresh_encoding_key: EncodingKey::from_secret(refresh_secret),
            refresh_decoding_key: DecodingKey::from_secret(refresh_secret),
            access_token_expiry_minutes: config.access_token_expiry_minutes,
            refresh_token_expiry_days: config.refresh_token_expiry_days,
        }
    }

    pub fn generate_access_token(&self, identity: &Identity) -> Result<String, ServiceError> {
        let now = Utc::now();
        let exp = now + Duration::minutes(self.access_token_expiry_minutes);

        let claims = AccessTokenClaims {
            sub: identity.user_id.to_string(),
            uuid: identity.uuid,
            username: identity.username.clone(),
            email: identity.email.clone(),
            app_id: identity.application.map(|a| a.application_id),
            scope: identity.application.map(|a| a.scope),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.access_encoding_key)
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Failed to encode access token: {}", e)))
    }

    pub fn generate_refresh_token(&self, identity: &Identity) -> Result<String, ServiceError> {
        let now = Utc::now();
        let exp = now + Duration::days(self.refresh_token_expiry_days);

        let claims = RefreshTokenClaims {
            sub: identity.user_id.to_string(),
            app_id: identity.application.map(|a| a.application_id),
            scope: identity.application.map(|a| a.scope),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.refresh_encoding_key)
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Failed to encode refresh token: {}", e)))
    }

    pub fn generate_token_pair(&self, identity: &Identity) -> Result<TokenPair, ServiceError> {
        Ok(TokenPair {
            access_token: self.generate_access_token(identity)?,
            refresh_token: self.generate_refresh_token(identity)?,
        })
    }

    /// Signature and expiry only; any failure is `InvalidToken`.
    pub fn validate_access_token(&self, token: &str) -> Result<AccessTokenClaims, ServiceError> {
        decode_claims(token, &self.access_decoding_key)
    }

    /// Signature and expiry only; any failure is `InvalidToken`.
    pub fn validate_refresh_token(&self, token: &str) -> Result<RefreshTokenClaims, ServiceError> {
        decode_claims(token, &self.refresh_decoding_key)
    }

    /// Get access token expiry in seconds (for client info)
    pub fn access_token_expiry_seconds(&self) -> i64 {
        self.access_token_expiry_minutes * 60
    }
}

fn decode_claims<T: DeserializeOwned>(token: &str, key: &DecodingKey) -> Result<T, ServiceError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    validation.leeway = 0;

    decode::<T>(token, key, &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            tracing::debug!(error = %e, "Token rejected");
            ServiceError::InvalidToken
        })
}
