//! User model - platform accounts and sign-up payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// User entity. The password hash and the refresh token live on the same
/// row but are only reachable through the credential store's dedicated
/// methods, never through this struct.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: i64,
    pub uuid: Uuid,
    pub email: String,
    pub phone_number: String,
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_email_verified: bool,
    pub is_phone_verified: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert payload for a new account.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub uuid: Uuid,
    pub email: String,
    pub phone_number: String,
    pub username: String,
    pub password_hash: String,
    pub is_email_verified: bool,
    pub is_phone_verified: bool,
}

impl NewUser {
    pub fn new(email: String, phone_number: String, username: String, password_hash: String) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            email,
            phone_number,
            username,
            password_hash,
            is_email_verified: false,
            is_phone_verified: false,
        }
    }

    /// Materialise the row the store would return after insertion.
    pub fn into_user(self, id: i64) -> User {
        let now = Utc::now();
        User {
            id,
            uuid: self.uuid,
            email: self.email,
            phone_number: self.phone_number,
            username: self.username,
            first_name: None,
            last_name: None,
            is_email_verified: self.is_email_verified,
            is_phone_verified: self.is_phone_verified,
            last_login: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Fields that must be unique across all accounts.
#[derive(Debug, Clone)]
pub struct UniqueFields {
    pub email: String,
    pub phone_number: String,
    pub username: String,
}

/// Which unique fields are already taken.
#[derive(Debug, Clone, Default, PartialEq, Eq, FromRow)]
pub struct UniqueFieldsTaken {
    pub email_taken: bool,
    pub phone_taken: bool,
    pub username_taken: bool,
}

/// Request to create an account.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SignUpRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 10, max = 20))]
    pub phone_number: String,
    #[validate(length(min = 3, max = 64))]
    pub username: String,
    #[validate(length(min = 8))]
    pub password: String,
}

/// Request to sign in with email and password.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SignInRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

/// Sign-in bound to one tenant application, identified by slug.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ApplicationSignInRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
    #[validate(length(min = 1, max = 64))]
    pub application: String,
}

/// Request to rotate a refresh token.
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Token pair handed back on sign-in and refresh.
///
/// `refresh_token` is omitted when the user already holds an active session.
#[derive(Debug, Clone, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub token_type: String,
    pub expires_in: i64,
}

impl AuthResponse {
    pub fn new(access_token: String, refresh_token: Option<String>, expires_in: i64) -> Self {
        Self {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in,
        }
    }
}
