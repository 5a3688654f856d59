//! Services layer for access-service.
//!
//! Token issuance, OTP verification, session rotation and permission
//! resolution, plus the store and delivery collaborators they depend on.

mod auth;
pub mod credential_store;
mod email;
pub mod error;
pub mod guardian;
mod jwt;
pub mod kv_store;
pub mod otp;
pub mod otp_store;
pub mod permission_store;
mod session;
mod sms;

pub use auth::AuthService;
pub use credential_store::{CredentialStore, MockCredentialStore, PgCredentialStore};
pub use email::{EmailProvider, EmailService, MockEmailService, SentEmail};
pub use error::ServiceError;
pub use guardian::Guardian;
pub use jwt::{AccessTokenClaims, Identity, JwtService, RefreshTokenClaims, TokenPair};
pub use kv_store::{KeyValueStore, MockKeyValueStore, RedisService};
pub use otp::{OtpPolicy, OtpService};
pub use otp_store::OtpRepository;
pub use permission_store::{MockPermissionStore, PermissionStore, PgPermissionStore};
pub use session::SessionManager;
pub use sms::{MockSmsService, SmsProvider, TwilioSmsService};
