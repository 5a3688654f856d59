//! HTTP handlers for access-service.

pub mod auth;
pub mod guardian;
pub mod otp;

pub use auth::*;
pub use guardian::*;
pub use otp::*;
