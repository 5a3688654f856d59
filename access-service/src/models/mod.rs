pub mod application;
pub mod context;
pub mod otp;
pub mod role;
pub mod user;

pub use application::{Application, ApplicationAccess, ApplicationScope, Service};
pub use context::{ApplicationGrant, RequestContext};
pub use otp::{OtpChannel, OtpRecord, OtpRequest, OtpResponse, OtpState, VerifyOtpRequest};
pub use role::{AccessDecision, AccessSnapshot, DenialReason, Permission, PermissionGrant, Role};
pub use user::{
    ApplicationSignInRequest, AuthResponse, NewUser, RefreshRequest, SignInRequest, SignUpRequest,
    UniqueFields, UniqueFieldsTaken, User,
};
