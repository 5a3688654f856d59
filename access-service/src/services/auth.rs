use std::sync::Arc;

use super::credential_store::CredentialStore;
use super::error::ServiceError;
use super::jwt::{Identity, JwtService};
use super::otp::OtpService;
use super::permission_store::PermissionStore;
use super::session::SessionManager;
use crate::models::{
    ApplicationGrant, ApplicationScope, ApplicationSignInRequest, AuthResponse, DenialReason,
    NewUser, OtpChannel, SignInRequest, SignUpRequest, UniqueFields, User,
};
use crate::utils::identifier::{format_phone_number, normalize_email};
use crate::utils::{hash_password, verify_password, Password, PasswordHashString};

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn CredentialStore>,
    permissions: Arc<dyn PermissionStore>,
    otp: OtpService,
    sessions: SessionManager,
    jwt: JwtService,
    otp_enabled: bool,
    country_code: String,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn CredentialStore>,
        permissions: Arc<dyn PermissionStore>,
        otp: OtpService,
        sessions: SessionManager,
        jwt: JwtService,
        otp_enabled: bool,
        country_code: impl Into<String>,
    ) -> Self {
        Self {
            users,
            permissions,
            otp,
            sessions,
            jwt,
            otp_enabled,
            country_code: country_code.into(),
        }
    }

    /// Create an account. With the OTP gate on, both the phone number and
    /// the email must hold a verified OTP, which is consumed on success.
    #[tracing::instrument(skip(self, req), fields(username = %req.username))]
    pub async fn sign_up(&self, req: SignUpRequest) -> Result<User, ServiceError> {
        let phone_number =
            format_phone_number(&req.phone_number, &self.country_code).map_err(ServiceError::Validation)?;
        let email = normalize_email(&req.email);

        let taken = self
            .users
            .check_unique_fields(&UniqueFields {
                email: email.clone(),
                phone_number: phone_number.clone(),
                username: req.username.clone(),
            })
            .await?;
        if taken.email_taken {
            return Err(ServiceError::EmailTaken);
        }
        if taken.phone_taken {
            return Err(ServiceError::PhoneTaken);
        }
        if taken.username_taken {
            return Err(ServiceError::UsernameTaken);
        }

        if self.otp_enabled {
            self.otp.require_verified(OtpChannel::Phone, &phone_number).await?;
            self.otp.require_verified(OtpChannel::Email, &email).await?;
        }

        let password_hash = hash_password(&Password::new(req.password)).map_err(|e| {
            ServiceError::Internal(anyhow::anyhow!("Password hashing error: {}", e))
        })?;

        let mut new_user = NewUser::new(
            email.clone(),
            phone_number.clone(),
            req.username,
            password_hash.into_string(),
        );
        new_user.is_email_verified = self.otp_enabled;
        new_user.is_phone_verified = self.otp_enabled;

        let user = self.users.create_user(new_user).await?;
        tracing::info!(user_id = user.id, "User signed up");

        if self.otp_enabled {
            self.consume_otp(OtpChannel::Phone, &phone_number).await;
            self.consume_otp(OtpChannel::Email, &email).await;
        }

        Ok(user)
    }

    /// Password sign-in. A user that already holds a session gets an access
    /// token only.
    #[tracing::instrument(skip(self, req))]
    pub async fn sign_in(&self, req: SignInRequest) -> Result<AuthResponse, ServiceError> {
        let user = self.authenticate(&req.email, req.password).await?;
        self.open_session(&user, None).await
    }

    /// Password sign-in for one application. The user needs access to an
    /// active application, and the issued pair is bound to it.
    #[tracing::instrument(skip(self, req), fields(application = %req.application))]
    pub async fn sign_in_to_application(
        &self,
        req: ApplicationSignInRequest,
    ) -> Result<AuthResponse, ServiceError> {
        let user = self.authenticate(&req.email, req.password).await?;

        let access = match self
            .permissions
            .get_application_access(user.id, &req.application)
            .await?
        {
            Some(access) if access.has_access => access,
            _ => {
                tracing::info!(user_id = user.id, "Sign-in rejected: no application access");
                return Err(ServiceError::Unauthorized(DenialReason::NoApplicationAccess));
            }
        };
        if !access.is_app_active {
            tracing::info!(user_id = user.id, "Sign-in rejected: application inactive");
            return Err(ServiceError::Unauthorized(DenialReason::ApplicationInactive));
        }

        let grant = ApplicationGrant {
            application_id: access.application_id,
            scope: ApplicationScope::Internal,
        };
        self.open_session(&user, Some(grant)).await
    }

    async fn authenticate(&self, email: &str, password: String) -> Result<User, ServiceError> {
        let email = normalize_email(email);

        let stored_hash = self
            .users
            .get_password_hash_by_email(&email)
            .await?
            .ok_or(ServiceError::InvalidCredentials)?;

        let matches = verify_password(&Password::new(password), &PasswordHashString::new(stored_hash))
            .map_err(ServiceError::Internal)?;
        if !matches {
            tracing::info!("Sign-in rejected: wrong password");
            return Err(ServiceError::InvalidCredentials);
        }

        self.users
            .get_user_by_email(&email)
            .await?
            .ok_or(ServiceError::InvalidCredentials)
    }

    async fn open_session(
        &self,
        user: &User,
        application: Option<ApplicationGrant>,
    ) -> Result<AuthResponse, ServiceError> {
        let mut identity = Identity::from(user);
        identity.application = application;
        let pair = self.jwt.generate_token_pair(&identity)?;

        let refresh_token = match self
            .sessions
            .issue_or_rotate(user.id, false, Some(&pair.refresh_token))
            .await
        {
            Ok(()) => Some(pair.refresh_token),
            Err(ServiceError::RefreshTokenExists) => {
                tracing::info!(user_id = user.id, "Active session exists, refresh token withheld");
                None
            }
            Err(e) => return Err(e),
        };

        if let Err(e) = self.users.touch_last_login(user.id).await {
            tracing::warn!(error = %e, user_id = user.id, "Failed to record last login");
        }

        tracing::info!(user_id = user.id, "User signed in");
        Ok(AuthResponse::new(
            pair.access_token,
            refresh_token,
            self.jwt.access_token_expiry_seconds(),
        ))
    }

    pub async fn sign_out(&self, user_id: i64) -> Result<(), ServiceError> {
        self.sessions.revoke(user_id).await?;
        tracing::info!(user_id, "User signed out");
        Ok(())
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<AuthResponse, ServiceError> {
        if refresh_token.is_empty() {
            return Err(ServiceError::InvalidRefreshToken);
        }

        let pair = self.sessions.rotate(refresh_token).await?;
        Ok(AuthResponse::new(
            pair.access_token,
            Some(pair.refresh_token),
            self.jwt.access_token_expiry_seconds(),
        ))
    }

    async fn consume_otp(&self, channel: OtpChannel, value: &str) {
        match self.otp.delete(channel, value).await {
            Ok(()) | Err(ServiceError::OtpNotFound) => {}
            Err(e) => tracing::warn!(error = %e, channel = %channel, "Failed to clean up OTP after sign-up"),
        }
    }
}
