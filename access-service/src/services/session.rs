use std::sync::Arc;
use subtle::ConstantTimeEq;

use super::credential_store::CredentialStore;
use super::error::ServiceError;
use super::jwt::{Identity, JwtService, TokenPair};

/// Keeps at most one live refresh token per user.
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn CredentialStore>,
    jwt: JwtService,
}

impl SessionManager {
    pub fn new(store: Arc<dyn CredentialStore>, jwt: JwtService) -> Self {
        Self { store, jwt }
    }

    /// Store `refresh_token` for the user.
    ///
    /// Without `force` this refuses to replace an existing token and returns
    /// `RefreshTokenExists`. With `force` the value is overwritten, or cleared
    /// when `None`.
    #[tracing::instrument(skip(self, refresh_token))]
    pub async fn issue_or_rotate(
        &self,
        user_id: i64,
        force: bool,
        refresh_token: Option<&str>,
    ) -> Result<(), ServiceError> {
        if !force && self.store.is_refresh_token_set(user_id).await? {
            return Err(ServiceError::RefreshTokenExists);
        }

        self.store.set_refresh_token(user_id, refresh_token).await
    }

    /// Exchange the live refresh token for a new pair. The presented token
    /// must be the one on record; a superseded token is rejected.
    #[tracing::instrument(skip(self, presented))]
    pub async fn rotate(&self, presented: &str) -> Result<TokenPair, ServiceError> {
        if presented.is_empty() {
            return Err(ServiceError::InvalidRefreshToken);
        }

        let claims = self.jwt.validate_refresh_token(presented)?;
        let user_id = claims.user_id()?;

        let stored = self.store.get_refresh_token(user_id).await?;
        let matches = stored
            .as_deref()
            .is_some_and(|s| bool::from(s.as_bytes().ct_eq(presented.as_bytes())));
        if !matches {
            tracing::warn!(user_id, "Refresh token does not match the one on record");
            return Err(ServiceError::InvalidRefreshToken);
        }

        let user = self
            .store
            .get_user_by_id(user_id)
            .await?
            .ok_or(ServiceError::UserNotFound)?;

        let mut identity = Identity::from(&user);
        identity.application = claims.application();

        let pair = self.jwt.generate_token_pair(&identity)?;
        self.issue_or_rotate(user_id, true, Some(&pair.refresh_token))
            .await?;

        tracing::info!(user_id, "Refresh token rotated");
        Ok(pair)
    }

    /// Clear the user's session.
    pub async fn revoke(&self, user_id: i64) -> Result<(), ServiceError> {
        self.issue_or_rotate(user_id, true, None).await
    }
}
