//! Permission resolution.
//!
//! Walks user -> application access -> service -> role -> permissions ->
//! method and stops at the first failing step.

use chrono::Utc;
use std::sync::Arc;

use super::credential_store::CredentialStore;
use super::error::ServiceError;
use super::kv_store::KeyValueStore;
use super::permission_store::PermissionStore;
use crate::models::{
    AccessDecision, AccessSnapshot, DenialReason, PermissionGrant, RequestContext,
};

pub const DEFAULT_SNAPSHOT_TTL_SECONDS: u64 = 300;

#[derive(Clone)]
pub struct Guardian {
    users: Arc<dyn CredentialStore>,
    permissions: Arc<dyn PermissionStore>,
    cache: Option<Arc<dyn KeyValueStore>>,
    snapshot_ttl_seconds: u64,
}

impl Guardian {
    pub fn new(users: Arc<dyn CredentialStore>, permissions: Arc<dyn PermissionStore>) -> Self {
        Self {
            users,
            permissions,
            cache: None,
            snapshot_ttl_seconds: DEFAULT_SNAPSHOT_TTL_SECONDS,
        }
    }

    /// Write a snapshot of every grant to `cache`.
    pub fn with_snapshot_cache(mut self, cache: Arc<dyn KeyValueStore>, ttl_seconds: u64) -> Self {
        self.cache = Some(cache);
        self.snapshot_ttl_seconds = ttl_seconds;
        self
    }

    /// Resolve whether the caller may invoke `method` on the service.
    ///
    /// Denials are values; only store failures are errors.
    #[tracing::instrument(
        skip(self, ctx),
        fields(user_id = ctx.user_id, request_id = ctx.request_id.as_deref().unwrap_or(""))
    )]
    pub async fn check(
        &self,
        ctx: &RequestContext,
        application_slug: &str,
        service_slug: &str,
        method: &str,
    ) -> Result<AccessDecision, ServiceError> {
        let decision = self
            .resolve(ctx, application_slug, service_slug, method)
            .await?;

        match &decision {
            AccessDecision::Granted(grant) => {
                tracing::debug!(role = %grant.role.slug, "Permission granted");
                self.write_snapshot(ctx.user_id, application_slug, grant).await;
            }
            AccessDecision::Denied(reason) => {
                tracing::info!(reason = %reason, "Permission denied");
            }
        }

        Ok(decision)
    }

    /// Same as [`Guardian::check`], with a denial turned into
    /// `ServiceError::Unauthorized`.
    pub async fn authorize(
        &self,
        ctx: &RequestContext,
        application_slug: &str,
        service_slug: &str,
        method: &str,
    ) -> Result<PermissionGrant, ServiceError> {
        match self.check(ctx, application_slug, service_slug, method).await? {
            AccessDecision::Granted(grant) => Ok(grant),
            AccessDecision::Denied(reason) => Err(ServiceError::Unauthorized(reason)),
        }
    }

    async fn resolve(
        &self,
        ctx: &RequestContext,
        application_slug: &str,
        service_slug: &str,
        method: &str,
    ) -> Result<AccessDecision, ServiceError> {
        use AccessDecision::Denied;

        if self.users.get_user_by_id(ctx.user_id).await?.is_none() {
            return Ok(Denied(DenialReason::UserNotFound));
        }

        let Some(access) = self
            .permissions
            .get_application_access(ctx.user_id, application_slug)
            .await?
        else {
            return Ok(Denied(DenialReason::NoApplicationAccess));
        };
        if !access.has_access {
            return Ok(Denied(DenialReason::NoApplicationAccess));
        }
        // A token bound to one application cannot act on another.
        if let Some(bound) = ctx.application {
            if bound.application_id != access.application_id {
                return Ok(Denied(DenialReason::NoApplicationAccess));
            }
        }
        if !access.is_app_active {
            return Ok(Denied(DenialReason::ApplicationInactive));
        }

        let Some(service) = self
            .permissions
            .get_service_by_slug(access.application_id, service_slug)
            .await?
        else {
            return Ok(Denied(DenialReason::ServiceNotFound));
        };
        if !service.is_active {
            return Ok(Denied(DenialReason::ServiceInactive));
        }

        let Some(role) = self
            .permissions
            .get_role_for_user(ctx.user_id, access.application_id)
            .await?
        else {
            return Ok(Denied(DenialReason::NoRoleAssigned));
        };

        let permissions: Vec<String> = self
            .permissions
            .get_permissions(role.id, service.id)
            .await?
            .into_iter()
            .map(|p| p.slug)
            .collect();
        if permissions.is_empty() {
            return Ok(Denied(DenialReason::NoServicePermission));
        }

        if !PermissionGrant::permits(&permissions, method) {
            return Ok(Denied(DenialReason::MethodNotPermitted));
        }

        Ok(AccessDecision::Granted(PermissionGrant {
            service,
            role,
            permissions,
            method: method.to_lowercase(),
            granted: true,
        }))
    }

    async fn write_snapshot(&self, user_id: i64, application_slug: &str, grant: &PermissionGrant) {
        let Some(cache) = &self.cache else {
            return;
        };

        let snapshot = AccessSnapshot {
            user_id,
            role_id: grant.role.id,
            role_slug: grant.role.slug.clone(),
            application_id: grant.service.application_id,
            application_slug: application_slug.to_string(),
            service_id: grant.service.id,
            service_slug: grant.service.slug.clone(),
            permissions: grant.permissions.clone(),
            resolved_at: Utc::now(),
        };

        let key = AccessSnapshot::cache_key(user_id, application_slug, &grant.service.slug);
        let result = match serde_json::to_string(&snapshot) {
            Ok(raw) => cache.set_ex(&key, &raw, self.snapshot_ttl_seconds).await,
            Err(e) => Err(ServiceError::Internal(e.into())),
        };

        if let Err(e) = result {
            tracing::warn!(error = %e, key = %key, "Failed to write access snapshot");
        }
    }
}
