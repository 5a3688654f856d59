//! Roles, permissions and the resolved output of permission checks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::application::Service;

/// Application-scoped bundle of permissions assigned to users.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Role {
    pub id: i64,
    pub application_id: i64,
    pub slug: String,
    pub name: String,
}

impl Role {
    /// Slug unique within an application: `<app_id>-<normalised name>`.
    /// A blank name has no slug.
    pub fn generate_slug(application_id: i64, name: &str) -> String {
        let name = name.trim();
        if name.is_empty() {
            return String::new();
        }

        let normalised: String = name
            .to_lowercase()
            .replace(' ', "-")
            .chars()
            .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-')
            .collect();
        format!("{}-{}", application_id, normalised)
    }
}

/// Action granted to a role on one service, conventionally an HTTP verb.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Permission {
    pub id: i64,
    pub slug: String,
    pub name: Option<String>,
}

/// Why a permission check was denied. Only ever logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    UserNotFound,
    NoApplicationAccess,
    ApplicationInactive,
    ServiceNotFound,
    ServiceInactive,
    NoRoleAssigned,
    NoServicePermission,
    MethodNotPermitted,
}

impl DenialReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenialReason::UserNotFound => "user_not_found",
            DenialReason::NoApplicationAccess => "no_application_access",
            DenialReason::ApplicationInactive => "application_inactive",
            DenialReason::ServiceNotFound => "service_not_found",
            DenialReason::ServiceInactive => "service_inactive",
            DenialReason::NoRoleAssigned => "no_role_assigned",
            DenialReason::NoServicePermission => "no_service_permission",
            DenialReason::MethodNotPermitted => "method_not_permitted",
        }
    }
}

impl std::fmt::Display for DenialReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved grant for one (user, application, service, method) check.
#[derive(Debug, Clone, Serialize)]
pub struct PermissionGrant {
    pub service: Service,
    pub role: Role,
    pub permissions: Vec<String>,
    pub method: String,
    pub granted: bool,
}

impl PermissionGrant {
    /// Case-insensitive exact match of the verb against the granted slugs.
    pub fn permits(permissions: &[String], method: &str) -> bool {
        let method = method.to_lowercase();
        permissions.iter().any(|p| p.to_lowercase() == method)
    }
}

/// Outcome of a permission check.
#[derive(Debug, Clone)]
pub enum AccessDecision {
    Granted(PermissionGrant),
    Denied(DenialReason),
}

impl AccessDecision {
    pub fn is_granted(&self) -> bool {
        matches!(self, AccessDecision::Granted(_))
    }
}

/// Best-effort cache document of a resolved grant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessSnapshot {
    pub user_id: i64,
    pub role_id: i64,
    pub role_slug: String,
    pub application_id: i64,
    pub application_slug: String,
    pub service_id: i64,
    pub service_slug: String,
    pub permissions: Vec<String>,
    pub resolved_at: DateTime<Utc>,
}

impl AccessSnapshot {
    pub fn cache_key(user_id: i64, application_slug: &str, service_slug: &str) -> String {
        format!(
            "guardian_access_permission:{}:{}:{}",
            user_id, application_slug, service_slug
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_is_prefixed_and_normalised() {
        assert_eq!(Role::generate_slug(7, "Billing Admin"), "7-billing-admin");
        assert_eq!(Role::generate_slug(3, "  Ops & Support!  "), "3-ops--support");
        assert_eq!(Role::generate_slug(3, ""), "");
        assert_eq!(Role::generate_slug(3, "   "), "");
    }

    #[test]
    fn permits_is_case_insensitive_and_exact() {
        let perms = vec!["GET".to_string(), "post".to_string()];
        assert!(PermissionGrant::permits(&perms, "get"));
        assert!(PermissionGrant::permits(&perms, "POST"));
        assert!(!PermissionGrant::permits(&perms, "put"));
        assert!(!PermissionGrant::permits(&perms, "DELETE"));
    }

    #[test]
    fn snapshot_key_format() {
        assert_eq!(
            AccessSnapshot::cache_key(42, "billing", "invoices"),
            "guardian_access_permission:42:billing:invoices"
        );
    }
}
