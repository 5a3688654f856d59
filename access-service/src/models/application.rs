//! Applications, their scopes and the services they own.
//!
//! These are read-only inputs to permission resolution. Records are managed
//! elsewhere on the platform.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Visibility tier of an application or service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationScope {
    Public,
    Internal,
    Protected,
}

impl ApplicationScope {
    pub const ALL: [ApplicationScope; 3] = [
        ApplicationScope::Public,
        ApplicationScope::Internal,
        ApplicationScope::Protected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationScope::Public => "public",
            ApplicationScope::Internal => "internal",
            ApplicationScope::Protected => "protected",
        }
    }
}

impl std::fmt::Display for ApplicationScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ApplicationScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "public" => Ok(ApplicationScope::Public),
            "internal" => Ok(ApplicationScope::Internal),
            "protected" => Ok(ApplicationScope::Protected),
            _ => Err(format!("Invalid application scope: {}", s)),
        }
    }
}

/// Tenant application.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Application {
    pub id: i64,
    pub slug: String,
    pub name: String,
    pub is_active: bool,
}

/// Internal service owned by an application.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Service {
    pub id: i64,
    pub application_id: i64,
    pub slug: String,
    pub name: String,
    pub scope: String,
    pub is_active: bool,
}

impl Service {
    /// Parsed scope; unknown values are treated as the most restrictive tier.
    pub fn scope(&self) -> ApplicationScope {
        self.scope.parse().unwrap_or(ApplicationScope::Protected)
    }
}

/// A user's view of one application: the application itself and whether an
/// access association exists.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ApplicationAccess {
    pub application_id: i64,
    pub application_slug: String,
    pub application_name: String,
    pub is_app_active: bool,
    pub has_access: bool,
}
