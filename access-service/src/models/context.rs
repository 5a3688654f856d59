//! Typed per-request identity built from a verified access token.

use serde::Serialize;

use super::application::ApplicationScope;

/// Application grant carried in an access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ApplicationGrant {
    pub application_id: i64,
    pub scope: ApplicationScope,
}

/// Immutable caller identity, handed explicitly to the permission resolver.
#[derive(Debug, Clone, Serialize)]
pub struct RequestContext {
    pub user_id: i64,
    pub username: String,
    pub email: String,
    pub application: Option<ApplicationGrant>,
    pub request_id: Option<String>,
}

impl RequestContext {
    pub fn new(user_id: i64, username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            user_id,
            username: username.into(),
            email: email.into(),
            application: None,
            request_id: None,
        }
    }

    pub fn with_application(mut self, grant: ApplicationGrant) -> Self {
        self.application = Some(grant);
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}
