//! Authorization callback port
//!
//! A grant that needs the end user (for example to log in through a
//! browser) produces an [`AuthorizationRequest`]; the application surfaces
//! it through an [`AuthorizationCallback`].

use serde::{Deserialize, Serialize};

/// What the end user must do to complete a grant
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationRequest {
    /// URL to visit; `None` when the grant needs no user action
    pub uri: Option<String>,
}

impl AuthorizationRequest {
    /// A request that sends the user to `uri`
    pub fn visit(uri: impl Into<String>) -> Self {
        Self {
            uri: Some(uri.into()),
        }
    }

    /// A request that needs no user action
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_action_required(&self) -> bool {
        self.uri.is_some()
    }
}

impl std::fmt::Display for AuthorizationRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.uri {
            Some(uri) => write!(f, "To authorize this application, visit:\n{}", uri),
            None => write!(f, "No action required."),
        }
    }
}

/// Surfaces an authorization request to the end user
pub trait AuthorizationCallback: Send + Sync {
    fn on_authorization_request(&self, request: &AuthorizationRequest);
}
