//! Shared helpers for OAuth2 integration tests

use std::sync::Arc;

use multicloud_core::config::OAuthConfig;
use multicloud_core::domain::{GrantType, OAuth2Settings};
use multicloud_core::ports::{AuthorizationCallback, AuthorizationRequest, MemoryCredentialStore};
use multicloud_oauth2::{OAuth2, RedirectListener};
use serde_json::json;
use tokio::sync::mpsc;
use wiremock::{MockServer, ResponseTemplate};

/// Forwards every authorization URL to the test
pub struct RecordingCallback {
    sender: mpsc::UnboundedSender<String>,
}

impl AuthorizationCallback for RecordingCallback {
    fn on_authorization_request(&self, request: &AuthorizationRequest) {
        if let Some(uri) = &request.uri {
            let _ = self.sender.send(uri.clone());
        }
    }
}

pub struct Harness {
    pub oauth: Arc<OAuth2>,
    pub store: Arc<MemoryCredentialStore>,
    pub urls: mpsc::UnboundedReceiver<String>,
}

/// Engine with its own ephemeral listener, an in-memory store and a
/// recording callback
pub fn harness() -> Harness {
    let (sender, urls) = mpsc::unbounded_channel();
    let store = Arc::new(MemoryCredentialStore::new());
    let oauth = OAuth2::new(
        &OAuthConfig::default(),
        Arc::new(RedirectListener::new("127.0.0.1", 0)),
    )
    .with_store(store.clone())
    .with_callback(Arc::new(RecordingCallback { sender }));

    Harness {
        oauth: Arc::new(oauth),
        store,
        urls,
    }
}

pub fn settings(server: &MockServer, grant_type: GrantType) -> OAuth2Settings {
    let mut settings = OAuth2Settings::new(grant_type);
    settings.client_id = Some("app".to_string());
    settings.client_secret = Some("s3cret".to_string());
    settings.authorize_uri = Some(format!("{}/authorize", server.uri()));
    settings.token_uri = Some(format!("{}/token", server.uri()));
    settings.scope = Some("files".to_string());
    settings
}

pub fn token_response(access_token: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "access_token": access_token,
        "token_type": "bearer",
        "expires_in": 3600,
        "refresh_token": format!("{}-refresh", access_token)
    }))
}

pub fn error_response(code: &str, description: &str) -> ResponseTemplate {
    ResponseTemplate::new(400).set_body_json(json!({
        "error": code,
        "error_description": description
    }))
}
