//! Token-endpoint-only grants, refresh and extension grants

use std::sync::Arc;

use multicloud_core::domain::{GrantType, OAuth2Settings, Token};
use multicloud_core::ports::{AuthorizationRequest, CredentialStore};
use multicloud_oauth2::grant::GrantResult;
use multicloud_oauth2::{
    AuthorizationError, AuthorizationOutcome, Grant, GrantContext, GrantFactory, OAuth2ErrorKind,
};
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common;

#[tokio::test]
async fn test_client_credentials_grant() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=client_credentials"))
        .and(body_string_contains("scope=files"))
        .respond_with(common::token_response("cc-token"))
        .expect(1)
        .mount(&server)
        .await;

    let mut harness = common::harness();
    let settings = common::settings(&server, GrantType::ClientCredentials);

    let outcome = harness.oauth.authorize(&settings, None).await.unwrap();

    let store_key = outcome.store_key().expect("generated key").to_string();
    let stored = harness.store.retrieve(&store_key).await.unwrap().unwrap();
    assert_eq!(stored.access_token, "cc-token");
    assert!(harness.urls.try_recv().is_err());
    assert!(!harness.oauth.listener().is_running().await);
}

#[tokio::test]
async fn test_password_grant() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=password"))
        .and(body_string_contains("username=jane"))
        .and(body_string_contains("password=hunter2"))
        .respond_with(common::token_response("pw-token"))
        .expect(1)
        .mount(&server)
        .await;

    let harness = common::harness();
    let mut settings = common::settings(&server, GrantType::ResourceOwnerPassword);
    settings.username = Some("jane".to_string());
    settings.password = Some("hunter2".to_string());

    let outcome = harness.oauth.authorize(&settings, Some("jane")).await.unwrap();

    assert_eq!(outcome.store_key(), Some("jane"));
}

#[tokio::test]
async fn test_refresh_merges_into_stored_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=rt-old"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "at-new",
            "token_type": "bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let harness = common::harness();
    let mut old = Token::bearer("at-old")
        .with_refresh_token("rt-old")
        .with_expires_in(100);
    old.issued_at = 0;
    harness.store.store_as("acct", &old).await.unwrap();

    let settings = common::settings(&server, GrantType::AuthorizationCode);
    let outcome = harness.oauth.refresh(&settings, "acct").await.unwrap();

    let AuthorizationOutcome::Authorized { token, store_key } = outcome else {
        panic!("refresh failed");
    };
    assert_eq!(store_key, "acct");
    assert_eq!(token.access_token, "at-new");
    assert_eq!(token.refresh_token.as_deref(), Some("rt-old"));
    assert_eq!(token.expires_in, Some(100));
    assert!(token.issued_at > 0);

    let stored = harness.store.retrieve("acct").await.unwrap().unwrap();
    assert_eq!(stored, token);
}

#[tokio::test]
async fn test_rejected_refresh_keeps_stored_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(common::error_response("invalid_grant", "refresh token revoked"))
        .mount(&server)
        .await;

    let harness = common::harness();
    let old = Token::bearer("at-old").with_refresh_token("rt-old");
    harness.store.store_as("acct", &old).await.unwrap();

    let settings = common::settings(&server, GrantType::AuthorizationCode);
    let outcome = harness.oauth.refresh(&settings, "acct").await.unwrap();

    assert_eq!(outcome.error().map(|e| e.kind.clone()), Some(OAuth2ErrorKind::InvalidGrant));
    let stored = harness.store.retrieve("acct").await.unwrap().unwrap();
    assert_eq!(stored.access_token, "at-old");
}

#[tokio::test]
async fn test_unreachable_token_endpoint() {
    let harness = common::harness();
    let mut settings = OAuth2Settings::new(GrantType::ClientCredentials);
    settings.token_uri = Some("http://127.0.0.1:1/token".to_string());

    let outcome = harness.oauth.authorize(&settings, None).await.unwrap();

    assert_eq!(outcome.error().map(|e| e.kind.clone()), Some(OAuth2ErrorKind::TransportFailure));
    assert!(harness.store.is_empty());
}

#[tokio::test]
async fn test_non_json_token_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>bad gateway</html>"))
        .mount(&server)
        .await;

    let harness = common::harness();
    let settings = common::settings(&server, GrantType::ClientCredentials);
    let outcome = harness.oauth.authorize(&settings, None).await.unwrap();

    assert_eq!(outcome.error().map(|e| e.kind.clone()), Some(OAuth2ErrorKind::InvalidResponse));
}

#[tokio::test]
async fn test_password_grant_validates_settings() {
    let server = MockServer::start().await;
    let harness = common::harness();
    let settings = common::settings(&server, GrantType::ResourceOwnerPassword);

    let result = harness.oauth.authorize(&settings, None).await;

    assert!(matches!(result, Err(AuthorizationError::InvalidSettings(_))));
}

/// Extension grant issuing a token derived from the configured client id
struct StaticGrant {
    client_id: String,
}

#[async_trait::async_trait]
impl Grant for StaticGrant {
    async fn setup(&mut self, settings: &OAuth2Settings) -> Result<(), AuthorizationError> {
        self.client_id = settings.client_id.clone().unwrap_or_default();
        Ok(())
    }

    async fn authorize(&mut self) -> Result<AuthorizationRequest, AuthorizationError> {
        Ok(AuthorizationRequest::none())
    }

    async fn outcome(&mut self) -> GrantResult {
        Ok(Token::bearer(format!("static-{}", self.client_id)))
    }

    async fn close(&mut self) {}
}

#[tokio::test]
async fn test_registered_extension_grant() {
    let store = Arc::new(multicloud_core::ports::MemoryCredentialStore::new());
    let mut oauth = multicloud_oauth2::OAuth2::new(
        &multicloud_core::config::OAuthConfig::default(),
        Arc::new(multicloud_oauth2::RedirectListener::new("127.0.0.1", 0)),
    )
    .with_store(store.clone());
    let factory: GrantFactory = Arc::new(|_ctx: GrantContext| -> Box<dyn Grant> {
        Box::new(StaticGrant {
            client_id: String::new(),
        })
    });
    oauth.register_extension("static", factory);

    let mut settings = OAuth2Settings::new(GrantType::Extension);
    settings.extension_grant = Some("static".to_string());
    settings.client_id = Some("app".to_string());

    let outcome = oauth.authorize(&settings, Some("ext")).await.unwrap();

    assert!(outcome.is_authorized());
    let stored = store.retrieve("ext").await.unwrap().unwrap();
    assert_eq!(stored.access_token, "static-app");
}
