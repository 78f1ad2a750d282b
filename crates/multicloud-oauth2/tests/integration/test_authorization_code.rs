//! Authorization code grant through the local redirect listener

use std::collections::HashMap;

use multicloud_core::domain::{GrantType, TokenType};
use multicloud_core::ports::CredentialStore;
use multicloud_oauth2::{AuthorizationError, AuthorizationOutcome, GrantPhase, OAuth2ErrorKind};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer};

use crate::common;

/// Query parameters of the authorization URL the callback received
fn query(url: &str) -> HashMap<String, String> {
    url::Url::parse(url)
        .unwrap()
        .query_pairs()
        .into_owned()
        .collect()
}

/// Simulates the browser following the authorization server's redirect
async fn follow_redirect(params: &HashMap<String, String>, extra: &str) -> reqwest::Response {
    let redirect_uri = &params["redirect_uri"];
    reqwest::get(format!("{}?{}", redirect_uri, extra)).await.unwrap()
}

#[tokio::test]
async fn test_full_authorization_code_flow() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=abc123"))
        .and(body_string_contains("client_secret=s3cret"))
        .respond_with(common::token_response("at-1"))
        .expect(1)
        .mount(&server)
        .await;

    let mut harness = common::harness();
    let oauth = harness.oauth.clone();
    let settings = common::settings(&server, GrantType::AuthorizationCode);
    let flow = tokio::spawn(async move { oauth.authorize(&settings, Some("acct-1")).await });

    let url = harness.urls.recv().await.expect("authorization url");
    assert!(url.starts_with(&format!("{}/authorize?", server.uri())));
    let params = query(&url);
    assert_eq!(params["response_type"], "code");
    assert_eq!(params["client_id"], "app");
    assert_eq!(params["scope"], "files");
    let state = &params["state"];
    assert!(state.chars().all(|c| c.is_ascii_alphanumeric()));

    let page = follow_redirect(&params, &format!("code=abc123&state={}", state)).await;
    assert_eq!(page.status().as_u16(), 200);
    assert!(page.text().await.unwrap().contains("Authorization successful."));

    let outcome = flow.await.unwrap().unwrap();
    match &outcome {
        AuthorizationOutcome::Authorized { token, store_key } => {
            assert_eq!(store_key, "acct-1");
            assert_eq!(token.access_token, "at-1");
            assert_eq!(token.token_type, TokenType::Bearer);
            assert_eq!(token.expires_in, Some(3600));
        }
        other => panic!("expected a token, got {:?}", other),
    }

    let stored = harness.store.retrieve("acct-1").await.unwrap().unwrap();
    assert_eq!(stored.refresh_token.as_deref(), Some("at-1-refresh"));
    assert_eq!(harness.oauth.phase(), GrantPhase::Ready);
}

#[tokio::test]
async fn test_state_mismatch_never_reaches_token_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(common::token_response("unused"))
        .expect(0)
        .mount(&server)
        .await;

    let mut harness = common::harness();
    let oauth = harness.oauth.clone();
    let settings = common::settings(&server, GrantType::AuthorizationCode);
    let flow = tokio::spawn(async move { oauth.authorize(&settings, None).await });

    let params = query(&harness.urls.recv().await.unwrap());
    let page = follow_redirect(&params, "code=abc123&state=forged").await;
    assert_eq!(page.status().as_u16(), 400);

    let outcome = flow.await.unwrap().unwrap();
    assert_eq!(outcome.error().map(|e| e.kind.clone()), Some(OAuth2ErrorKind::StateMismatch));
    assert!(harness.store.is_empty());
}

#[tokio::test]
async fn test_missing_state_is_rejected() {
    let server = MockServer::start().await;
    let mut harness = common::harness();
    let oauth = harness.oauth.clone();
    let settings = common::settings(&server, GrantType::AuthorizationCode);
    let flow = tokio::spawn(async move { oauth.authorize(&settings, None).await });

    let params = query(&harness.urls.recv().await.unwrap());
    follow_redirect(&params, "code=abc123").await;

    let outcome = flow.await.unwrap().unwrap();
    let error = outcome.error().expect("state error");
    assert_eq!(error.kind, OAuth2ErrorKind::StateMissing);
    assert_eq!(error.description.as_deref(), Some("Missing state parameter."));
}

#[tokio::test]
async fn test_redirect_without_code() {
    let server = MockServer::start().await;
    let mut harness = common::harness();
    let oauth = harness.oauth.clone();
    let settings = common::settings(&server, GrantType::AuthorizationCode);
    let flow = tokio::spawn(async move { oauth.authorize(&settings, None).await });

    let params = query(&harness.urls.recv().await.unwrap());
    follow_redirect(&params, &format!("state={}", params["state"])).await;

    let outcome = flow.await.unwrap().unwrap();
    assert_eq!(outcome.error().map(|e| e.kind.clone()), Some(OAuth2ErrorKind::CodeMissing));
}

#[tokio::test]
async fn test_user_denies_access() {
    let server = MockServer::start().await;
    let mut harness = common::harness();
    let oauth = harness.oauth.clone();
    let settings = common::settings(&server, GrantType::AuthorizationCode);
    let flow = tokio::spawn(async move { oauth.authorize(&settings, None).await });

    let params = query(&harness.urls.recv().await.unwrap());
    let redirect = format!(
        "error=access_denied&error_description=denied+by+user&state={}",
        params["state"]
    );
    follow_redirect(&params, &redirect).await;

    let outcome = flow.await.unwrap().unwrap();
    let error = outcome.error().expect("provider error");
    assert_eq!(error.kind, OAuth2ErrorKind::AccessDenied);
    assert_eq!(error.description.as_deref(), Some("denied by user"));
}

#[tokio::test]
async fn test_token_endpoint_rejects_code() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(common::error_response("invalid_grant", "code expired"))
        .expect(1)
        .mount(&server)
        .await;

    let mut harness = common::harness();
    let oauth = harness.oauth.clone();
    let settings = common::settings(&server, GrantType::AuthorizationCode);
    let flow = tokio::spawn(async move { oauth.authorize(&settings, None).await });

    let params = query(&harness.urls.recv().await.unwrap());
    follow_redirect(&params, &format!("code=stale&state={}", params["state"])).await;

    let outcome = flow.await.unwrap().unwrap();
    let error = outcome.error().expect("token error");
    assert_eq!(error.kind, OAuth2ErrorKind::InvalidGrant);
    assert_eq!(error.description.as_deref(), Some("code expired"));
    assert!(harness.store.is_empty());
}

#[tokio::test]
async fn test_abort_while_waiting_for_redirect() {
    let server = MockServer::start().await;
    let mut harness = common::harness();
    let oauth = harness.oauth.clone();
    let settings = common::settings(&server, GrantType::AuthorizationCode);
    let flow = tokio::spawn(async move { oauth.authorize(&settings, None).await });

    harness.urls.recv().await.unwrap();
    harness.oauth.abort();

    let result = flow.await.unwrap();
    assert!(matches!(result, Err(AuthorizationError::Aborted)));
    assert_eq!(harness.oauth.phase(), GrantPhase::Idle);
}

#[tokio::test]
async fn test_listener_reused_across_grants() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(common::token_response("at"))
        .mount(&server)
        .await;

    let mut harness = common::harness();
    let mut redirect_uris = Vec::new();
    for key in ["first", "second"] {
        let oauth = harness.oauth.clone();
        let settings = common::settings(&server, GrantType::AuthorizationCode);
        let flow = tokio::spawn(async move { oauth.authorize(&settings, Some(key)).await });

        let params = query(&harness.urls.recv().await.unwrap());
        follow_redirect(&params, &format!("code=c&state={}", params["state"])).await;
        assert!(flow.await.unwrap().unwrap().is_authorized());
        redirect_uris.push(params["redirect_uri"].clone());
    }

    assert_eq!(redirect_uris[0], redirect_uris[1]);
    assert_eq!(harness.store.len(), 2);
}
