//! Authorization code grant (RFC 6749 section 4.1)
//!
//! The user logs in at the authorize URL; the browser is redirected to the
//! local listener with `code` and `state`. The redirect handler validates the
//! state before anything is sent to the token endpoint, then runs the
//! exchange as a background task so the browser gets its page immediately.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use multicloud_core::domain::OAuth2Settings;
use multicloud_core::ports::AuthorizationRequest;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{
    authorization_url, await_redirect, check_state, failure_page, optional, prepare_redirect,
    redirect_error, required, Grant, GrantContext, GrantResult,
};
use crate::error::{AuthorizationError, OAuth2Error, OAuth2ErrorKind};
use crate::exchange::{merge_extra, request_token, Params};
use crate::listener::{RedirectHandler, WebPage};

/// Parameters computed by `setup`
#[derive(Debug, Clone)]
struct CodeFlow {
    authorize_uri: String,
    token_uri: String,
    authorize_params: Params,
    token_params: Params,
    state: String,
}

/// Redirect-based grant exchanging an authorization code for a token
pub struct AuthorizationCodeGrant {
    ctx: GrantContext,
    flow: Option<CodeFlow>,
    receiver: Option<oneshot::Receiver<GrantResult>>,
    redirect: Option<Arc<CodeRedirect>>,
}

impl AuthorizationCodeGrant {
    pub fn new(ctx: GrantContext) -> Self {
        Self {
            ctx,
            flow: None,
            receiver: None,
            redirect: None,
        }
    }

    /// CSRF state sent with the authorize request, once set up
    pub fn state(&self) -> Option<&str> {
        self.flow.as_ref().map(|flow| flow.state.as_str())
    }
}

#[async_trait::async_trait]
impl Grant for AuthorizationCodeGrant {
    async fn setup(&mut self, settings: &OAuth2Settings) -> Result<(), AuthorizationError> {
        let authorize_uri = required(&settings.authorize_uri, "authorize_uri")?.to_string();
        let token_uri = required(&settings.token_uri, "token_uri")?.to_string();
        let client_id = required(&settings.client_id, "client_id")?.to_string();

        let (redirect_uri, state) = prepare_redirect(&self.ctx, settings).await?;

        let mut authorize_params = Params::new();
        if let Some(scope) = optional(&settings.scope) {
            authorize_params.push(("scope".into(), scope.to_string()));
        }
        authorize_params.push(("client_id".into(), client_id.clone()));
        authorize_params.push(("redirect_uri".into(), redirect_uri.clone()));
        authorize_params.push(("response_type".into(), "code".into()));
        authorize_params.push(("state".into(), state.clone()));
        merge_extra(&mut authorize_params, &settings.extra_authorize_params);

        let mut token_params = Params::new();
        token_params.push(("client_id".into(), client_id));
        if let Some(secret) = optional(&settings.client_secret) {
            token_params.push(("client_secret".into(), secret.to_string()));
        }
        token_params.push(("grant_type".into(), "authorization_code".into()));
        token_params.push(("redirect_uri".into(), redirect_uri));
        merge_extra(&mut token_params, &settings.extra_token_params);

        self.flow = Some(CodeFlow {
            authorize_uri,
            token_uri,
            authorize_params,
            token_params,
            state,
        });
        Ok(())
    }

    async fn authorize(&mut self) -> Result<AuthorizationRequest, AuthorizationError> {
        let flow = self.flow.as_ref().ok_or_else(|| {
            AuthorizationError::InvalidSettings("grant was not set up".to_string())
        })?;
        let url = authorization_url(&flow.authorize_uri, &flow.authorize_params)?;

        let (sender, receiver) = oneshot::channel();
        let redirect = Arc::new(CodeRedirect {
            http: self.ctx.http.clone(),
            token_uri: flow.token_uri.clone(),
            token_params: flow.token_params.clone(),
            expected_state: flow.state.clone(),
            sender: Mutex::new(Some(sender)),
            exchange: Mutex::new(None),
        });
        self.ctx.listener.set_handler(redirect.clone()).await;
        self.redirect = Some(redirect);
        self.receiver = Some(receiver);

        info!("Authorization code grant waiting for redirect");
        Ok(AuthorizationRequest::visit(url))
    }

    async fn outcome(&mut self) -> GrantResult {
        await_redirect(self.receiver.take()).await
    }

    async fn close(&mut self) {
        if let Some(redirect) = self.redirect.take() {
            self.ctx.listener.clear_handler().await;
            redirect.abort_exchange();
        }
        self.receiver = None;
    }
}

// ============================================================================
// Redirect handling
// ============================================================================

/// Validates the redirect and launches the code exchange
struct CodeRedirect {
    http: reqwest::Client,
    token_uri: String,
    token_params: Params,
    expected_state: String,
    sender: Mutex<Option<oneshot::Sender<GrantResult>>>,
    exchange: Mutex<Option<JoinHandle<()>>>,
}

impl CodeRedirect {
    fn abort_exchange(&self) {
        let handle = self
            .exchange
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }

    fn fail(&self, sender: oneshot::Sender<GrantResult>, error: OAuth2Error) -> WebPage {
        warn!(kind = %error.kind, "Authorization redirect rejected");
        let page = failure_page(&error);
        let _ = sender.send(Err(error));
        page
    }
}

impl RedirectHandler for CodeRedirect {
    fn on_redirect(&self, params: &HashMap<String, String>) -> WebPage {
        let Some(sender) = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            debug!("Redirect received after the grant settled");
            return WebPage::success("Authorization already processed.");
        };

        if let Err(error) = check_state(params, &self.expected_state) {
            return self.fail(sender, error);
        }
        if let Some(error) = redirect_error(params) {
            return self.fail(sender, error);
        }
        let Some(code) = params.get("code") else {
            return self.fail(
                sender,
                OAuth2Error::new(OAuth2ErrorKind::CodeMissing)
                    .with_description("Authorization code missing."),
            );
        };

        let mut token_params = self.token_params.clone();
        token_params.push(("code".into(), code.clone()));
        let http = self.http.clone();
        let token_uri = self.token_uri.clone();
        let handle = tokio::spawn(async move {
            let result = request_token(&http, &token_uri, &token_params).await;
            let _ = sender.send(result);
        });
        *self.exchange.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);

        debug!("Authorization code received, exchanging");
        WebPage::success("Authorization successful.")
    }
}
