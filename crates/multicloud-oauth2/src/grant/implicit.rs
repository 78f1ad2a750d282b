//! Implicit grant (RFC 6749 section 4.2)
//!
//! The token arrives in the URL fragment, which browsers never send to the
//! server. The first hit on the listener therefore carries no parameters and
//! is answered with a page that re-requests the same path with the fragment
//! moved into the query string.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use multicloud_core::domain::OAuth2Settings;
use multicloud_core::ports::AuthorizationRequest;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::{
    authorization_url, await_redirect, check_state, failure_page, optional, prepare_redirect,
    redirect_error, required, Grant, GrantContext, GrantResult,
};
use crate::error::{AuthorizationError, OAuth2Error, OAuth2ErrorKind};
use crate::exchange::{merge_extra, Params, TokenResponse};
use crate::listener::{RedirectHandler, WebPage};

const FRAGMENT_RELAY: &str = r#"<!DOCTYPE html>
<html>
<head><title>MultiCloud - Authorization</title></head>
<body style="font-family: sans-serif; text-align: center; padding-top: 50px;">
    <p id="status">Completing authorization...</p>
    <script>
        var fragment = window.location.hash.substring(1);
        if (fragment) {
            window.location.replace(window.location.pathname + "?" + fragment);
        } else {
            document.getElementById("status").textContent = "Authorization response missing.";
        }
    </script>
</body>
</html>"#;

/// Redirect-based grant receiving the token directly
pub struct ImplicitGrant {
    ctx: GrantContext,
    flow: Option<(String, Params, String)>,
    receiver: Option<oneshot::Receiver<GrantResult>>,
    registered: bool,
}

impl ImplicitGrant {
    pub fn new(ctx: GrantContext) -> Self {
        Self {
            ctx,
            flow: None,
            receiver: None,
            registered: false,
        }
    }
}

#[async_trait::async_trait]
impl Grant for ImplicitGrant {
    async fn setup(&mut self, settings: &OAuth2Settings) -> Result<(), AuthorizationError> {
        let authorize_uri = required(&settings.authorize_uri, "authorize_uri")?.to_string();
        let client_id = required(&settings.client_id, "client_id")?.to_string();

        let (redirect_uri, state) = prepare_redirect(&self.ctx, settings).await?;

        let mut params = Params::new();
        if let Some(scope) = optional(&settings.scope) {
            params.push(("scope".into(), scope.to_string()));
        }
        params.push(("client_id".into(), client_id));
        params.push(("redirect_uri".into(), redirect_uri));
        params.push(("response_type".into(), "token".into()));
        params.push(("state".into(), state.clone()));
        merge_extra(&mut params, &settings.extra_authorize_params);

        self.flow = Some((authorize_uri, params, state));
        Ok(())
    }

    async fn authorize(&mut self) -> Result<AuthorizationRequest, AuthorizationError> {
        let (authorize_uri, params, state) = self.flow.as_ref().ok_or_else(|| {
            AuthorizationError::InvalidSettings("grant was not set up".to_string())
        })?;
        let url = authorization_url(authorize_uri, params)?;

        let (sender, receiver) = oneshot::channel();
        let redirect = Arc::new(TokenRedirect {
            expected_state: state.clone(),
            sender: Mutex::new(Some(sender)),
        });
        self.ctx.listener.set_handler(redirect).await;
        self.registered = true;
        self.receiver = Some(receiver);

        info!("Implicit grant waiting for redirect");
        Ok(AuthorizationRequest::visit(url))
    }

    async fn outcome(&mut self) -> GrantResult {
        await_redirect(self.receiver.take()).await
    }

    async fn close(&mut self) {
        if std::mem::take(&mut self.registered) {
            self.ctx.listener.clear_handler().await;
        }
        self.receiver = None;
    }
}

/// Reads the token out of the relayed fragment
struct TokenRedirect {
    expected_state: String,
    sender: Mutex<Option<oneshot::Sender<GrantResult>>>,
}

impl RedirectHandler for TokenRedirect {
    fn on_redirect(&self, params: &HashMap<String, String>) -> WebPage {
        if params.is_empty() {
            return WebPage::new(200, FRAGMENT_RELAY);
        }

        let Some(sender) = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            debug!("Redirect received after the grant settled");
            return WebPage::success("Authorization already processed.");
        };

        let result = check_state(params, &self.expected_state).and_then(|_| {
            if let Some(error) = redirect_error(params) {
                return Err(error);
            }
            if !params.contains_key("access_token") {
                return Err(OAuth2Error::new(OAuth2ErrorKind::CodeMissing)
                    .with_description("Access token missing."));
            }
            TokenResponse::from_params(params).into_result()
        });

        let page = match &result {
            Ok(_) => WebPage::success("Authorization successful."),
            Err(error) => {
                warn!(kind = %error.kind, "Implicit redirect rejected");
                failure_page(error)
            }
        };
        let _ = sender.send(result);
        page
    }
}
