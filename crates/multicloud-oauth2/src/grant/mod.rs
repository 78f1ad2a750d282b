//! Grant strategies
//!
//! A grant runs in three steps driven by the [`OAuth2`](crate::OAuth2) engine:
//! `setup` validates the settings, `authorize` starts the flow and says
//! whether the user must act, and `outcome` waits for the token or the
//! protocol error. `close` releases whatever the grant holds (listener
//! handler, background exchange) and is always called last.
//!
//! ## Modules
//!
//! - [`authorization_code`] - Redirect-based code grant with CSRF state
//! - [`implicit`] - Redirect-based grant returning the token in the fragment
//! - [`direct`] - Client-credentials, resource-owner password and refresh grants

pub mod authorization_code;
pub mod direct;
pub mod implicit;

use std::collections::HashMap;
use std::sync::Arc;

use multicloud_core::domain::{OAuth2Settings, Token};
use multicloud_core::ports::AuthorizationRequest;
use tokio::sync::oneshot;

use crate::error::{AuthorizationError, OAuth2Error, OAuth2ErrorKind};
use crate::exchange::Params;
use crate::listener::{RedirectListener, WebPage};
use crate::state::StateGenerator;

pub use authorization_code::AuthorizationCodeGrant;
pub use direct::{DirectGrant, DirectKind};
pub use implicit::ImplicitGrant;

/// Result a grant hands back once the flow has settled
pub type GrantResult = Result<Token, OAuth2Error>;

/// One OAuth2 authorization strategy
#[async_trait::async_trait]
pub trait Grant: Send {
    /// Validates and copies the settings; performs no network I/O besides
    /// starting the redirect listener
    async fn setup(&mut self, settings: &OAuth2Settings) -> Result<(), AuthorizationError>;

    /// Starts the flow
    ///
    /// # Returns
    ///
    /// The URL the user must visit, or [`AuthorizationRequest::none`]
    async fn authorize(&mut self) -> Result<AuthorizationRequest, AuthorizationError>;

    /// Waits until the flow produced a token or an error
    async fn outcome(&mut self) -> GrantResult;

    /// Releases the grant's resources; safe to call more than once
    async fn close(&mut self);
}

/// Shared collaborators handed to every grant
#[derive(Clone)]
pub struct GrantContext {
    pub http: reqwest::Client,
    pub listener: Arc<RedirectListener>,
    pub states: StateGenerator,
}

impl std::fmt::Debug for GrantContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrantContext")
            .field("listener", &self.listener)
            .field("states", &self.states)
            .finish_non_exhaustive()
    }
}

/// Builds an extension grant registered under a name
pub type GrantFactory = Arc<dyn Fn(GrantContext) -> Box<dyn Grant> + Send + Sync>;

/// Returns the value of a required setting or an `InvalidSettings` error
pub(crate) fn required<'a>(
    value: &'a Option<String>,
    name: &str,
) -> Result<&'a str, AuthorizationError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AuthorizationError::InvalidSettings(format!("{} is required", name)))
}

/// Non-empty value of an optional setting
pub(crate) fn optional(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|value| !value.is_empty())
}

/// Appends `params` to the query of `base`
pub(crate) fn authorization_url(base: &str, params: &Params) -> Result<String, AuthorizationError> {
    let mut url = url::Url::parse(base).map_err(|e| {
        AuthorizationError::InvalidSettings(format!("authorize_uri '{}' is not a URL: {}", base, e))
    })?;
    url.query_pairs_mut().extend_pairs(params.iter());
    Ok(url.into())
}

/// Starts the shared listener and picks the redirect URI and CSRF state
///
/// # Returns
///
/// `(redirect_uri, state)`; a configured redirect URI wins over the
/// listener's own address
pub(crate) async fn prepare_redirect(
    ctx: &GrantContext,
    settings: &OAuth2Settings,
) -> Result<(String, String), AuthorizationError> {
    let address = ctx.listener.start().await?;
    let state = ctx.states.generate(Some(address.port()));
    let redirect_uri = match optional(&settings.redirect_uri) {
        Some(uri) => uri.to_string(),
        None => format!("http://{}/", address),
    };
    Ok((redirect_uri, state))
}

/// Outcome of the `state` check every redirect handler performs first
pub(crate) fn check_state(
    params: &HashMap<String, String>,
    expected: &str,
) -> Result<(), OAuth2Error> {
    match params.get("state") {
        None => Err(OAuth2Error::new(OAuth2ErrorKind::StateMissing)
            .with_description("Missing state parameter.")),
        Some(state) if state != expected => Err(OAuth2Error::new(OAuth2ErrorKind::StateMismatch)
            .with_description("State parameter mismatch.")),
        Some(_) => Ok(()),
    }
}

/// Error reported by the authorization server in the redirect, if any
pub(crate) fn redirect_error(params: &HashMap<String, String>) -> Option<OAuth2Error> {
    let code = params.get("error")?;
    let mut error = OAuth2Error::new(OAuth2ErrorKind::parse(code));
    error.description = params.get("error_description").cloned();
    error.uri = params.get("error_uri").cloned();
    Some(error)
}

/// Page describing a failed redirect
pub(crate) fn failure_page(error: &OAuth2Error) -> WebPage {
    WebPage::failure(error.description.as_deref().unwrap_or(error.kind.as_str()))
}

/// Waits for the result a redirect handler sends back
pub(crate) async fn await_redirect(receiver: Option<oneshot::Receiver<GrantResult>>) -> GrantResult {
    match receiver {
        Some(receiver) => receiver.await.unwrap_or_else(|_| {
            Err(OAuth2Error::new(OAuth2ErrorKind::Aborted)
                .with_description("Redirect handler dropped before completing."))
        }),
        None => Err(OAuth2Error::new(OAuth2ErrorKind::Aborted)
            .with_description("Grant was not authorized.")),
    }
}
