//! OAuth2 engine
//!
//! Selects a grant from the settings, drives it through
//! `setup → authorize → outcome → close` and persists the resulting token.
//!
//! ## Design Notes
//!
//! - The engine's phase (`Idle → Authorizing → Exchanging → Ready`) is
//!   published through a `tokio::sync::watch` channel so callers can observe
//!   it without locking.
//! - [`OAuth2::abort`] cancels the grant that is currently waiting. The grant
//!   is closed, which aborts its background exchange task.
//! - Protocol failures are returned as [`AuthorizationOutcome::Failed`]; only
//!   local failures (settings, store, listener) are `Err`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use multicloud_core::config::OAuthConfig;
use multicloud_core::domain::{GrantType, OAuth2Settings, Token};
use multicloud_core::ports::{AuthorizationCallback, CredentialStore};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{AuthorizationError, OAuth2Error};
use crate::grant::{
    AuthorizationCodeGrant, DirectGrant, Grant, GrantContext, GrantFactory, GrantResult,
    ImplicitGrant,
};
use crate::listener::RedirectListener;
use crate::state::StateGenerator;

/// Where the engine is in the current grant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantPhase {
    Idle,
    /// Grant set up, waiting for the user or the redirect
    Authorizing,
    /// Waiting for the token endpoint
    Exchanging,
    /// The last grant settled with a token or an error
    Ready,
}

/// Result of a completed grant
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationOutcome {
    /// A token was obtained and stored under `store_key`
    Authorized { token: Token, store_key: String },
    /// The authorization server (or redirect validation) refused
    Failed(OAuth2Error),
}

impl AuthorizationOutcome {
    pub fn is_authorized(&self) -> bool {
        matches!(self, AuthorizationOutcome::Authorized { .. })
    }

    pub fn store_key(&self) -> Option<&str> {
        match self {
            AuthorizationOutcome::Authorized { store_key, .. } => Some(store_key),
            AuthorizationOutcome::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&OAuth2Error> {
        match self {
            AuthorizationOutcome::Failed(error) => Some(error),
            AuthorizationOutcome::Authorized { .. } => None,
        }
    }
}

/// Runs OAuth2 grants and stores their tokens
pub struct OAuth2 {
    ctx: GrantContext,
    store: Option<Arc<dyn CredentialStore>>,
    callback: Option<Arc<dyn AuthorizationCallback>>,
    extensions: HashMap<String, GrantFactory>,
    phase: watch::Sender<GrantPhase>,
    cancel: Mutex<CancellationToken>,
}

impl OAuth2 {
    /// Creates an engine sharing `listener` with every redirect-based grant
    pub fn new(config: &OAuthConfig, listener: Arc<RedirectListener>) -> Self {
        let (phase, _) = watch::channel(GrantPhase::Idle);
        Self {
            ctx: GrantContext {
                http: reqwest::Client::new(),
                listener,
                states: StateGenerator::from_config(config),
            },
            store: None,
            callback: None,
            extensions: HashMap::new(),
            phase,
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.ctx.http = http;
        self
    }

    pub fn with_store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_callback(mut self, callback: Arc<dyn AuthorizationCallback>) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Registers a custom grant selected by [`OAuth2Settings::extension_grant`]
    pub fn register_extension(&mut self, name: impl Into<String>, factory: GrantFactory) {
        self.extensions.insert(name.into(), factory);
    }

    pub fn listener(&self) -> &Arc<RedirectListener> {
        &self.ctx.listener
    }

    pub fn phase(&self) -> GrantPhase {
        *self.phase.borrow()
    }

    /// Receiver notified on every phase change
    pub fn subscribe(&self) -> watch::Receiver<GrantPhase> {
        self.phase.subscribe()
    }

    /// Interrupts the grant currently waiting for an answer
    pub fn abort(&self) {
        self.cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .cancel();
    }

    // ========================================================================
    // Public operations
    // ========================================================================

    /// Obtains a token with the grant selected by `settings`
    ///
    /// # Arguments
    ///
    /// * `settings` - Provider grant settings
    /// * `store_key` - Identifier to store the token under; a new one is
    ///   generated by the store when `None`
    ///
    /// # Errors
    ///
    /// Fails without contacting the provider when no store is configured or
    /// the settings are invalid.
    pub async fn authorize(
        &self,
        settings: &OAuth2Settings,
        store_key: Option<&str>,
    ) -> Result<AuthorizationOutcome, AuthorizationError> {
        let store = self.store.as_ref().ok_or(AuthorizationError::MissingStore)?;
        let grant = self.create_grant(settings)?;
        info!(grant = %settings.grant_type, "Starting authorization");

        match self.run(grant, settings).await? {
            Ok(token) => {
                let store_key = match store_key {
                    Some(key) => {
                        store.store_as(key, &token).await.map_err(AuthorizationError::Store)?;
                        key.to_string()
                    }
                    None => store.store(&token).await.map_err(AuthorizationError::Store)?,
                };
                info!(store_key = %store_key, "Authorization succeeded");
                Ok(AuthorizationOutcome::Authorized { token, store_key })
            }
            Err(error) => {
                warn!(kind = %error.kind, "Authorization failed");
                Ok(AuthorizationOutcome::Failed(error))
            }
        }
    }

    /// Refreshes the token stored under `store_key` in place
    ///
    /// Fields missing from the refresh response keep their stored values;
    /// the issue timestamp is always reset.
    ///
    /// # Errors
    ///
    /// Fails when no store is configured, nothing is stored under the key,
    /// or the stored token has no refresh token.
    pub async fn refresh(
        &self,
        settings: &OAuth2Settings,
        store_key: &str,
    ) -> Result<AuthorizationOutcome, AuthorizationError> {
        let store = self.store.as_ref().ok_or(AuthorizationError::MissingStore)?;
        let mut token = store
            .retrieve(store_key)
            .await
            .map_err(AuthorizationError::Store)?
            .ok_or_else(|| AuthorizationError::MissingToken(store_key.to_string()))?;
        if !token.can_refresh() {
            return Err(AuthorizationError::MissingRefreshToken(store_key.to_string()));
        }

        let mut refresh_settings = settings.clone();
        refresh_settings.refresh_token = token.refresh_token.clone();
        let grant = Box::new(DirectGrant::refresh(self.ctx.clone()));
        debug!(store_key = %store_key, "Refreshing token");

        match self.run(grant, &refresh_settings).await? {
            Ok(update) => {
                token.merge_refresh(&update);
                store
                    .store_as(store_key, &token)
                    .await
                    .map_err(AuthorizationError::Store)?;
                info!(store_key = %store_key, "Token refreshed");
                Ok(AuthorizationOutcome::Authorized {
                    token,
                    store_key: store_key.to_string(),
                })
            }
            Err(error) => {
                warn!(store_key = %store_key, kind = %error.kind, "Token refresh failed");
                Ok(AuthorizationOutcome::Failed(error))
            }
        }
    }

    // ========================================================================
    // Grant driving
    // ========================================================================

    fn create_grant(&self, settings: &OAuth2Settings) -> Result<Box<dyn Grant>, AuthorizationError> {
        let ctx = self.ctx.clone();
        Ok(match settings.grant_type {
            GrantType::AuthorizationCode => Box::new(AuthorizationCodeGrant::new(ctx)),
            GrantType::Implicit => Box::new(ImplicitGrant::new(ctx)),
            GrantType::ResourceOwnerPassword => Box::new(DirectGrant::password(ctx)),
            GrantType::ClientCredentials => Box::new(DirectGrant::client_credentials(ctx)),
            GrantType::Extension => {
                let name = settings.extension_grant.as_deref().ok_or_else(|| {
                    AuthorizationError::InvalidSettings("extension_grant is required".to_string())
                })?;
                let factory = self
                    .extensions
                    .get(name)
                    .ok_or_else(|| AuthorizationError::UnknownExtension(name.to_string()))?;
                factory(ctx)
            }
        })
    }

    fn set_phase(&self, phase: GrantPhase) {
        self.phase.send_replace(phase);
        debug!(?phase, "Grant phase changed");
    }

    /// Replaces the cancellation token so an earlier abort does not leak
    /// into this grant
    fn fresh_cancellation(&self) -> CancellationToken {
        let mut current = self.cancel.lock().unwrap_or_else(PoisonError::into_inner);
        *current = CancellationToken::new();
        current.clone()
    }

    async fn run(
        &self,
        mut grant: Box<dyn Grant>,
        settings: &OAuth2Settings,
    ) -> Result<GrantResult, AuthorizationError> {
        let cancel = self.fresh_cancellation();
        self.set_phase(GrantPhase::Authorizing);

        let prepared = match grant.setup(settings).await {
            Ok(()) => grant.authorize().await,
            Err(e) => Err(e),
        };
        let request = match prepared {
            Ok(request) => request,
            Err(e) => {
                grant.close().await;
                self.set_phase(GrantPhase::Idle);
                return Err(e);
            }
        };

        if request.is_action_required() {
            match &self.callback {
                Some(callback) => callback.on_authorization_request(&request),
                None => warn!("Authorization requires user action but no callback is set"),
            }
        }
        self.set_phase(GrantPhase::Exchanging);

        let result = tokio::select! {
            result = grant.outcome() => Some(result),
            _ = cancel.cancelled() => None,
        };
        grant.close().await;

        match result {
            Some(result) => {
                self.set_phase(GrantPhase::Ready);
                Ok(result)
            }
            None => {
                info!("Authorization aborted");
                self.set_phase(GrantPhase::Idle);
                Err(AuthorizationError::Aborted)
            }
        }
    }
}

impl std::fmt::Debug for OAuth2 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuth2")
            .field("ctx", &self.ctx)
            .field("extensions", &self.extensions.keys().collect::<Vec<_>>())
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}
