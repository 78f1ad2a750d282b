//! Grants that talk to the token endpoint only
//!
//! Client credentials (section 4.4), resource owner password (section 4.3)
//! and refresh (section 6) differ only in the parameters they post. None of
//! them needs the user or the redirect listener; the exchange is started as a
//! background task by `authorize` and awaited by `outcome`.

use multicloud_core::domain::OAuth2Settings;
use multicloud_core::ports::AuthorizationRequest;
use tokio::task::JoinHandle;
use tracing::debug;

use super::{optional, required, Grant, GrantContext, GrantResult};
use crate::error::{AuthorizationError, OAuth2Error, OAuth2ErrorKind};
use crate::exchange::{merge_extra, request_token, Params};

/// Which token-endpoint grant to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectKind {
    ClientCredentials,
    Password,
    Refresh,
}

impl DirectKind {
    fn grant_type(self) -> &'static str {
        match self {
            DirectKind::ClientCredentials => "client_credentials",
            DirectKind::Password => "password",
            DirectKind::Refresh => "refresh_token",
        }
    }
}

/// Token-endpoint-only grant
pub struct DirectGrant {
    ctx: GrantContext,
    kind: DirectKind,
    request: Option<(String, Params)>,
    exchange: Option<JoinHandle<GrantResult>>,
}

impl DirectGrant {
    pub fn new(ctx: GrantContext, kind: DirectKind) -> Self {
        Self {
            ctx,
            kind,
            request: None,
            exchange: None,
        }
    }

    pub fn client_credentials(ctx: GrantContext) -> Self {
        Self::new(ctx, DirectKind::ClientCredentials)
    }

    pub fn password(ctx: GrantContext) -> Self {
        Self::new(ctx, DirectKind::Password)
    }

    pub fn refresh(ctx: GrantContext) -> Self {
        Self::new(ctx, DirectKind::Refresh)
    }

    pub fn kind(&self) -> DirectKind {
        self.kind
    }

    /// Form parameters that will be posted, once set up
    pub fn params(&self) -> Option<&Params> {
        self.request.as_ref().map(|(_, params)| params)
    }
}

#[async_trait::async_trait]
impl Grant for DirectGrant {
    async fn setup(&mut self, settings: &OAuth2Settings) -> Result<(), AuthorizationError> {
        let token_uri = required(&settings.token_uri, "token_uri")?.to_string();

        let mut params: Params = vec![("grant_type".into(), self.kind.grant_type().into())];
        match self.kind {
            DirectKind::ClientCredentials => {}
            DirectKind::Password => {
                let username = required(&settings.username, "username")?;
                let password = required(&settings.password, "password")?;
                params.push(("username".into(), username.to_string()));
                params.push(("password".into(), password.to_string()));
            }
            DirectKind::Refresh => {
                let refresh_token = required(&settings.refresh_token, "refresh_token")?;
                params.push(("refresh_token".into(), refresh_token.to_string()));
            }
        }
        if let Some(client_id) = optional(&settings.client_id) {
            params.push(("client_id".into(), client_id.to_string()));
        }
        if let Some(secret) = optional(&settings.client_secret) {
            params.push(("client_secret".into(), secret.to_string()));
        }
        if let Some(scope) = optional(&settings.scope) {
            params.push(("scope".into(), scope.to_string()));
        }
        merge_extra(&mut params, &settings.extra_token_params);

        self.request = Some((token_uri, params));
        Ok(())
    }

    async fn authorize(&mut self) -> Result<AuthorizationRequest, AuthorizationError> {
        let (token_uri, params) = self.request.clone().ok_or_else(|| {
            AuthorizationError::InvalidSettings("grant was not set up".to_string())
        })?;

        let http = self.ctx.http.clone();
        debug!(grant = self.kind.grant_type(), "Starting token request");
        self.exchange = Some(tokio::spawn(async move {
            request_token(&http, &token_uri, &params).await
        }));
        Ok(AuthorizationRequest::none())
    }

    async fn outcome(&mut self) -> GrantResult {
        let Some(exchange) = self.exchange.take() else {
            return Err(OAuth2Error::new(OAuth2ErrorKind::Aborted)
                .with_description("Grant was not authorized."));
        };
        exchange.await.unwrap_or_else(|e| {
            Err(OAuth2Error::new(OAuth2ErrorKind::Aborted)
                .with_description(format!("Token request did not complete: {}", e)))
        })
    }

    async fn close(&mut self) {
        if let Some(exchange) = self.exchange.take() {
            exchange.abort();
        }
    }
}
