//! OAuth2 grant settings
//!
//! One [`OAuth2Settings`] value describes how to obtain a token from one
//! provider. Settings are loaded with the provider templates and copied into
//! a grant before each authorization, so grants never mutate shared config.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Supported grant strategies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    #[default]
    AuthorizationCode,
    Implicit,
    ResourceOwnerPassword,
    ClientCredentials,
    /// Custom grant registered with the OAuth2 engine under
    /// [`OAuth2Settings::extension_grant`]
    Extension,
}

impl std::fmt::Display for GrantType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            GrantType::AuthorizationCode => "authorization_code",
            GrantType::Implicit => "implicit",
            GrantType::ResourceOwnerPassword => "password",
            GrantType::ClientCredentials => "client_credentials",
            GrantType::Extension => "extension",
        };
        write!(f, "{}", s)
    }
}

/// Provider-specific OAuth2 configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OAuth2Settings {
    pub grant_type: GrantType,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub authorize_uri: Option<String>,
    pub token_uri: Option<String>,
    /// Redirect URI; when absent the local redirect listener's URI is used
    pub redirect_uri: Option<String>,
    pub scope: Option<String>,
    /// Additional authorize-endpoint parameters; never override built-in ones
    pub extra_authorize_params: BTreeMap<String, String>,
    /// Additional token-endpoint parameters; never override built-in ones
    pub extra_token_params: BTreeMap<String, String>,
    /// Resource-owner grant credentials
    pub username: Option<String>,
    pub password: Option<String>,
    /// Refresh token used by the refresh grant
    pub refresh_token: Option<String>,
    /// Name of a custom grant registered with the OAuth2 engine
    pub extension_grant: Option<String>,
}

impl OAuth2Settings {
    pub fn new(grant_type: GrantType) -> Self {
        Self {
            grant_type,
            ..Self::default()
        }
    }

    pub fn add_extra_authorize_param(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.extra_authorize_params.insert(key.into(), value.into());
    }

    pub fn add_extra_token_param(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.extra_token_params.insert(key.into(), value.into());
    }
}
