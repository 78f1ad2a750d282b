//! OAuth2 access tokens
//!
//! A [`Token`] is long-lived: it is created by a successful grant, mutated in
//! place by a refresh and deleted together with the account it belongs to.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Token types understood by the request builder
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TokenType {
    /// No scheme; the raw access token is sent as-is
    #[default]
    Empty,
    Bearer,
    Mac,
}

impl TokenType {
    /// Parses the `token_type` field of a token response, ignoring case
    ///
    /// Unknown or missing values yield [`TokenType::Empty`].
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "bearer" => TokenType::Bearer,
            "mac" => TokenType::Mac,
            _ => TokenType::Empty,
        }
    }
}

/// An OAuth2 access token with optional refresh and MAC material
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Token {
    pub access_token: String,
    pub token_type: TokenType,
    pub refresh_token: Option<String>,
    /// Lifetime in seconds; `None` means the provider did not say
    pub expires_in: Option<i64>,
    pub key_id: Option<String>,
    pub mac_key: Option<String>,
    pub mac_algorithm: Option<String>,
    /// Unix timestamp (seconds) at which the token was issued
    pub issued_at: i64,
}

impl Token {
    /// Creates a token issued now
    pub fn new(access_token: impl Into<String>, token_type: TokenType) -> Self {
        Self {
            access_token: access_token.into(),
            token_type,
            issued_at: Utc::now().timestamp(),
            ..Self::default()
        }
    }

    /// Creates a bearer token issued now
    pub fn bearer(access_token: impl Into<String>) -> Self {
        Self::new(access_token, TokenType::Bearer)
    }

    /// Builder-style setter for the lifetime in seconds
    pub fn with_expires_in(mut self, seconds: i64) -> Self {
        self.expires_in = Some(seconds);
        self
    }

    /// Builder-style setter for the refresh token
    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    /// Whether the token has outlived its declared lifetime
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now().timestamp())
    }

    /// Expiry check against an explicit clock reading
    ///
    /// Tokens without a declared lifetime never expire.
    pub fn is_expired_at(&self, now: i64) -> bool {
        match self.expires_in {
            Some(expires_in) => now - self.issued_at > expires_in,
            None => false,
        }
    }

    /// Whether a refresh grant can be attempted for this token
    pub fn can_refresh(&self) -> bool {
        self.refresh_token
            .as_deref()
            .is_some_and(|refresh| !refresh.is_empty())
    }

    /// Value of the `Authorization` header for this token
    pub fn authorization_header(&self) -> String {
        match self.token_type {
            TokenType::Bearer => format!("Bearer {}", self.access_token),
            TokenType::Mac => match &self.key_id {
                Some(kid) => format!("MAC id=\"{}\", kid=\"{}\"", self.access_token, kid),
                None => format!("MAC id=\"{}\"", self.access_token),
            },
            TokenType::Empty => self.access_token.clone(),
        }
    }

    /// Applies the fields of a refresh response to this token
    ///
    /// The token type is always replaced. Other fields are replaced only when
    /// the update carries a non-empty value; the lifetime only when present.
    /// The issue timestamp is reset to now.
    pub fn merge_refresh(&mut self, update: &Token) {
        self.token_type = update.token_type;
        if !update.access_token.is_empty() {
            self.access_token = update.access_token.clone();
        }
        merge_non_empty(&mut self.refresh_token, &update.refresh_token);
        merge_non_empty(&mut self.key_id, &update.key_id);
        merge_non_empty(&mut self.mac_key, &update.mac_key);
        merge_non_empty(&mut self.mac_algorithm, &update.mac_algorithm);
        if let Some(expires_in) = update.expires_in {
            self.expires_in = Some(expires_in);
        }
        self.issued_at = Utc::now().timestamp();
    }
}

fn merge_non_empty(target: &mut Option<String>, update: &Option<String>) {
    if let Some(value) = update.as_deref().filter(|value| !value.is_empty()) {
        *target = Some(value.to_string());
    }
}
