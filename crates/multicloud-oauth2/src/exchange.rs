//! Token endpoint exchange
//!
//! Every grant ends with the same step: a form-encoded POST to the token
//! endpoint whose JSON answer is either a token or an RFC 6749 error triple.
//! The implicit grant receives the same fields as redirect query parameters
//! and parses them through [`TokenResponse`] as well.

use std::collections::{BTreeMap, HashMap};

use multicloud_core::domain::{Token, TokenType};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{OAuth2Error, OAuth2ErrorKind};

/// Ordered form parameters of an authorize or token request
pub type Params = Vec<(String, String)>;

/// Appends `extra` parameters whose names are not already present
pub fn merge_extra(params: &mut Params, extra: &BTreeMap<String, String>) {
    for (key, value) in extra {
        if !params.iter().any(|(existing, _)| existing == key) {
            params.push((key.clone(), value.clone()));
        }
    }
}

/// Looks up a parameter by name
pub fn param<'a>(params: &'a Params, name: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}

// ============================================================================
// TokenResponse
// ============================================================================

/// Raw fields of a token endpoint answer
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TokenResponse {
    pub access_token: Option<String>,
    pub token_type: Option<String>,
    /// Number or numeric string, depending on the provider
    pub expires_in: Option<Value>,
    pub refresh_token: Option<String>,
    pub kid: Option<String>,
    pub mac_key: Option<String>,
    pub mac_algorithm: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
    pub error_uri: Option<String>,
}

impl TokenResponse {
    /// Reads the fields from redirect query parameters
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        let get = |name: &str| params.get(name).cloned();
        Self {
            access_token: get("access_token"),
            token_type: get("token_type"),
            expires_in: get("expires_in").map(Value::String),
            refresh_token: get("refresh_token"),
            kid: get("kid"),
            mac_key: get("mac_key"),
            mac_algorithm: get("mac_algorithm"),
            error: get("error"),
            error_description: get("error_description"),
            error_uri: get("error_uri"),
        }
    }

    /// Lifetime in seconds, when the provider sent a usable one
    fn lifetime(&self) -> Option<i64> {
        match self.expires_in.as_ref()? {
            Value::Number(number) => number.as_i64(),
            Value::String(text) => text.trim().parse().ok(),
            _ => None,
        }
    }

    /// Converts the answer into a token or the error it describes
    pub fn into_result(self) -> Result<Token, OAuth2Error> {
        if let Some(code) = self.error.as_deref() {
            let mut error = OAuth2Error::new(OAuth2ErrorKind::parse(code));
            error.description = self.error_description.clone();
            error.uri = self.error_uri.clone();
            return Err(error);
        }

        let expires_in = self.lifetime().filter(|seconds| *seconds >= 0);
        let access_token = self
            .access_token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| OAuth2Error::invalid_response("Response carries no access_token."))?;
        let token_type = self
            .token_type
            .as_deref()
            .map(TokenType::parse)
            .unwrap_or_default();

        let mut token = Token::new(access_token, token_type);
        token.expires_in = expires_in;
        token.refresh_token = self.refresh_token;
        token.key_id = self.kid;
        token.mac_key = self.mac_key;
        token.mac_algorithm = self.mac_algorithm;
        Ok(token)
    }
}

// ============================================================================
// Token request
// ============================================================================

/// POSTs `params` form-encoded to `token_uri` and parses the answer
///
/// # Errors
///
/// Transport failures and unparsable bodies are reported as
/// [`OAuth2ErrorKind::TransportFailure`] and [`OAuth2ErrorKind::InvalidResponse`];
/// an `error` field in the body is reported with its own kind.
pub async fn request_token(
    http: &reqwest::Client,
    token_uri: &str,
    params: &Params,
) -> Result<Token, OAuth2Error> {
    debug!(uri = %token_uri, grant = ?param(params, "grant_type"), "Requesting token");

    let response = http
        .post(token_uri)
        .form(params)
        .send()
        .await
        .map_err(OAuth2Error::transport)?;
    let status = response.status();
    let body = response.bytes().await.map_err(OAuth2Error::transport)?;

    let parsed: TokenResponse = serde_json::from_slice(&body).map_err(|e| {
        warn!(status = status.as_u16(), "Token endpoint returned a non-JSON body");
        OAuth2Error::invalid_response(format!("HTTP {}: {}", status.as_u16(), e))
    })?;

    let result = parsed.into_result();
    match &result {
        Ok(_) => debug!(status = status.as_u16(), "Token received"),
        Err(error) => warn!(status = status.as_u16(), kind = %error.kind, "Token request rejected"),
    }
    result
}
