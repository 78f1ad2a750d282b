//! Template-driven HTTP client
//!
//! Turns a [`RequestTemplate`] plus a [`PropertyMapping`] into a ready
//! `reqwest` request: placeholders substituted into the URI, headers, query
//! parameters and literal bodies, and the access token injected either as the
//! `Authorization` header or as the template's token query parameter.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use multicloud_core::domain::{HttpVerb, RequestTemplate, Token};
//! use multicloud_http::{CloudClient, PropertyMapping};
//!
//! # async fn example() -> Result<(), multicloud_http::MultiCloudError> {
//! let client = CloudClient::new(Token::bearer("access-token-here"));
//! let template = RequestTemplate::new(HttpVerb::Get, "https://api.example.com/files/<id>");
//! let mapping = PropertyMapping::new().with("id", "42");
//! let response = client.prepare(&template, &mapping)?.send().await?;
//! println!("status: {}", response.status());
//! # Ok(())
//! # }
//! ```

use multicloud_core::domain::{RequestTemplate, Token};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder};
use tracing::debug;
use url::Url;

use crate::mapping::PropertyMapping;
use crate::{MultiCloudError, Result};

/// HTTP client bound to one account token
#[derive(Debug, Clone)]
pub struct CloudClient {
    /// The underlying HTTP client
    client: Client,
    /// Token injected into every request
    token: Token,
}

impl CloudClient {
    /// Creates a client with a fresh `reqwest::Client`
    ///
    /// # Arguments
    /// * `token` - The account's access token
    pub fn new(token: Token) -> Self {
        Self::with_client(Client::new(), token)
    }

    /// Creates a client sharing an existing `reqwest::Client` (connection pool)
    ///
    /// # Arguments
    /// * `client` - The HTTP client to reuse
    /// * `token` - The account's access token
    pub fn with_client(client: Client, token: Token) -> Self {
        Self { client, token }
    }

    /// Returns the underlying HTTP client
    pub fn http(&self) -> &Client {
        &self.client
    }

    /// Returns the token injected into requests
    pub fn token(&self) -> &Token {
        &self.token
    }

    /// Replaces the token (e.g., after a refresh)
    pub fn set_token(&mut self, token: Token) {
        self.token = token;
        debug!("Updated CloudClient token");
    }

    /// Builds an authenticated request from a template
    ///
    /// Literal text and JSON bodies are rendered and attached; a streamed-data
    /// body is left for the caller to attach.
    ///
    /// # Arguments
    /// * `template` - The provider request template
    /// * `mapping` - Placeholder values for this call
    ///
    /// # Errors
    /// Returns [`MultiCloudError::Request`] when the substituted URI is not a
    /// valid absolute URL.
    pub fn prepare(&self, template: &RequestTemplate, mapping: &PropertyMapping) -> Result<RequestBuilder> {
        let uri = mapping.apply(&template.uri);
        let mut url = Url::parse(&uri)
            .map_err(|e| MultiCloudError::Request(format!("invalid URI '{}': {}", uri, e)))?;

        let token_param = template.token_param();
        if !template.params.is_empty() || token_param.is_some() {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in &template.params {
                pairs.append_pair(name, &mapping.apply(value));
            }
            if let Some(name) = token_param {
                pairs.append_pair(name, &self.token.access_token);
            }
        }

        let method = Method::from_bytes(template.method.as_str().as_bytes())
            .map_err(|e| MultiCloudError::Request(format!("invalid method: {}", e)))?;

        debug!(method = %template.method, uri = %redact(&url, token_param), "Preparing provider request");

        let mut request = self.client.request(method, url);
        if token_param.is_none() {
            request = request.header(AUTHORIZATION, self.token.authorization_header());
        }
        for (name, value) in &template.headers {
            request = request.header(name.as_str(), mapping.apply(value));
        }

        if let Some((body, is_json)) = template.body.as_ref().and_then(|b| mapping.render_body(b)) {
            let has_content_type = template
                .headers
                .keys()
                .any(|name| name.eq_ignore_ascii_case(CONTENT_TYPE.as_str()));
            if is_json && !has_content_type {
                request = request.header(CONTENT_TYPE, "application/json");
            }
            request = request.body(body);
        }

        Ok(request)
    }
}

/// URL for logging with the token query parameter masked
fn redact(url: &Url, token_param: Option<&str>) -> String {
    let Some(name) = token_param else {
        return url.to_string();
    };
    let mut masked = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let value = if k == name { "***".to_string() } else { v.into_owned() };
            (k.into_owned(), value)
        })
        .collect();
    masked.query_pairs_mut().clear().extend_pairs(pairs);
    masked.to_string()
}
