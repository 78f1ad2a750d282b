//! Shared helpers for provider integration tests

use multicloud_core::domain::{HttpVerb, RequestTemplate, Token};
use multicloud_http::CloudClient;
use wiremock::MockServer;

pub const ACCESS_TOKEN: &str = "test-access-token";

/// Starts an empty mock provider
pub async fn start_provider() -> MockServer {
    MockServer::start().await
}

/// Template addressing `path` on the mock provider
pub fn template(server: &MockServer, verb: HttpVerb, path: &str) -> RequestTemplate {
    RequestTemplate::new(verb, format!("{}{}", server.uri(), path))
}

pub fn token() -> Token {
    Token::bearer(ACCESS_TOKEN)
}

pub fn client() -> CloudClient {
    CloudClient::new(token())
}

/// Deterministic test payload of `len` bytes
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
