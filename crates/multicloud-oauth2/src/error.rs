//! OAuth2 error types
//!
//! Two families of failure are kept apart:
//!
//! - [`OAuth2Error`] is a protocol outcome. The authorization server (or the
//!   redirect validation in front of it) said no. It is returned as a value
//!   inside an `AuthorizationOutcome`, never raised.
//! - [`AuthorizationError`] means the grant could not be run at all: bad
//!   settings, no credential store, a listener that failed to bind.

use std::fmt;

use thiserror::Error;

// ============================================================================
// OAuth2ErrorKind
// ============================================================================

/// Error codes defined by RFC 6749 plus the local redirect-validation kinds
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OAuth2ErrorKind {
    InvalidRequest,
    UnauthorizedClient,
    AccessDenied,
    UnsupportedResponseType,
    InvalidScope,
    ServerError,
    TemporarilyUnavailable,
    InvalidClient,
    InvalidGrant,
    UnsupportedGrantType,
    /// The redirect carried no `state` parameter
    StateMissing,
    /// The redirect `state` differs from the one sent
    StateMismatch,
    /// The redirect carried neither a code nor an error
    CodeMissing,
    /// The token endpoint could not be reached
    TransportFailure,
    /// The token endpoint answered with something that is not a token
    InvalidResponse,
    /// The grant was interrupted before an answer arrived
    Aborted,
    /// An error code outside the RFC taxonomy
    Unknown(String),
}

impl OAuth2ErrorKind {
    /// Parses the `error` parameter of a token or redirect response
    pub fn parse(code: &str) -> Self {
        match code.to_ascii_lowercase().as_str() {
            "invalid_request" => Self::InvalidRequest,
            "unauthorized_client" => Self::UnauthorizedClient,
            "access_denied" => Self::AccessDenied,
            "unsupported_response_type" => Self::UnsupportedResponseType,
            "invalid_scope" => Self::InvalidScope,
            "server_error" => Self::ServerError,
            "temporarily_unavailable" => Self::TemporarilyUnavailable,
            "invalid_client" => Self::InvalidClient,
            "invalid_grant" => Self::InvalidGrant,
            "unsupported_grant_type" => Self::UnsupportedGrantType,
            "state_missing" => Self::StateMissing,
            "state_mismatch" => Self::StateMismatch,
            "code_missing" => Self::CodeMissing,
            _ => Self::Unknown(code.to_string()),
        }
    }

    /// Wire form of the code
    pub fn as_str(&self) -> &str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::UnauthorizedClient => "unauthorized_client",
            Self::AccessDenied => "access_denied",
            Self::UnsupportedResponseType => "unsupported_response_type",
            Self::InvalidScope => "invalid_scope",
            Self::ServerError => "server_error",
            Self::TemporarilyUnavailable => "temporarily_unavailable",
            Self::InvalidClient => "invalid_client",
            Self::InvalidGrant => "invalid_grant",
            Self::UnsupportedGrantType => "unsupported_grant_type",
            Self::StateMissing => "state_missing",
            Self::StateMismatch => "state_mismatch",
            Self::CodeMissing => "code_missing",
            Self::TransportFailure => "transport_failure",
            Self::InvalidResponse => "invalid_response",
            Self::Aborted => "aborted",
            Self::Unknown(code) => code,
        }
    }
}

impl fmt::Display for OAuth2ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// OAuth2Error
// ============================================================================

/// A protocol-level authorization failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("OAuth2 error '{kind}': {}", .description.as_deref().unwrap_or("no description"))]
pub struct OAuth2Error {
    pub kind: OAuth2ErrorKind,
    /// Human-readable text from `error_description`
    pub description: Option<String>,
    /// Documentation link from `error_uri`
    pub uri: Option<String>,
}

impl OAuth2Error {
    pub fn new(kind: OAuth2ErrorKind) -> Self {
        Self {
            kind,
            description: None,
            uri: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    pub(crate) fn transport(reason: impl fmt::Display) -> Self {
        Self::new(OAuth2ErrorKind::TransportFailure).with_description(reason.to_string())
    }

    pub(crate) fn invalid_response(reason: impl Into<String>) -> Self {
        Self::new(OAuth2ErrorKind::InvalidResponse).with_description(reason)
    }
}

// ============================================================================
// AuthorizationError
// ============================================================================

/// Errors that prevent a grant from running
#[derive(Debug, Error)]
pub enum AuthorizationError {
    /// Grant settings failed validation; nothing was sent
    #[error("Invalid OAuth2 settings: {0}")]
    InvalidSettings(String),

    /// The engine has no credential store to put the token in
    #[error("No credential store configured")]
    MissingStore,

    /// No token is stored under the given identifier
    #[error("No token stored under '{0}'")]
    MissingToken(String),

    /// The stored token carries no refresh token
    #[error("Token '{0}' cannot be refreshed")]
    MissingRefreshToken(String),

    /// The credential store failed
    #[error("Credential store failure: {0}")]
    Store(anyhow::Error),

    /// The redirect listener could not be started
    #[error("Redirect listener failure: {0}")]
    Listener(#[from] std::io::Error),

    /// No factory is registered for the named extension grant
    #[error("Unknown extension grant '{0}'")]
    UnknownExtension(String),

    /// The grant was aborted before completing
    #[error("Authorization aborted")]
    Aborted,
}
