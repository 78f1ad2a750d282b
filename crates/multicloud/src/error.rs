//! Facade error type

use multicloud_core::domain::{DomainError, OperationKind};
use multicloud_http::MultiCloudError;
use multicloud_oauth2::{AuthorizationError, OAuth2Error};
use thiserror::Error;

/// Errors raised by [`MultiCloud`](crate::MultiCloud) calls
///
/// Validation variants are raised before any network traffic. Provider
/// errors are not raised; they are carried by the returned outcome.
#[derive(Debug, Error)]
pub enum FacadeError {
    #[error("No account named '{0}'")]
    NoAccount(String),

    #[error("Account name must not be empty")]
    EmptyName,

    #[error("Account '{0}' already exists")]
    AccountExists(String),

    #[error("Unknown provider '{0}'")]
    UnknownProvider(String),

    /// The account has no usable token
    #[error("Account '{0}' is not authorized")]
    NotAuthorized(String),

    /// An argument failed validation, e.g. a file given where a folder is
    /// required
    #[error("Invalid argument: {0}")]
    Validation(#[from] DomainError),

    /// Another foreground operation holds the client
    #[error("Another operation is already in progress")]
    OperationInProgress,

    #[error("Provider '{provider}' has no {kind} template")]
    MissingTemplate { provider: String, kind: OperationKind },

    #[error("A download needs at least one source")]
    NoSources,

    #[error("Provider '{0}' has no OAuth2 settings")]
    MissingOAuthSettings(String),

    /// An expired token could not be refreshed
    #[error("Token refresh failed: {0}")]
    Refresh(#[source] OAuth2Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The template source or credential store failed
    #[error("Storage failure: {0}")]
    Storage(anyhow::Error),

    #[error(transparent)]
    Operation(#[from] MultiCloudError),

    #[error(transparent)]
    Authorization(#[from] AuthorizationError),
}

/// Result alias for facade calls
pub type Result<T> = std::result::Result<T, FacadeError>;
