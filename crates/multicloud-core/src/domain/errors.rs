//! Domain error types
//!
//! [`DomainError`] covers invalid arguments detected before any network
//! traffic. [`OperationError`] is the provider-reported failure value an
//! operation carries after a response with an error status.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while validating domain values
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// An argument that must be present was missing or empty
    #[error("Missing argument: {0}")]
    MissingArgument(String),

    /// A descriptor was expected to be a folder
    #[error("Not a folder: {0}")]
    NotAFolder(String),

    /// A descriptor was expected to be a file
    #[error("Not a file: {0}")]
    NotAFile(String),

    /// Chunk sizes must be strictly positive
    #[error("Invalid chunk size: {0}")]
    InvalidChunkSize(u64),

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

/// Provider-reported failure attached to an operation
///
/// Decoded from a structured `error` object in the response body, or
/// synthesized from the HTTP status line when the body has none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationError {
    /// Provider error code; `-1` when the body did not carry one
    #[serde(default = "OperationError::unknown_code")]
    pub code: i64,
    /// Human-readable message
    #[serde(default)]
    pub message: Option<String>,
}

impl OperationError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: Some(message.into()),
        }
    }

    fn unknown_code() -> i64 {
        -1
    }
}

impl std::fmt::Display for OperationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{} {}", self.code, message),
            None => write!(f, "{}", self.code),
        }
    }
}
