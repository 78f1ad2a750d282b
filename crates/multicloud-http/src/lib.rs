//! MultiCloud HTTP - Template-driven provider operations
//!
//! Provides the provider-agnostic request/response machinery:
//! - Placeholder substitution into request templates
//! - Field-merge normalization of heterogeneous JSON responses
//! - A three-phase operation runner (begin → execute → finish)
//! - Concrete file-system operations and chunked transfers
//!
//! ## Modules
//!
//! - [`mapping`] - Property mapper (`<name>` placeholder substitution)
//! - [`normalize`] - Response normalizer and error extraction
//! - [`client`] - Builds and dispatches requests from templates
//! - [`operation`] - Operation runner and per-phase handler trait
//! - [`ops`] - Account, folder and item operations
//! - [`download`] - Multi-source chunked download
//! - [`upload`] - Session-based chunked upload

pub mod client;
pub mod download;
pub mod mapping;
pub mod normalize;
pub mod operation;
pub mod ops;
pub mod upload;

use multicloud_core::domain::{DomainError, OperationKind};
use thiserror::Error;

pub use client::CloudClient;
pub use mapping::PropertyMapping;
pub use normalize::ResponseNormalizer;
pub use operation::{Operation, OperationHandler, OperationOutcome, OperationPhase, OperationState};

/// Errors raised by operations before or while talking to a provider
///
/// Provider-reported failures (HTTP status ≥ 400) are not errors of this
/// type; they are recorded on the operation as an `OperationError`.
#[derive(Debug, Error)]
pub enum MultiCloudError {
    /// An argument failed validation before any request was sent
    #[error("Invalid argument: {0}")]
    Validation(#[from] DomainError),

    /// A network-level error occurred
    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Local file I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A request could not be built from its template
    #[error("Invalid request: {0}")]
    Request(String),

    /// The operation was aborted before completing
    #[error("Operation aborted")]
    Aborted,

    /// `execute` was called on an operation that already ran
    #[error("Operation already executed")]
    AlreadyExecuted,

    /// A transfer request got a response it cannot use
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Some byte ranges of a download were never written
    #[error("Download incomplete: {remaining} chunk(s) not transferred ({reason})")]
    Download {
        /// Chunks left in the queue after every worker exited
        remaining: usize,
        /// Last failure reported by a worker
        reason: String,
    },

    /// The provider has no template for the requested operation
    #[error("Missing request template for {0}")]
    MissingTemplate(OperationKind),
}

/// Result alias for operation code
pub type Result<T> = std::result::Result<T, MultiCloudError>;
