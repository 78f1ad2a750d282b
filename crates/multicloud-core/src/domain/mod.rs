//! Domain entities and value types
//!
//! This module contains the provider-agnostic types every engine speaks:
//! - File and folder descriptors with missing-field inference
//! - Account identity and quota values
//! - OAuth2 tokens and grant settings
//! - Request templates and provider template sets
//! - Transfer chunks and upload sessions
//! - Domain-specific error types

pub mod account;
pub mod errors;
pub mod file;
pub mod oauth;
pub mod template;
pub mod token;
pub mod transfer;

// Re-export commonly used types
pub use account::{AccountInfo, AccountQuota};
pub use errors::{DomainError, OperationError};
pub use file::{FileDescriptor, FileKind, ParentRef, FOLDER_MIME_TYPES};
pub use oauth::{GrantType, OAuth2Settings};
pub use template::{HttpVerb, OperationKind, ProviderTemplates, RequestBody, RequestTemplate};
pub use token::{Token, TokenType};
pub use transfer::{partition, DataChunk, UploadSession};
