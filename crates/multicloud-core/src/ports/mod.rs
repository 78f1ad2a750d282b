//! Port definitions
//!
//! The traits the engines depend on but whose real implementations live
//! outside this workspace (a keyring, a configuration service, a UI).
//!
//! ## Ports Overview
//!
//! - [`CredentialStore`] - Persistent token storage keyed by opaque identifiers
//! - [`TemplateSource`] - Per-provider request templates and OAuth2 settings
//! - [`ProgressListener`] - Transfer progress sink, throttled by [`ProgressTracker`]
//! - [`AuthorizationCallback`] - Surfaces an authorization URL to the end user

pub mod authorization;
pub mod credential_store;
pub mod progress;
pub mod template_source;

pub use authorization::{AuthorizationCallback, AuthorizationRequest};
pub use credential_store::{CredentialStore, MemoryCredentialStore};
pub use progress::{ProgressListener, ProgressTracker, DEFAULT_REFRESH_INTERVAL};
pub use template_source::{MemoryTemplateSource, TemplateSource};
