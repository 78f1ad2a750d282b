//! MultiCloud - Multi-provider cloud storage client
//!
//! Manages named accounts on template-described storage providers,
//! authorizes them through OAuth2 and runs file operations against them.
//!
//! ## Modules
//!
//! - [`client`] - [`MultiCloud`], the entry point
//! - [`account`] - Account records and the in-memory registry
//! - [`error`] - [`FacadeError`]
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use multicloud::{BrowserCallback, MultiCloud};
//! use multicloud_core::config::Config;
//! use multicloud_core::ports::{MemoryCredentialStore, MemoryTemplateSource};
//!
//! # async fn run(templates: MemoryTemplateSource) -> anyhow::Result<()> {
//! let cloud = MultiCloud::new(
//!     Arc::new(templates),
//!     Arc::new(MemoryCredentialStore::new()),
//!     Config::default(),
//! )?
//! .with_callback(Arc::new(BrowserCallback::new()));
//!
//! cloud.add_account("work", "dropbox")?;
//! cloud.authorize_account("work").await?;
//! let root = cloud.root_folder("work")?;
//! let listing = cloud.list_folder("work", &root, false).await?;
//! # Ok(())
//! # }
//! ```

pub mod account;
pub mod client;
pub mod error;

pub use account::{Account, AccountRegistry};
pub use client::MultiCloud;
pub use error::{FacadeError, Result};

pub use multicloud_http::{MultiCloudError, OperationOutcome, OperationState};
pub use multicloud_oauth2::{AuthorizationOutcome, BrowserCallback, OAuth2Error};
