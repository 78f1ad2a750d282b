//! MultiCloud OAuth2 - Grant state machine and redirect listener
//!
//! Obtains and refreshes provider tokens:
//! - Authorization code, implicit, client credentials, resource owner
//!   password, refresh and registered extension grants
//! - CSRF `state` generation and validation
//! - A local redirect listener shared by every redirect-based grant
//! - Token persistence through the `CredentialStore` port
//!
//! ## Modules
//!
//! - [`engine`] - [`OAuth2`], the grant dispatcher and token store glue
//! - [`grant`] - Grant strategies and the [`Grant`](grant::Grant) trait
//! - [`exchange`] - Token endpoint request and response parsing
//! - [`listener`] - [`RedirectListener`] and the pages it renders
//! - [`state`] - [`StateGenerator`]
//! - [`browser`] - [`BrowserCallback`]
//! - [`error`] - Protocol and local error types

pub mod browser;
pub mod engine;
pub mod error;
pub mod exchange;
pub mod grant;
pub mod listener;
pub mod state;

pub use browser::BrowserCallback;
pub use engine::{AuthorizationOutcome, GrantPhase, OAuth2};
pub use error::{AuthorizationError, OAuth2Error, OAuth2ErrorKind};
pub use grant::{Grant, GrantContext, GrantFactory};
pub use listener::{RedirectHandler, RedirectListener, WebPage};
pub use state::StateGenerator;
