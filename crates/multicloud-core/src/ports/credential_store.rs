//! Credential store port
//!
//! Stores OAuth2 tokens under opaque string identifiers. Accounts keep only
//! the identifier, so a token can be refreshed in place without touching the
//! account record.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because storage errors are adapter-specific
//!   (keyring, encrypted file, database).
//! - [`MemoryCredentialStore`] is the in-process adapter used by tests and
//!   by applications that persist tokens themselves.

use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

use crate::domain::Token;

/// Persistent token storage
#[async_trait::async_trait]
pub trait CredentialStore: Send + Sync {
    /// Stores a token under a newly generated identifier
    ///
    /// # Returns
    ///
    /// The identifier the token can be retrieved with
    async fn store(&self, token: &Token) -> anyhow::Result<String>;

    /// Stores (or replaces) a token under a caller-chosen identifier
    async fn store_as(&self, id: &str, token: &Token) -> anyhow::Result<()>;

    /// Retrieves the token stored under `id`
    async fn retrieve(&self, id: &str) -> anyhow::Result<Option<Token>>;

    /// Removes the token stored under `id`; missing identifiers are not an error
    async fn delete(&self, id: &str) -> anyhow::Result<()>;

    /// Lists every identifier currently stored
    async fn identifiers(&self) -> anyhow::Result<Vec<String>>;
}

/// In-memory [`CredentialStore`] backed by a concurrent map
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    tokens: DashMap<String, Token>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored tokens
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[async_trait::async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn store(&self, token: &Token) -> anyhow::Result<String> {
        let id = Uuid::new_v4().to_string();
        self.tokens.insert(id.clone(), token.clone());
        debug!(id = %id, "Stored token under new identifier");
        Ok(id)
    }

    async fn store_as(&self, id: &str, token: &Token) -> anyhow::Result<()> {
        self.tokens.insert(id.to_string(), token.clone());
        debug!(id = %id, "Stored token");
        Ok(())
    }

    async fn retrieve(&self, id: &str) -> anyhow::Result<Option<Token>> {
        Ok(self.tokens.get(id).map(|entry| entry.value().clone()))
    }

    async fn delete(&self, id: &str) -> anyhow::Result<()> {
        self.tokens.remove(id);
        Ok(())
    }

    async fn identifiers(&self) -> anyhow::Result<Vec<String>> {
        let mut ids: Vec<String> = self.tokens.iter().map(|entry| entry.key().clone()).collect();
        ids.sort();
        Ok(ids)
    }
}
