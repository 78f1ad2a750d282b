//! User accounts
//!
//! An account binds a user-chosen name to a provider and, once authorized,
//! to the identifier its token is stored under. Tokens themselves never
//! live in the account record.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// One provider account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub name: String,
    /// Provider identifier in the template source
    pub provider: String,
    /// Credential store key of the account's token
    #[serde(default)]
    pub token_id: Option<String>,
}

impl Account {
    pub fn new(name: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            provider: provider.into(),
            token_id: None,
        }
    }

    pub fn is_authorized(&self) -> bool {
        self.token_id.is_some()
    }
}

/// Accounts known to a client, keyed by name
#[derive(Debug, Default)]
pub struct AccountRegistry {
    accounts: DashMap<String, Account>,
}

impl AccountRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `account` unless the name is taken
    ///
    /// # Returns
    ///
    /// `false` when an account with the same name already exists
    pub fn insert(&self, account: Account) -> bool {
        match self.accounts.entry(account.name.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(account);
                true
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<Account> {
        self.accounts.get(name).map(|entry| entry.value().clone())
    }

    pub fn remove(&self, name: &str) -> Option<Account> {
        self.accounts.remove(name).map(|(_, account)| account)
    }

    /// Records the token identifier of an account; unknown names are ignored
    pub fn set_token_id(&self, name: &str, token_id: Option<String>) {
        if let Some(mut account) = self.accounts.get_mut(name) {
            account.token_id = token_id;
        }
    }

    /// Every account, sorted by name
    pub fn list(&self) -> Vec<Account> {
        let mut accounts: Vec<Account> = self
            .accounts
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        accounts.sort_by(|a, b| a.name.cmp(&b.name));
        accounts
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}
