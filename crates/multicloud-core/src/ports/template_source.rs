//! Template source port
//!
//! Supplies the request templates and OAuth2 settings of each provider.
//! Templates are loaded once and read-only afterwards, so the port is
//! synchronous.

use std::collections::HashMap;

use anyhow::Context;

use crate::domain::{OAuth2Settings, OperationKind, ProviderTemplates, RequestTemplate};

/// Read-only access to provider templates
pub trait TemplateSource: Send + Sync {
    /// Identifiers of every known provider
    fn providers(&self) -> Vec<String>;

    /// The whole template set of a provider
    fn provider(&self, provider: &str) -> anyhow::Result<Option<ProviderTemplates>>;

    /// Template for one logical operation of a provider
    fn template(&self, provider: &str, kind: OperationKind) -> anyhow::Result<Option<RequestTemplate>> {
        Ok(self
            .provider(provider)?
            .and_then(|templates| templates.template(kind).cloned()))
    }

    /// OAuth2 settings of a provider
    fn oauth_settings(&self, provider: &str) -> anyhow::Result<Option<OAuth2Settings>> {
        Ok(self.provider(provider)?.and_then(|templates| templates.oauth))
    }
}

/// In-memory [`TemplateSource`] keyed by provider identifier
#[derive(Debug, Clone, Default)]
pub struct MemoryTemplateSource {
    providers: HashMap<String, ProviderTemplates>,
}

impl MemoryTemplateSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a provider, replacing any previous set with the same id
    pub fn insert(&mut self, templates: ProviderTemplates) {
        self.providers
            .insert(templates.provider_id.clone(), templates);
    }

    /// Builder-style variant of [`Self::insert`]
    pub fn with_provider(mut self, templates: ProviderTemplates) -> Self {
        self.insert(templates);
        self
    }

    /// Parses one provider template set from JSON and registers it
    pub fn insert_json(&mut self, json: &str) -> anyhow::Result<String> {
        let templates: ProviderTemplates =
            serde_json::from_str(json).context("Failed to parse provider templates")?;
        if templates.provider_id.is_empty() {
            anyhow::bail!("Provider templates must declare a providerId");
        }
        let id = templates.provider_id.clone();
        self.insert(templates);
        Ok(id)
    }
}

impl TemplateSource for MemoryTemplateSource {
    fn providers(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.providers.keys().cloned().collect();
        ids.sort();
        ids
    }

    fn provider(&self, provider: &str) -> anyhow::Result<Option<ProviderTemplates>> {
        Ok(self.providers.get(provider).cloned())
    }
}
