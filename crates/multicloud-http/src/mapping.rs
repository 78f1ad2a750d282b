//! Property mapper
//!
//! Substitutes `<name>` placeholders in template strings with literal values.
//! Unknown placeholders are left untouched. Keys are case-sensitive and are
//! stored without angle brackets; brackets passed in by callers are stripped.

use std::collections::{BTreeMap, HashMap};

use multicloud_core::domain::RequestBody;
use serde_json::Value;

/// Placeholder table used to instantiate a request template
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyMapping {
    values: HashMap<String, String>,
}

impl PropertyMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a placeholder value; `"<id>"` and `"id"` name the same placeholder
    pub fn insert(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        self.values
            .insert(strip_brackets(name.as_ref()).to_string(), value.into());
    }

    /// Sets a placeholder value only when one is given
    pub fn insert_opt(&mut self, name: impl AsRef<str>, value: Option<impl Into<String>>) {
        if let Some(value) = value {
            self.insert(name, value);
        }
    }

    /// Builder-style variant of [`Self::insert`]
    pub fn with(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(strip_brackets(name)).map(String::as_str)
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.values.remove(strip_brackets(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(strip_brackets(name))
    }

    /// Replaces every known `<name>` placeholder in `source`
    ///
    /// Substitution is a single left-to-right pass, so values that themselves
    /// contain placeholders are not expanded again.
    pub fn apply(&self, source: &str) -> String {
        let mut out = String::with_capacity(source.len());
        let mut rest = source;

        while let Some(open) = rest.find('<') {
            out.push_str(&rest[..open]);
            let tail = &rest[open + 1..];
            if let Some(close) = tail.find('>') {
                if let Some(value) = self.values.get(&tail[..close]) {
                    out.push_str(value);
                    rest = &tail[close + 1..];
                    continue;
                }
            }
            out.push('<');
            rest = tail;
        }

        out.push_str(rest);
        out
    }

    /// Applies [`Self::apply`] to every value of a string table
    pub fn apply_all(&self, table: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        table
            .iter()
            .map(|(key, value)| (key.clone(), self.apply(value)))
            .collect()
    }

    /// Applies [`Self::apply`] to every string inside a JSON tree
    pub fn apply_json(&self, value: &Value) -> Value {
        match value {
            Value::String(s) => Value::String(self.apply(s)),
            Value::Array(items) => Value::Array(items.iter().map(|v| self.apply_json(v)).collect()),
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(key, v)| (key.clone(), self.apply_json(v)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    /// Renders a literal template body
    ///
    /// # Returns
    ///
    /// The substituted text and whether it is JSON, or `None` for the
    /// streamed-data body, which the caller supplies itself.
    pub fn render_body(&self, body: &RequestBody) -> Option<(String, bool)> {
        match body {
            RequestBody::Text(text) => Some((self.apply(text), false)),
            RequestBody::Json(map) => {
                let rendered = self.apply_json(&Value::Object(map.clone()));
                Some((rendered.to_string(), true))
            }
            RequestBody::Data => None,
        }
    }
}

fn strip_brackets(name: &str) -> &str {
    name.strip_prefix('<')
        .and_then(|inner| inner.strip_suffix('>'))
        .unwrap_or(name)
}
