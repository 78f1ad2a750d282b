//! Response normalizer
//!
//! Rewrites a provider JSON tree into the canonical field layout described by
//! a template's mapping table, then deserializes it into a domain type.
//!
//! A mapping entry `target → "a/b;c"` lists alternative source paths
//! separated by `;`; each path is a `/`-separated walk from the current
//! object. Every alternative that resolves is merged into `target`:
//!
//! | found value | merge into existing `target` |
//! |---|---|
//! | string | appended to the existing string |
//! | number | added to the existing number (float if either is a float) |
//! | object | normalized recursively, replaces the existing value |
//! | array | existing elements appended after the new ones, every element normalized |
//! | boolean | replaces the existing value |
//! | null / missing | ignored |
//!
//! Error responses (status ≥ 400) bypass the mapping; see [`parse_error`].

use std::collections::{BTreeMap, HashSet};

use multicloud_core::domain::OperationError;
use serde::de::DeserializeOwned;
use serde_json::{Map, Number, Value};

/// Separates alternative source paths in a mapping value
pub const MAPPING_SEPARATOR: char = ';';

/// Separates segments of one source path
pub const PATH_SEPARATOR: char = '/';

/// Applies a mapping table to provider JSON trees
#[derive(Debug, Clone, Copy)]
pub struct ResponseNormalizer<'a> {
    mapping: &'a BTreeMap<String, String>,
}

impl<'a> ResponseNormalizer<'a> {
    pub fn new(mapping: &'a BTreeMap<String, String>) -> Self {
        Self { mapping }
    }

    /// Returns the canonical form of `tree`
    ///
    /// The input is not modified. Non-object roots are returned unchanged.
    pub fn normalize(&self, tree: &Value) -> Value {
        self.map_node(tree)
    }

    /// Parses, normalizes and deserializes a response body
    ///
    /// # Returns
    ///
    /// `Ok(None)` for an empty (or whitespace-only) body.
    ///
    /// # Errors
    ///
    /// Returns the JSON error when the body is not valid JSON or the
    /// normalized tree does not fit `R`.
    pub fn decode<R: DeserializeOwned>(&self, body: &[u8]) -> Result<Option<R>, serde_json::Error> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        let tree: Value = serde_json::from_slice(body)?;
        serde_json::from_value(self.normalize(&tree)).map(Some)
    }

    fn map_node(&self, node: &Value) -> Value {
        let Value::Object(fields) = node else {
            return node.clone();
        };

        let mut out = fields.clone();
        // Targets already holding normalized values from this pass
        let mut written: HashSet<&str> = HashSet::new();
        for (target, sources) in self.mapping {
            let alternatives = sources
                .split(MAPPING_SEPARATOR)
                .map(str::trim)
                .filter(|source| !source.is_empty());

            for source in alternatives {
                let Some(found) = resolve(&out, source).cloned() else {
                    continue;
                };
                let normalized = written.contains(target.as_str());
                if let Some(merged) = self.merge(out.get(target), normalized, found) {
                    out.insert(target.clone(), merged);
                    written.insert(target.as_str());
                }
            }
        }

        Value::Object(out)
    }

    /// Merges `found` into the current value of a target field
    ///
    /// `normalized` marks an existing value this pass already produced;
    /// elements of such an array are not mapped a second time.
    fn merge(&self, existing: Option<&Value>, normalized: bool, found: Value) -> Option<Value> {
        match found {
            Value::String(text) => {
                let mut merged = match existing {
                    Some(Value::String(prefix)) => prefix.clone(),
                    _ => String::new(),
                };
                merged.push_str(&text);
                Some(Value::String(merged))
            }
            Value::Number(number) => match existing {
                Some(Value::Number(previous)) => Some(add_numbers(previous, &number)),
                _ => Some(Value::Number(number)),
            },
            Value::Object(_) => Some(self.map_node(&found)),
            Value::Array(items) => {
                let mut merged: Vec<Value> = items.iter().map(|item| self.map_node(item)).collect();
                if let Some(Value::Array(previous)) = existing {
                    if normalized {
                        merged.extend(previous.iter().cloned());
                    } else {
                        merged.extend(previous.iter().map(|item| self.map_node(item)));
                    }
                }
                Some(Value::Array(merged))
            }
            Value::Bool(flag) => Some(Value::Bool(flag)),
            Value::Null => None,
        }
    }
}

/// Walks a `/`-separated path from `root`; numeric segments index arrays
fn resolve<'v>(root: &'v Map<String, Value>, path: &str) -> Option<&'v Value> {
    let mut segments = path.split(PATH_SEPARATOR);
    let first = segments.next()?;
    let mut current = root.get(first)?;

    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

fn add_numbers(a: &Number, b: &Number) -> Value {
    if !a.is_f64() && !b.is_f64() {
        if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
            if let Some(sum) = x.checked_add(y) {
                return Value::Number(sum.into());
            }
        }
        if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
            if let Some(sum) = x.checked_add(y) {
                return Value::Number(sum.into());
            }
        }
    }

    let sum = a.as_f64().unwrap_or(0.0) + b.as_f64().unwrap_or(0.0);
    Number::from_f64(sum).map_or(Value::Null, Value::Number)
}

/// Extracts the provider error from a failed response
///
/// An `error` object at the root supplies `code` and `message` (a missing
/// numeric code becomes the HTTP status; a string code is folded into the
/// message). A bare `error` string becomes the message. Anything else falls
/// back to the HTTP status line.
pub fn parse_error(status: u16, reason: Option<&str>, body: &[u8]) -> OperationError {
    let status_code = i64::from(status);
    let fallback = || OperationError {
        code: status_code,
        message: reason.map(str::to_string),
    };

    let Ok(tree) = serde_json::from_slice::<Value>(body) else {
        return fallback();
    };

    match tree.get("error") {
        Some(Value::Object(error)) => {
            let code = error.get("code");
            let message = error
                .get("message")
                .or_else(|| error.get("error_description"))
                .and_then(Value::as_str);

            let numeric = code.and_then(Value::as_i64).filter(|code| *code != -1);
            let symbolic = code.and_then(Value::as_str);
            let message = match (symbolic, message) {
                (Some(symbol), Some(text)) => Some(format!("{}: {}", symbol, text)),
                (Some(symbol), None) => Some(symbol.to_string()),
                (None, Some(text)) => Some(text.to_string()),
                (None, None) => reason.map(str::to_string),
            };

            OperationError {
                code: numeric.unwrap_or(status_code),
                message,
            }
        }
        Some(Value::String(message)) => OperationError::new(status_code, message.clone()),
        Some(Value::Null) | None => fallback(),
        Some(other) => OperationError::new(status_code, other.to_string()),
    }
}
