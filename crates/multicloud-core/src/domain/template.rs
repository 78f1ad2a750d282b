//! Declarative request templates
//!
//! A [`RequestTemplate`] describes one provider HTTP call: verb, URI,
//! headers, query parameters, body and the response field-mapping table.
//! Templates are loaded once per provider and are read-only afterwards;
//! placeholders of the form `<name>` are substituted at request time.
//!
//! ## Components
//!
//! - [`HttpVerb`] - Standard verbs plus the `MOVE`/`COPY` extensions
//! - [`RequestBody`] - Literal text, literal JSON, or the streamed-data sentinel
//! - [`RequestTemplate`] - One HTTP call
//! - [`OperationKind`] - The logical operations a provider can template
//! - [`ProviderTemplates`] - The full template set of one provider

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::file::FileDescriptor;
use super::oauth::OAuth2Settings;

// ============================================================================
// HttpVerb
// ============================================================================

/// HTTP methods a template may use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpVerb {
    #[default]
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
    Trace,
    /// WebDAV-style copy used by some providers
    Copy,
    /// WebDAV-style move used by some providers
    Move,
}

impl HttpVerb {
    /// Method token as sent on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpVerb::Get => "GET",
            HttpVerb::Head => "HEAD",
            HttpVerb::Post => "POST",
            HttpVerb::Put => "PUT",
            HttpVerb::Patch => "PATCH",
            HttpVerb::Delete => "DELETE",
            HttpVerb::Options => "OPTIONS",
            HttpVerb::Trace => "TRACE",
            HttpVerb::Copy => "COPY",
            HttpVerb::Move => "MOVE",
        }
    }
}

impl std::fmt::Display for HttpVerb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// RequestBody
// ============================================================================

/// Body mode of a template
///
/// In configuration a body is either a JSON object, a string, or the string
/// [`RequestBody::DATA_SENTINEL`], which means "send the next chunk of the
/// input stream as the request entity".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum RequestBody {
    /// Literal string body with placeholders substituted
    Text(String),
    /// Literal JSON body with placeholders substituted in every string value
    Json(Map<String, Value>),
    /// Streamed file data
    Data,
}

impl RequestBody {
    pub const DATA_SENTINEL: &'static str = "<data>";

    pub fn is_data(&self) -> bool {
        matches!(self, RequestBody::Data)
    }
}

impl From<Value> for RequestBody {
    fn from(value: Value) -> Self {
        match value {
            Value::String(s) if s == Self::DATA_SENTINEL => RequestBody::Data,
            Value::String(s) => RequestBody::Text(s),
            Value::Object(map) => RequestBody::Json(map),
            other => RequestBody::Text(other.to_string()),
        }
    }
}

impl From<RequestBody> for Value {
    fn from(body: RequestBody) -> Self {
        match body {
            RequestBody::Text(s) => Value::String(s),
            RequestBody::Json(map) => Value::Object(map),
            RequestBody::Data => Value::String(RequestBody::DATA_SENTINEL.to_string()),
        }
    }
}

// ============================================================================
// RequestTemplate
// ============================================================================

/// Declarative description of one provider HTTP call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestTemplate {
    #[serde(default)]
    pub method: HttpVerb,
    /// URI with `<name>` placeholders
    #[serde(alias = "uriTemplate")]
    pub uri: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    #[serde(default, alias = "jsonBody", skip_serializing_if = "Option::is_none")]
    pub body: Option<RequestBody>,
    /// Target path → `;`-separated alternative source paths
    #[serde(default, rename = "mapping", alias = "responseMapping")]
    pub response_mapping: BTreeMap<String, String>,
    /// When set, the access token is sent as this query parameter instead of
    /// the `Authorization` header
    #[serde(default, alias = "authParamName", skip_serializing_if = "Option::is_none")]
    pub authorization_param: Option<String>,
}

impl RequestTemplate {
    pub fn new(method: HttpVerb, uri: impl Into<String>) -> Self {
        Self {
            method,
            uri: uri.into(),
            ..Self::default()
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_mapping(mut self, target: impl Into<String>, sources: impl Into<String>) -> Self {
        self.response_mapping.insert(target.into(), sources.into());
        self
    }

    pub fn with_authorization_param(mut self, name: impl Into<String>) -> Self {
        self.authorization_param = Some(name.into());
        self
    }

    /// Query parameter carrying the token, if the template overrides the header
    pub fn token_param(&self) -> Option<&str> {
        self.authorization_param
            .as_deref()
            .filter(|name| !name.trim().is_empty())
    }
}

// ============================================================================
// OperationKind / ProviderTemplates
// ============================================================================

/// Logical operations a provider template set can describe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Authorize,
    Token,
    AccountInfo,
    AccountQuota,
    ListFolder,
    CreateFolder,
    Rename,
    Copy,
    Move,
    Delete,
    Download,
    UploadBegin,
    UploadExecute,
    UploadFinish,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OperationKind::Authorize => "authorize",
            OperationKind::Token => "token",
            OperationKind::AccountInfo => "account_info",
            OperationKind::AccountQuota => "account_quota",
            OperationKind::ListFolder => "list_folder",
            OperationKind::CreateFolder => "create_folder",
            OperationKind::Rename => "rename",
            OperationKind::Copy => "copy",
            OperationKind::Move => "move",
            OperationKind::Delete => "delete",
            OperationKind::Download => "download",
            OperationKind::UploadBegin => "upload_begin",
            OperationKind::UploadExecute => "upload_execute",
            OperationKind::UploadFinish => "upload_finish",
        };
        write!(f, "{}", s)
    }
}

/// The complete template set describing one provider
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderTemplates {
    /// Provider identifier, e.g. `dropbox`
    pub provider_id: String,
    pub description: Option<String>,
    pub oauth: Option<OAuth2Settings>,
    /// Descriptor of the provider's root folder
    pub root_folder: Option<FileDescriptor>,
    pub authorize: Option<RequestTemplate>,
    pub token: Option<RequestTemplate>,
    pub account_info: Option<RequestTemplate>,
    pub account_quota: Option<RequestTemplate>,
    pub list_folder: Option<RequestTemplate>,
    pub create_folder: Option<RequestTemplate>,
    pub rename: Option<RequestTemplate>,
    pub copy: Option<RequestTemplate>,
    #[serde(rename = "move")]
    pub move_item: Option<RequestTemplate>,
    pub delete: Option<RequestTemplate>,
    pub download: Option<RequestTemplate>,
    pub upload_begin: Option<RequestTemplate>,
    pub upload_execute: Option<RequestTemplate>,
    pub upload_finish: Option<RequestTemplate>,
}

impl ProviderTemplates {
    pub fn new(provider_id: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            ..Self::default()
        }
    }

    /// Template for one logical operation, if the provider defines it
    pub fn template(&self, kind: OperationKind) -> Option<&RequestTemplate> {
        match kind {
            OperationKind::Authorize => self.authorize.as_ref(),
            OperationKind::Token => self.token.as_ref(),
            OperationKind::AccountInfo => self.account_info.as_ref(),
            OperationKind::AccountQuota => self.account_quota.as_ref(),
            OperationKind::ListFolder => self.list_folder.as_ref(),
            OperationKind::CreateFolder => self.create_folder.as_ref(),
            OperationKind::Rename => self.rename.as_ref(),
            OperationKind::Copy => self.copy.as_ref(),
            OperationKind::Move => self.move_item.as_ref(),
            OperationKind::Delete => self.delete.as_ref(),
            OperationKind::Download => self.download.as_ref(),
            OperationKind::UploadBegin => self.upload_begin.as_ref(),
            OperationKind::UploadExecute => self.upload_execute.as_ref(),
            OperationKind::UploadFinish => self.upload_finish.as_ref(),
        }
    }

    /// Installs or replaces the template for one logical operation
    pub fn set_template(&mut self, kind: OperationKind, template: RequestTemplate) {
        let slot = match kind {
            OperationKind::Authorize => &mut self.authorize,
            OperationKind::Token => &mut self.token,
            OperationKind::AccountInfo => &mut self.account_info,
            OperationKind::AccountQuota => &mut self.account_quota,
            OperationKind::ListFolder => &mut self.list_folder,
            OperationKind::CreateFolder => &mut self.create_folder,
            OperationKind::Rename => &mut self.rename,
            OperationKind::Copy => &mut self.copy,
            OperationKind::Move => &mut self.move_item,
            OperationKind::Delete => &mut self.delete,
            OperationKind::Download => &mut self.download,
            OperationKind::UploadBegin => &mut self.upload_begin,
            OperationKind::UploadExecute => &mut self.upload_execute,
            OperationKind::UploadFinish => &mut self.upload_finish,
        };
        *slot = Some(template);
    }
}
