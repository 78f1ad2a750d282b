//! File and folder descriptors
//!
//! [`FileDescriptor`] is the canonical shape every provider listing,
//! metadata and mutation response is normalized into. Providers rarely
//! send every field, so [`FileDescriptor::fill_missing`] derives the name,
//! the parent reference and the kind from whatever did arrive.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// MIME types providers use to mark folders (compared case-insensitively)
pub const FOLDER_MIME_TYPES: &[&str] = &[
    "text/directory",
    "inode/directory",
    "x-directory/normal",
    "resource/folder",
    "application/vnd.google-apps.folder",
];

/// Whether a descriptor is a regular file or a folder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FileKind {
    File,
    Folder,
}

impl FileKind {
    /// Parses a provider kind string, ignoring case; unknown values yield `None`
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "file" => Some(FileKind::File),
            "folder" | "directory" | "dir" => Some(FileKind::Folder),
            _ => None,
        }
    }

    /// Infers the kind from a MIME type
    pub fn from_mime_type(mime_type: &str) -> Self {
        if FOLDER_MIME_TYPES
            .iter()
            .any(|folder| folder.eq_ignore_ascii_case(mime_type))
        {
            FileKind::Folder
        } else {
            FileKind::File
        }
    }
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileKind::File => write!(f, "FILE"),
            FileKind::Folder => write!(f, "FOLDER"),
        }
    }
}

/// Reference from a descriptor to one of its parent folders
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default)]
    pub is_root: bool,
}

impl ParentRef {
    /// Builds a parent reference from a folder path prefix
    pub fn from_path(path: impl Into<String>) -> Self {
        let path = path.into();
        let is_root = path == "/";
        Self {
            id: None,
            path: Some(path),
            is_root,
        }
    }
}

/// Canonical description of a remote file or folder
///
/// Equality in the sense of multi-source downloads is [`Self::same_identity`]
/// (name and size), not structural equality.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawFileDescriptor")]
pub struct FileDescriptor {
    pub id: Option<String>,
    pub name: Option<String>,
    pub path: Option<String>,
    pub parents: Vec<ParentRef>,
    pub kind: Option<FileKind>,
    pub mime_type: Option<String>,
    pub size: u64,
    #[serde(rename = "content")]
    pub children: Vec<FileDescriptor>,
    pub deleted: bool,
    pub shared: bool,
    pub is_root: bool,
}

impl FileDescriptor {
    /// Creates a descriptor with a name and an explicit kind
    pub fn new(name: impl Into<String>, kind: FileKind) -> Self {
        Self {
            name: Some(name.into()),
            kind: Some(kind),
            ..Self::default()
        }
    }

    /// Creates a folder descriptor addressed by path
    pub fn folder_at(path: impl Into<String>) -> Self {
        let mut folder = Self {
            path: Some(path.into()),
            kind: Some(FileKind::Folder),
            ..Self::default()
        };
        folder.fill_missing();
        folder
    }

    /// Builder-style setter for the provider id
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Builder-style setter for the path
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Builder-style setter for the size in bytes
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    /// Resolved kind, inferring it on the fly when not yet filled in
    pub fn file_kind(&self) -> FileKind {
        self.kind.unwrap_or_else(|| self.inferred_kind())
    }

    pub fn is_folder(&self) -> bool {
        self.file_kind() == FileKind::Folder
    }

    pub fn is_file(&self) -> bool {
        self.file_kind() == FileKind::File
    }

    /// Identity used to decide whether two descriptors denote the same content
    pub fn same_identity(&self, other: &FileDescriptor) -> bool {
        self.name == other.name && self.size == other.size
    }

    /// Human-readable label for logs and error messages
    pub fn label(&self) -> String {
        self.path
            .clone()
            .or_else(|| self.name.clone())
            .or_else(|| self.id.clone())
            .unwrap_or_else(|| "<unnamed>".to_string())
    }

    /// Derives the fields providers commonly omit
    ///
    /// - `name` from the path tail after the last `/`
    /// - a single synthetic parent from the path prefix (trailing `/` included)
    /// - `kind` from the MIME type, or FOLDER when neither is present
    ///
    /// Children are filled recursively.
    pub fn fill_missing(&mut self) {
        if let Some(path) = self.path.as_deref() {
            if let Some(separator) = path.rfind('/') {
                if self.name.is_none() {
                    self.name = Some(path[separator + 1..].to_string());
                }
                if self.parents.is_empty() {
                    self.parents
                        .push(ParentRef::from_path(&path[..=separator]));
                }
            }
        }

        if self.kind.is_none() {
            self.kind = Some(self.inferred_kind());
        }

        for child in &mut self.children {
            child.fill_missing();
        }
    }

    fn inferred_kind(&self) -> FileKind {
        match self.mime_type.as_deref() {
            Some(mime_type) => FileKind::from_mime_type(mime_type),
            None => FileKind::Folder,
        }
    }
}

/// Wire shape accepted from normalized provider JSON
///
/// Tolerates sizes sent as strings, free-form kind strings and a single
/// `parent` id in place of the `parents` list.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawFileDescriptor {
    id: Option<Value>,
    name: Option<String>,
    path: Option<String>,
    parents: Vec<ParentRef>,
    parent: Option<String>,
    #[serde(alias = "fileType")]
    kind: Option<String>,
    mime_type: Option<String>,
    #[serde(alias = "sizeBytes")]
    size: Option<Value>,
    #[serde(alias = "children")]
    content: Vec<FileDescriptor>,
    #[serde(alias = "isDeleted")]
    deleted: bool,
    #[serde(alias = "isShared")]
    shared: bool,
    is_root: bool,
}

impl From<RawFileDescriptor> for FileDescriptor {
    fn from(raw: RawFileDescriptor) -> Self {
        let mut parents = raw.parents;
        if parents.is_empty() {
            if let Some(parent) = raw.parent {
                parents.push(ParentRef {
                    id: Some(parent),
                    ..ParentRef::default()
                });
            }
        }

        Self {
            id: raw.id.as_ref().and_then(scalar_to_string),
            name: raw.name,
            path: raw.path,
            parents,
            kind: raw.kind.as_deref().and_then(FileKind::parse),
            mime_type: raw.mime_type,
            size: raw.size.as_ref().and_then(scalar_to_u64).unwrap_or(0),
            children: raw.content,
            deleted: raw.deleted,
            shared: raw.shared,
            is_root: raw.is_root,
        }
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn scalar_to_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
