//! Folder listing and creation

use multicloud_core::domain::{FileDescriptor, FileKind, OperationKind, RequestBody, RequestTemplate};
use tracing::debug;

use super::{join_path, require_folder, require_name, store_descriptor};
use crate::mapping::PropertyMapping;
use crate::operation::{Normalized, OperationContext, OperationHandler};
use crate::Result;

// ============================================================================
// FolderListOp
// ============================================================================

/// Lists the children of a folder
///
/// Placeholders: `id`, `path`, `name` of the listed folder.
#[derive(Debug, Clone)]
pub struct FolderListOp {
    template: RequestTemplate,
    folder: FileDescriptor,
    show_deleted: bool,
}

impl FolderListOp {
    /// # Errors
    /// Returns a validation error when `folder` is not a folder.
    pub fn new(template: RequestTemplate, folder: FileDescriptor) -> Result<Self> {
        require_folder(&folder)?;
        Ok(Self {
            template,
            folder,
            show_deleted: false,
        })
    }

    /// Keeps children the provider reports as deleted
    pub fn show_deleted(mut self, show: bool) -> Self {
        self.show_deleted = show;
        self
    }
}

#[async_trait::async_trait]
impl OperationHandler for FolderListOp {
    type Output = FileDescriptor;

    fn kind(&self) -> OperationKind {
        OperationKind::ListFolder
    }

    fn property_mapping(&self) -> PropertyMapping {
        let mut mapping = PropertyMapping::new();
        mapping.insert_opt("id", self.folder.id.clone());
        mapping.insert_opt("path", self.folder.path.clone());
        mapping.insert_opt("name", self.folder.name.clone());
        mapping
    }

    async fn execute(&mut self, ctx: &mut OperationContext<FileDescriptor>) -> Result<()> {
        match ctx.request_json::<FileDescriptor>(&self.template).await? {
            Normalized::Value(mut listing) => {
                if listing.id.is_none() {
                    listing.id = self.folder.id.clone();
                }
                if listing.path.is_none() {
                    listing.path = self.folder.path.clone();
                }
                if listing.name.is_none() {
                    listing.name = self.folder.name.clone();
                }
                if listing.kind.is_none() {
                    listing.kind = Some(FileKind::Folder);
                }
                if !self.show_deleted {
                    listing.children.retain(|child| !child.deleted);
                }
                listing.fill_missing();
                debug!(folder = %self.folder.label(), children = listing.children.len(), "Listed folder");
                ctx.set_result(listing);
            }
            Normalized::Empty => {
                let mut folder = self.folder.clone();
                folder.children.clear();
                folder.fill_missing();
                ctx.set_result(folder);
            }
            Normalized::Unparsable | Normalized::ProviderError => {}
        }
        Ok(())
    }
}

// ============================================================================
// FolderCreateOp
// ============================================================================

/// Creates a folder inside a parent folder
///
/// Placeholders: `name` of the new folder, `id` of the parent, `path` of the
/// new folder (parent path joined with the name).
#[derive(Debug, Clone)]
pub struct FolderCreateOp {
    template: RequestTemplate,
    parent: FileDescriptor,
    name: String,
}

impl FolderCreateOp {
    /// # Errors
    /// Returns a validation error when `parent` is not a folder or `name` is blank.
    pub fn new(template: RequestTemplate, parent: FileDescriptor, name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        require_folder(&parent)?;
        require_name(&name)?;
        Ok(Self {
            template,
            parent,
            name,
        })
    }

    fn new_path(&self) -> Option<String> {
        self.parent
            .path
            .as_deref()
            .map(|parent| join_path(parent, &self.name))
    }

    /// Template with the parent reference dropped from a JSON body when the
    /// parent has neither id nor path
    fn effective_template(&self) -> RequestTemplate {
        let mut template = self.template.clone();
        if self.parent.id.is_some() || self.parent.path.is_some() {
            return template;
        }

        if let Some(RequestBody::Json(body)) = template.body.as_mut() {
            let key = template
                .response_mapping
                .get("parents")
                .and_then(|sources| sources.split(';').next())
                .map(str::trim)
                .filter(|key| !key.is_empty())
                .unwrap_or("parents")
                .to_string();
            if body.remove(&key).is_some() {
                debug!(key = %key, "Dropped parent reference from folder-create body");
            }
        }
        template
    }
}

#[async_trait::async_trait]
impl OperationHandler for FolderCreateOp {
    type Output = FileDescriptor;

    fn kind(&self) -> OperationKind {
        OperationKind::CreateFolder
    }

    fn property_mapping(&self) -> PropertyMapping {
        let mut mapping = PropertyMapping::new().with("name", self.name.clone());
        mapping.insert_opt("id", self.parent.id.clone());
        mapping.insert_opt("path", self.new_path());
        mapping
    }

    async fn execute(&mut self, ctx: &mut OperationContext<FileDescriptor>) -> Result<()> {
        let template = self.effective_template();
        let normalized = ctx.request_json::<FileDescriptor>(&template).await?;
        let path = self.new_path();
        let name = self.name.clone();
        store_descriptor(ctx, normalized, move || {
            let mut folder = FileDescriptor::new(name, FileKind::Folder);
            folder.path = path;
            folder
        });
        Ok(())
    }
}
