//! Rename, copy, move and delete
//!
//! Placeholders shared by these operations:
//!
//! | name | value |
//! |---|---|
//! | `id`, `path` | the source item |
//! | `name` | the (new) item name |
//! | `destination_id` | id of the destination folder (copy, move) |
//! | `destination_path` | full path the item ends up at |

use multicloud_core::domain::{FileDescriptor, OperationKind, ParentRef, RequestTemplate};

use super::{containing_folder, join_path, require_folder, require_name, store_descriptor};
use crate::mapping::PropertyMapping;
use crate::operation::{OperationContext, OperationHandler};
use crate::Result;

fn item_mapping(item: &FileDescriptor) -> PropertyMapping {
    let mut mapping = PropertyMapping::new();
    mapping.insert_opt("id", item.id.clone());
    mapping.insert_opt("path", item.path.clone());
    mapping.insert_opt("name", item.name.clone());
    mapping
}

// ============================================================================
// RenameOp
// ============================================================================

/// Renames an item in place
#[derive(Debug, Clone)]
pub struct RenameOp {
    template: RequestTemplate,
    item: FileDescriptor,
    new_name: String,
}

impl RenameOp {
    /// # Errors
    /// Returns a validation error when `new_name` is blank.
    pub fn new(template: RequestTemplate, item: FileDescriptor, new_name: impl Into<String>) -> Result<Self> {
        let new_name = new_name.into();
        require_name(&new_name)?;
        Ok(Self {
            template,
            item,
            new_name,
        })
    }

    fn destination_path(&self) -> String {
        join_path(&containing_folder(&self.item), &self.new_name)
    }
}

#[async_trait::async_trait]
impl OperationHandler for RenameOp {
    type Output = FileDescriptor;

    fn kind(&self) -> OperationKind {
        OperationKind::Rename
    }

    fn property_mapping(&self) -> PropertyMapping {
        let mut mapping = item_mapping(&self.item);
        mapping.insert("name", self.new_name.clone());
        mapping.insert("destination_path", self.destination_path());
        mapping
    }

    async fn execute(&mut self, ctx: &mut OperationContext<FileDescriptor>) -> Result<()> {
        let normalized = ctx.request_json::<FileDescriptor>(&self.template).await?;
        let mut renamed = self.item.clone();
        renamed.name = Some(self.new_name.clone());
        if renamed.path.is_some() {
            renamed.path = Some(self.destination_path());
        }
        store_descriptor(ctx, normalized, move || renamed);
        Ok(())
    }
}

// ============================================================================
// CopyOp / MoveOp
// ============================================================================

/// Arguments shared by copy and move
#[derive(Debug, Clone)]
struct Relocation {
    template: RequestTemplate,
    item: FileDescriptor,
    destination: FileDescriptor,
    name: Option<String>,
}

impl Relocation {
    fn new(
        template: RequestTemplate,
        item: FileDescriptor,
        destination: FileDescriptor,
        new_name: Option<String>,
    ) -> Result<Self> {
        require_folder(&destination)?;
        if let Some(name) = new_name.as_deref() {
            require_name(name)?;
        }
        Ok(Self {
            template,
            item,
            destination,
            name: new_name,
        })
    }

    fn target_name(&self) -> Option<String> {
        self.name.clone().or_else(|| self.item.name.clone())
    }

    fn destination_path(&self) -> Option<String> {
        let folder = self.destination.path.as_deref()?;
        Some(join_path(folder, &self.target_name()?))
    }

    fn property_mapping(&self) -> PropertyMapping {
        let mut mapping = item_mapping(&self.item);
        mapping.insert_opt("name", self.target_name());
        mapping.insert_opt("destination_id", self.destination.id.clone());
        mapping.insert_opt("destination_path", self.destination_path());
        mapping
    }

    /// Descriptor of the relocated item when the provider returns no body
    fn relocated(&self, keep_id: bool) -> FileDescriptor {
        let mut item = self.item.clone();
        if !keep_id {
            item.id = None;
        }
        item.name = self.target_name();
        item.path = self.destination_path();
        item.parents = vec![ParentRef {
            id: self.destination.id.clone(),
            path: self.destination.path.clone(),
            is_root: self.destination.is_root,
        }];
        item
    }
}

/// Copies an item into a destination folder
#[derive(Debug, Clone)]
pub struct CopyOp {
    inner: Relocation,
}

impl CopyOp {
    /// # Errors
    /// Returns a validation error when `destination` is not a folder or
    /// `new_name` is blank.
    pub fn new(
        template: RequestTemplate,
        item: FileDescriptor,
        destination: FileDescriptor,
        new_name: Option<String>,
    ) -> Result<Self> {
        Ok(Self {
            inner: Relocation::new(template, item, destination, new_name)?,
        })
    }
}

#[async_trait::async_trait]
impl OperationHandler for CopyOp {
    type Output = FileDescriptor;

    fn kind(&self) -> OperationKind {
        OperationKind::Copy
    }

    fn property_mapping(&self) -> PropertyMapping {
        self.inner.property_mapping()
    }

    async fn execute(&mut self, ctx: &mut OperationContext<FileDescriptor>) -> Result<()> {
        let normalized = ctx.request_json::<FileDescriptor>(&self.inner.template).await?;
        let copy = self.inner.relocated(false);
        store_descriptor(ctx, normalized, move || copy);
        Ok(())
    }
}

/// Moves an item into a destination folder
#[derive(Debug, Clone)]
pub struct MoveOp {
    inner: Relocation,
}

impl MoveOp {
    /// # Errors
    /// Returns a validation error when `destination` is not a folder or
    /// `new_name` is blank.
    pub fn new(
        template: RequestTemplate,
        item: FileDescriptor,
        destination: FileDescriptor,
        new_name: Option<String>,
    ) -> Result<Self> {
        Ok(Self {
            inner: Relocation::new(template, item, destination, new_name)?,
        })
    }
}

#[async_trait::async_trait]
impl OperationHandler for MoveOp {
    type Output = FileDescriptor;

    fn kind(&self) -> OperationKind {
        OperationKind::Move
    }

    fn property_mapping(&self) -> PropertyMapping {
        self.inner.property_mapping()
    }

    async fn execute(&mut self, ctx: &mut OperationContext<FileDescriptor>) -> Result<()> {
        let normalized = ctx.request_json::<FileDescriptor>(&self.inner.template).await?;
        let moved = self.inner.relocated(true);
        store_descriptor(ctx, normalized, move || moved);
        Ok(())
    }
}

// ============================================================================
// DeleteOp
// ============================================================================

/// Deletes an item
///
/// An empty success body yields the original descriptor marked deleted.
#[derive(Debug, Clone)]
pub struct DeleteOp {
    template: RequestTemplate,
    item: FileDescriptor,
}

impl DeleteOp {
    pub fn new(template: RequestTemplate, item: FileDescriptor) -> Self {
        Self { template, item }
    }
}

#[async_trait::async_trait]
impl OperationHandler for DeleteOp {
    type Output = FileDescriptor;

    fn kind(&self) -> OperationKind {
        OperationKind::Delete
    }

    fn property_mapping(&self) -> PropertyMapping {
        item_mapping(&self.item)
    }

    async fn execute(&mut self, ctx: &mut OperationContext<FileDescriptor>) -> Result<()> {
        let normalized = ctx.request_json::<FileDescriptor>(&self.template).await?;
        let mut deleted = self.item.clone();
        deleted.deleted = true;
        store_descriptor(ctx, normalized, move || deleted);
        Ok(())
    }
}
