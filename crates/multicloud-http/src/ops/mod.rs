//! Concrete provider operations
//!
//! Each operation is an [`OperationHandler`](crate::OperationHandler) built
//! from the provider's template for that logical operation. Constructors
//! validate their arguments so invalid calls fail before any request.
//!
//! ## Operations
//!
//! - [`AccountInfoOp`], [`AccountQuotaOp`] - Account identity and quota
//! - [`FolderListOp`], [`FolderCreateOp`] - Folder listing and creation
//! - [`RenameOp`], [`CopyOp`], [`MoveOp`], [`DeleteOp`] - Item mutations

pub mod account;
pub mod folder;
pub mod item;

pub use account::{AccountInfoOp, AccountQuotaOp};
pub use folder::{FolderCreateOp, FolderListOp};
pub use item::{CopyOp, DeleteOp, MoveOp, RenameOp};

use multicloud_core::domain::{DomainError, FileDescriptor};

use crate::operation::{Normalized, OperationContext};

/// Joins a folder path and a child name with exactly one `/`
pub fn join_path(folder: &str, name: &str) -> String {
    if folder.ends_with('/') {
        format!("{}{}", folder, name)
    } else {
        format!("{}/{}", folder, name)
    }
}

/// Path of the folder containing `item`, trailing `/` included
pub(crate) fn containing_folder(item: &FileDescriptor) -> String {
    if let Some(path) = item.path.as_deref() {
        if let Some(separator) = path.rfind('/') {
            return path[..=separator].to_string();
        }
    }
    item.parents
        .iter()
        .find_map(|parent| parent.path.clone())
        .unwrap_or_else(|| "/".to_string())
}

/// Fails with [`DomainError::NotAFolder`] unless `descriptor` is a folder
pub fn require_folder(descriptor: &FileDescriptor) -> Result<(), DomainError> {
    if descriptor.is_folder() {
        Ok(())
    } else {
        Err(DomainError::NotAFolder(descriptor.label()))
    }
}

/// Fails with [`DomainError::NotAFile`] unless `descriptor` is a file
pub fn require_file(descriptor: &FileDescriptor) -> Result<(), DomainError> {
    if descriptor.is_file() {
        Ok(())
    } else {
        Err(DomainError::NotAFile(descriptor.label()))
    }
}

pub(crate) fn require_name(name: &str) -> Result<(), DomainError> {
    if name.trim().is_empty() {
        Err(DomainError::MissingArgument("name".to_string()))
    } else {
        Ok(())
    }
}

/// Stores a descriptor result, synthesizing one for an empty success body
pub(crate) fn store_descriptor(
    ctx: &mut OperationContext<FileDescriptor>,
    normalized: Normalized<FileDescriptor>,
    fallback: impl FnOnce() -> FileDescriptor,
) {
    match normalized {
        Normalized::Value(mut file) => {
            file.fill_missing();
            ctx.set_result(file);
        }
        Normalized::Empty => {
            let mut file = fallback();
            file.fill_missing();
            ctx.set_result(file);
        }
        Normalized::Unparsable | Normalized::ProviderError => {}
    }
}
