//! Remote tree port (driven/secondary port)
//!
//! Primitive operations against the remote file tree. The diff engine and
//! the sync orchestrator depend only on this trait; the Box adapter lives
//! in `boxsync-api`.
//!
//! ## Design Notes
//!
//! - Unlike the adapter-facing ports, this trait returns [`RemoteResult`]
//!   because callers make recovery decisions on the error kind
//!   (e.g. a [`RemoteError::Conflict`] while creating a folder means
//!   "already exists").
//! - Uses `#[async_trait]` for async trait methods.
//!
//! [`RemoteError::Conflict`]: crate::domain::errors::RemoteError::Conflict

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::domain::{NodeKind, RemoteId, RemoteNode, RemoteResult};

/// Primitive CRUD operations on the remote tree
#[async_trait]
pub trait IRemoteTree: Send + Sync {
    /// Lists the immediate children of a folder
    ///
    /// All pages are fetched; the returned nodes carry `id`, `name`, `kind`
    /// and, for files, `content_hash`.
    async fn list_children(&self, folder_id: &RemoteId) -> RemoteResult<Vec<RemoteNode>>;

    /// Fetches detailed metadata for a file or folder
    ///
    /// For folders the returned node has `children` populated.
    ///
    /// # Errors
    /// - [`RemoteError::NotFound`] if no item has this id
    /// - [`RemoteError::Parameter`] if the id is ill-formed
    ///
    /// [`RemoteError::NotFound`]: crate::domain::errors::RemoteError::NotFound
    /// [`RemoteError::Parameter`]: crate::domain::errors::RemoteError::Parameter
    async fn get_info(&self, id: &RemoteId, kind: NodeKind) -> RemoteResult<RemoteNode>;

    /// Creates a folder named `name` under `parent_id`
    ///
    /// # Errors
    /// [`RemoteError::Conflict`] if an item with that name already exists
    ///
    /// [`RemoteError::Conflict`]: crate::domain::errors::RemoteError::Conflict
    async fn create_folder(&self, name: &str, parent_id: &RemoteId) -> RemoteResult<RemoteNode>;

    /// Deletes a file or folder
    ///
    /// `recursive` only applies to folders; deleting a non-empty folder
    /// without it fails on the server.
    async fn delete(&self, id: &RemoteId, kind: NodeKind, recursive: bool) -> RemoteResult<()>;

    /// Uploads a local file
    ///
    /// With `existing` set, the bytes become a new version of that file;
    /// otherwise a new file is created under `parent_id` using the local
    /// file name.
    async fn upload_file(
        &self,
        local_path: &Path,
        parent_id: &RemoteId,
        existing: Option<&RemoteId>,
    ) -> RemoteResult<RemoteNode>;

    /// Renames a file or folder in place
    async fn rename(&self, id: &RemoteId, kind: NodeKind, new_name: &str)
        -> RemoteResult<RemoteNode>;

    /// Moves a file or folder under another folder
    async fn move_to(
        &self,
        id: &RemoteId,
        kind: NodeKind,
        new_parent_id: &RemoteId,
    ) -> RemoteResult<RemoteNode>;

    /// Downloads a file into `dest_dir`, returning the written path
    async fn download_file(&self, id: &RemoteId, dest_dir: &Path) -> RemoteResult<PathBuf>;
}
