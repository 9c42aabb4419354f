//! boxsync Sync - Tree diff and one-way synchronization engine
//!
//! Provides:
//! - Level-by-level comparison of a local directory with a remote folder
//! - One-way push of local state onto the remote tree
//! - Path resolution and folder creation with conflict recovery
//! - Recursive download of a remote folder
//!
//! ## Modules
//!
//! - [`diff`] - `TreeDiffEngine` and the immutable `DiffResult`
//! - [`orchestrator`] - `SyncOrchestrator`, applying a diff in a fixed order
//! - [`resolve`] - Path lookup and `ensure_folder`
//! - [`transfer`] - Recursive download of a remote folder
//! - [`hasher`] - SHA-1 content hasher matching the remote `sha1` field
//! - [`ignore`] - Glob-based ignore rules

pub mod diff;
pub mod hasher;
pub mod ignore;
pub mod orchestrator;
pub mod resolve;
pub mod transfer;

#[cfg(test)]
pub(crate) mod testing;

use std::path::PathBuf;

use boxsync_core::domain::{DomainError, RemoteError};
use thiserror::Error;

/// Errors that can occur during diff and synchronization
#[derive(Debug, Error)]
pub enum SyncError {
    /// A remote operation failed
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// An I/O error occurred while reading the local tree
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A domain-level error propagated from boxsync-core
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// The local root is not a directory
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// The remote root is not a folder
    #[error("Not a folder: {0}")]
    NotAFolder(String),

    /// A file comparison was given something other than a file
    #[error("Not a file: {0}")]
    NotAFile(String),

    /// An action failed after `applied` earlier actions succeeded
    #[error("{action} failed after {applied} applied actions: {source}")]
    ActionFailed {
        action: String,
        applied: usize,
        #[source]
        source: Box<SyncError>,
    },
}

impl SyncError {
    /// The remote error at the root of this failure, if any
    pub fn remote(&self) -> Option<&RemoteError> {
        match self {
            SyncError::Remote(e) => Some(e),
            SyncError::ActionFailed { source, .. } => source.remote(),
            _ => None,
        }
    }
}

/// Result alias for sync operations
pub type SyncResult<T> = Result<T, SyncError>;
