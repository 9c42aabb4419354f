//! Content-hash oracle port

use std::path::Path;

use async_trait::async_trait;

use crate::domain::ContentHash;

/// Computes the digest of a local file
///
/// The digest scheme must match the one reported by the remote service,
/// since equality of the two is the only content comparison performed.
#[async_trait]
pub trait IContentHasher: Send + Sync {
    async fn hash(&self, path: &Path) -> std::io::Result<ContentHash>;
}
