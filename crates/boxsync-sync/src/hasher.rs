//! SHA-1 content hasher
//!
//! Box reports a hex SHA-1 digest for every file, so the local side hashes
//! with the same algorithm and the two digests compare directly.

use std::path::Path;

use async_trait::async_trait;
use boxsync_core::{domain::ContentHash, ports::IContentHasher};
use sha1::{Digest, Sha1};
use tokio::io::AsyncReadExt;
use tracing::debug;

/// Read buffer size for hashing
const BUFFER_SIZE: usize = 64 * 1024;

/// Streams a file through SHA-1
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha1ContentHasher;

#[async_trait]
impl IContentHasher for Sha1ContentHasher {
    async fn hash(&self, path: &Path) -> std::io::Result<ContentHash> {
        let mut file = tokio::fs::File::open(path).await?;
        let mut hasher = Sha1::new();
        let mut buffer = vec![0u8; BUFFER_SIZE];

        loop {
            let read = file.read(&mut buffer).await?;
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
        }

        let hash = ContentHash::from_digest(&hasher.finalize())
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        debug!(path = %path.display(), hash = %hash, "hash computed");
        Ok(hash)
    }
}
