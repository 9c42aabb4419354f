//! BoxRemoteTree - IRemoteTree implementation for the Box API
//!
//! Maps the tree primitives onto Box v2.0 endpoints through [`BoxClient`],
//! which owns authentication and error classification.
//!
//! ## Design Notes
//!
//! - Listings are paginated with `limit`/`offset` until `total_count` items
//!   have been seen.
//! - Items of types other than `file` and `folder` (e.g. `web_link`) are
//!   not part of the tree and are skipped.
//! - A 405 on an id that is not numeric means the id itself is unusable and
//!   is reported as [`RemoteError::Parameter`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::CONTENT_DISPOSITION;
use serde::Deserialize;
use serde_json::json;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument};

use boxsync_core::domain::{
    ContentHash, DomainError, NodeKind, RemoteError, RemoteId, RemoteNode, RemoteResult,
};
use boxsync_core::ports::IRemoteTree;

use crate::client::{transport_error, ApiRequest, BoxClient, MultipartBody};

/// Largest page Box accepts for folder listings
const MAX_PAGE_SIZE: u32 = 1000;

/// Fields requested for every item
const ITEM_FIELDS: &str = "type,id,name,sha1,size,modified_at";

// ============================================================================
// Box API response types
// ============================================================================

/// A file, folder or other item as returned by Box
#[derive(Debug, Deserialize)]
struct ItemWire {
    #[serde(rename = "type")]
    item_type: String,
    id: String,
    #[serde(default)]
    name: String,
    sha1: Option<String>,
    size: Option<u64>,
    modified_at: Option<DateTime<Utc>>,
    item_collection: Option<ItemCollectionWire>,
}

/// One page of folder items
#[derive(Debug, Deserialize)]
struct ItemCollectionWire {
    #[serde(default)]
    total_count: u64,
    #[serde(default)]
    entries: Vec<ItemWire>,
}

/// Response of the upload endpoints
#[derive(Debug, Deserialize)]
struct UploadResponseWire {
    #[serde(default)]
    entries: Vec<ItemWire>,
}

impl ItemWire {
    fn kind(&self) -> Option<NodeKind> {
        match self.item_type.as_str() {
            "file" => Some(NodeKind::File),
            "folder" => Some(NodeKind::Folder),
            _ => None,
        }
    }

    /// Converts to a node, or `None` for item types outside the tree
    fn into_node(self) -> RemoteResult<Option<RemoteNode>> {
        let Some(kind) = self.kind() else {
            debug!(id = %self.id, item_type = %self.item_type, "Skipping non-tree item");
            return Ok(None);
        };

        let content_hash = match (kind, self.sha1) {
            (NodeKind::File, Some(sha1)) if !sha1.is_empty() => Some(ContentHash::new(sha1)?),
            _ => None,
        };

        Ok(Some(RemoteNode {
            id: RemoteId::new(self.id)?,
            name: self.name,
            kind,
            content_hash,
            size: self.size,
            modified_at: self.modified_at,
            children: None,
        }))
    }
}

fn nodes_from(entries: Vec<ItemWire>) -> RemoteResult<Vec<RemoteNode>> {
    let mut nodes = Vec::with_capacity(entries.len());
    for entry in entries {
        if let Some(node) = entry.into_node()? {
            nodes.push(node);
        }
    }
    Ok(nodes)
}

// ============================================================================
// BoxRemoteTree
// ============================================================================

/// Remote tree operations backed by the Box API
pub struct BoxRemoteTree {
    client: Arc<BoxClient>,
    page_size: u32,
}

impl BoxRemoteTree {
    pub fn new(client: Arc<BoxClient>) -> Self {
        Self {
            client,
            page_size: MAX_PAGE_SIZE,
        }
    }

    /// Sets the listing page size, clamped to `1..=1000`
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    /// The client this tree issues requests through
    pub fn client(&self) -> &Arc<BoxClient> {
        &self.client
    }

    fn item_url(&self, id: &RemoteId, kind: NodeKind) -> String {
        self.client
            .api_url(&format!("/{}/{}", kind.collection(), id))
    }

    async fn item_request(&self, request: ApiRequest) -> RemoteResult<RemoteNode> {
        let item: ItemWire = self.client.execute(&request).await?.parse()?;
        let id = item.id.clone();
        item.into_node()?.ok_or_else(|| RemoteError::Status {
            code: None,
            message: format!("item {id} is neither a file nor a folder"),
        })
    }

    /// Resolves the name to store a download under
    async fn download_name(
        &self,
        id: &RemoteId,
        disposition: Option<String>,
    ) -> RemoteResult<String> {
        let name = match disposition.as_deref().and_then(filename_from_disposition) {
            Some(name) => name,
            None => self.get_info(id, NodeKind::File).await?.name,
        };
        safe_file_name(&name)
    }
}

/// Reports a 405 on a non-numeric id as an ill-formed parameter
fn ill_formed_id(id: &RemoteId, err: RemoteError) -> RemoteError {
    match err {
        RemoteError::MethodNotAllowed(_) if !id.is_numeric() => {
            RemoteError::Parameter(format!("id({id}) is ill-formed"))
        }
        other => other,
    }
}

#[async_trait]
impl IRemoteTree for BoxRemoteTree {
    #[instrument(skip(self), fields(folder = %folder_id))]
    async fn list_children(&self, folder_id: &RemoteId) -> RemoteResult<Vec<RemoteNode>> {
        let url = self
            .client
            .api_url(&format!("/folders/{folder_id}/items"));
        let mut nodes = Vec::new();
        let mut offset: u64 = 0;

        loop {
            let request = ApiRequest::get(&url)
                .query("fields", ITEM_FIELDS)
                .query("limit", self.page_size)
                .query("offset", offset);
            let page: ItemCollectionWire = self.client.execute(&request).await?.parse()?;

            let received = page.entries.len() as u64;
            nodes.extend(nodes_from(page.entries)?);
            offset += received;

            if received == 0 || offset >= page.total_count {
                break;
            }
        }

        debug!(count = nodes.len(), "Listed folder");
        Ok(nodes)
    }

    #[instrument(skip(self), fields(id = %id, kind = %kind))]
    async fn get_info(&self, id: &RemoteId, kind: NodeKind) -> RemoteResult<RemoteNode> {
        let mut fields = ITEM_FIELDS.to_string();
        if kind == NodeKind::Folder {
            fields.push_str(",item_collection");
        }
        let request = ApiRequest::get(self.item_url(id, kind)).query("fields", fields);

        let mut item: ItemWire = self
            .client
            .execute(&request)
            .await
            .map_err(|e| ill_formed_id(id, e))?
            .parse()?;

        let collection = item.item_collection.take();
        let item_id = item.id.clone();
        let mut node = item.into_node()?.ok_or_else(|| RemoteError::Status {
            code: None,
            message: format!("item {item_id} is neither a file nor a folder"),
        })?;

        if node.is_folder() {
            // The embedded collection is truncated for large folders
            let children = match collection {
                Some(c) if (c.entries.len() as u64) >= c.total_count => nodes_from(c.entries)?,
                _ => self.list_children(&node.id).await?,
            };
            node.children = Some(children);
        }

        Ok(node)
    }

    #[instrument(skip(self), fields(parent = %parent_id))]
    async fn create_folder(&self, name: &str, parent_id: &RemoteId) -> RemoteResult<RemoteNode> {
        let request = ApiRequest::post(self.client.api_url("/folders"))
            .query("fields", ITEM_FIELDS)
            .json(json!({
                "name": name,
                "parent": { "id": parent_id.as_str() }
            }));

        let node = self.item_request(request).await?;
        info!(id = %node.id, name, "Created folder");
        Ok(node)
    }

    #[instrument(skip(self), fields(id = %id, kind = %kind))]
    async fn delete(&self, id: &RemoteId, kind: NodeKind, recursive: bool) -> RemoteResult<()> {
        let mut request = ApiRequest::delete(self.item_url(id, kind));
        if kind == NodeKind::Folder && recursive {
            request = request.query("recursive", "true");
        }

        self.client
            .execute(&request)
            .await
            .map_err(|e| ill_formed_id(id, e))?;

        info!("Deleted {}", kind);
        Ok(())
    }

    #[instrument(skip(self), fields(path = %local_path.display(), parent = %parent_id))]
    async fn upload_file(
        &self,
        local_path: &Path,
        parent_id: &RemoteId,
        existing: Option<&RemoteId>,
    ) -> RemoteResult<RemoteNode> {
        let file_name = local_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                DomainError::InvalidName(format!("{} has no usable file name", local_path.display()))
            })?
            .to_string();

        let content = tokio::fs::read(local_path).await?;
        let size = content.len();

        let (url, attributes) = match existing {
            Some(file_id) => (
                self.client
                    .upload_endpoint(&format!("/files/{file_id}/content")),
                json!({ "name": file_name }),
            ),
            None => (
                self.client.upload_endpoint("/files/content"),
                json!({ "name": file_name, "parent": { "id": parent_id.as_str() } }),
            ),
        };

        let request = ApiRequest::post(url).multipart(MultipartBody {
            attributes,
            file_name,
            content,
        });

        let response: UploadResponseWire = self.client.execute(&request).await?.parse()?;
        let node = nodes_from(response.entries)?
            .into_iter()
            .next()
            .ok_or_else(|| RemoteError::Status {
                code: None,
                message: "upload response has no entries".to_string(),
            })?;

        info!(id = %node.id, bytes = size, new_version = existing.is_some(), "Uploaded file");
        Ok(node)
    }

    #[instrument(skip(self), fields(id = %id, kind = %kind))]
    async fn rename(
        &self,
        id: &RemoteId,
        kind: NodeKind,
        new_name: &str,
    ) -> RemoteResult<RemoteNode> {
        let request = ApiRequest::put(self.item_url(id, kind))
            .query("fields", ITEM_FIELDS)
            .json(json!({ "name": new_name }));
        self.item_request(request).await
    }

    #[instrument(skip(self), fields(id = %id, kind = %kind, parent = %new_parent_id))]
    async fn move_to(
        &self,
        id: &RemoteId,
        kind: NodeKind,
        new_parent_id: &RemoteId,
    ) -> RemoteResult<RemoteNode> {
        let request = ApiRequest::put(self.item_url(id, kind))
            .query("fields", ITEM_FIELDS)
            .json(json!({ "parent": { "id": new_parent_id.as_str() } }));
        self.item_request(request).await
    }

    #[instrument(skip(self), fields(id = %id, dest = %dest_dir.display()))]
    async fn download_file(&self, id: &RemoteId, dest_dir: &Path) -> RemoteResult<PathBuf> {
        let request = ApiRequest::get(self.client.api_url(&format!("/files/{id}/content")));
        let mut response = self.client.execute_stream(&request).await?;

        let disposition = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let name = self.download_name(id, disposition).await?;

        tokio::fs::create_dir_all(dest_dir).await?;
        let target = dest_dir.join(&name);
        let mut file = tokio::fs::File::create(&target).await?;
        let mut written: u64 = 0;

        while let Some(chunk) = response.chunk().await.map_err(|e| transport_error(&e))? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        info!(path = %target.display(), bytes = written, "Downloaded file");
        Ok(target)
    }
}

/// Extracts the file name from a `Content-Disposition` header value
///
/// `filename*` (RFC 5987) takes precedence over `filename`.
fn filename_from_disposition(header: &str) -> Option<String> {
    let mut plain = None;

    for param in header.split(';').map(str::trim) {
        let Some((key, value)) = param.split_once('=') else {
            continue;
        };
        match key.trim().to_ascii_lowercase().as_str() {
            "filename*" => {
                let Some((_, encoded)) = value.trim().split_once("''") else {
                    continue;
                };
                let query = format!("n={}", encoded.replace('+', "%2B"));
                if let Some((_, decoded)) = url::form_urlencoded::parse(query.as_bytes()).next() {
                    if !decoded.is_empty() {
                        return Some(decoded.into_owned());
                    }
                }
            }
            "filename" => {
                let value = value.trim().trim_matches('"');
                if !value.is_empty() {
                    plain = Some(value.to_string());
                }
            }
            _ => {}
        }
    }

    plain
}

/// Reduces a server-supplied name to a single path component
fn safe_file_name(name: &str) -> RemoteResult<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    if base.is_empty() || base == "." || base == ".." {
        return Err(DomainError::InvalidName(name.to_string()).into());
    }
    Ok(base.to_string())
}
