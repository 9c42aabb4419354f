//! Remote tree snapshot entities

use std::fmt::{self, Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::{ContentHash, RemoteId};

/// Kind of a remote item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Folder,
}

impl NodeKind {
    /// Path segment used by the REST API for this kind (`files` / `folders`)
    pub fn collection(&self) -> &'static str {
        match self {
            NodeKind::File => "files",
            NodeKind::Folder => "folders",
        }
    }
}

impl Display for NodeKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::File => write!(f, "file"),
            NodeKind::Folder => write!(f, "folder"),
        }
    }
}

/// A read-only snapshot of a remote file or folder
///
/// Nodes are never mutated after they are fetched; any change on the
/// server requires a new fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteNode {
    pub id: RemoteId,
    pub name: String,
    pub kind: NodeKind,
    /// Present only for files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<ContentHash>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<DateTime<Utc>>,
    /// Immediate children, populated only by detailed folder lookups
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<RemoteNode>>,
}

impl RemoteNode {
    /// Creates a folder node with no metadata
    pub fn folder(id: RemoteId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            kind: NodeKind::Folder,
            content_hash: None,
            size: None,
            modified_at: None,
            children: None,
        }
    }

    /// Creates a file node with the given content hash
    pub fn file(id: RemoteId, name: impl Into<String>, hash: ContentHash) -> Self {
        Self {
            id,
            name: name.into(),
            kind: NodeKind::File,
            content_hash: Some(hash),
            size: None,
            modified_at: None,
            children: None,
        }
    }

    /// The account root folder (id `"0"`)
    pub fn root() -> Self {
        Self::folder(RemoteId::root(), "All Files")
    }

    pub fn is_folder(&self) -> bool {
        self.kind == NodeKind::Folder
    }

    pub fn is_file(&self) -> bool {
        self.kind == NodeKind::File
    }
}
