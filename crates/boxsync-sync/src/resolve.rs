//! Remote path resolution and folder creation
//!
//! Box addresses items by id only. These helpers translate `/`-separated
//! paths from the account root into nodes, one listing per segment.

use boxsync_core::domain::{NodeKind, RemoteError, RemoteId, RemoteNode, RemoteResult};
use boxsync_core::ports::IRemoteTree;
use tracing::{debug, warn};

/// Splits a remote path into its segments
///
/// `""` and `"/"` have no segments. `.` segments are dropped.
///
/// # Errors
/// [`RemoteError::Parameter`] for `..` segments
pub fn segments(path: &str) -> RemoteResult<Vec<&str>> {
    let mut out = Vec::new();
    for segment in path.split('/').filter(|s| !s.is_empty() && *s != ".") {
        if segment == ".." {
            return Err(RemoteError::Parameter(format!(
                "path({path}) must not contain '..'"
            )));
        }
        out.push(segment);
    }
    Ok(out)
}

/// Resolves `path` from the root folder to a node
///
/// Every intermediate segment must name a folder. The last segment is
/// matched against folders first and then files; `kind` restricts the
/// match to one of them.
///
/// # Errors
/// [`RemoteError::NotFound`] if any segment does not exist
pub async fn resolve_path(
    tree: &dyn IRemoteTree,
    path: &str,
    kind: Option<NodeKind>,
) -> RemoteResult<RemoteNode> {
    let segments = segments(path)?;
    let Some((last, parents)) = segments.split_last() else {
        return match kind {
            Some(NodeKind::File) => Err(RemoteError::NotFound(format!("{path} is the root folder"))),
            _ => Ok(RemoteNode::root()),
        };
    };

    let mut folder_id = RemoteId::root();
    for name in parents {
        debug!(name, folder = %folder_id, "Looking up folder");
        folder_id = tree
            .list_children(&folder_id)
            .await?
            .into_iter()
            .find(|n| n.is_folder() && n.name == *name)
            .map(|n| n.id)
            .ok_or_else(|| RemoteError::NotFound(format!("no folder '{name}' in path {path}")))?;
    }

    let children = tree.list_children(&folder_id).await?;
    let find = |wanted: NodeKind| {
        children
            .iter()
            .find(|n| n.kind == wanted && n.name == *last)
            .cloned()
    };

    let found = match kind {
        Some(wanted) => find(wanted),
        None => find(NodeKind::Folder).or_else(|| find(NodeKind::File)),
    };

    found.ok_or_else(|| RemoteError::NotFound(format!("{path} does not exist")))
}

/// A folder returned by [`ensure_folder`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnsuredFolder {
    pub node: RemoteNode,
    /// False when the folder already existed
    pub created: bool,
}

/// Creates `name` under `parent_id`, or returns the folder already there
///
/// # Errors
/// [`RemoteError::Conflict`] if the name is taken by a file
pub async fn ensure_folder(
    tree: &dyn IRemoteTree,
    parent_id: &RemoteId,
    name: &str,
) -> RemoteResult<EnsuredFolder> {
    match tree.create_folder(name, parent_id).await {
        Ok(node) => Ok(EnsuredFolder {
            node,
            created: true,
        }),
        Err(RemoteError::Conflict(message)) => {
            warn!(name, parent = %parent_id, "Folder already exists, resolving its id");
            let existing = tree
                .list_children(parent_id)
                .await?
                .into_iter()
                .find(|n| n.is_folder() && n.name == name);

            match existing {
                Some(node) => Ok(EnsuredFolder {
                    node,
                    created: false,
                }),
                None => Err(RemoteError::Conflict(message)),
            }
        }
        Err(e) => Err(e),
    }
}

/// Creates every missing folder of `path`, returning the last one
pub async fn ensure_path(tree: &dyn IRemoteTree, path: &str) -> RemoteResult<RemoteNode> {
    let mut current = RemoteNode::root();
    for name in segments(path)? {
        current = ensure_folder(tree, &current.id, name).await?.node;
    }
    Ok(current)
}
