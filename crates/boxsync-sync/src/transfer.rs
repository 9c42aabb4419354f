//! Recursive download of a remote folder

use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use boxsync_core::domain::{NodeKind, RemoteNode};
use boxsync_core::ports::{IContentHasher, IRemoteTree};

use crate::{SyncError, SyncResult};

/// What [`download_tree`] did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DownloadReport {
    /// Files written
    pub downloaded: Vec<PathBuf>,
    /// Files already present with the same content
    pub skipped: Vec<PathBuf>,
    /// Local folders created or reused
    pub folders: usize,
}

/// True if `name` is a single path component that stays inside its parent
fn is_plain_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !name.contains(['/', '\\'])
}

/// Mirrors the remote `folder` into `local_dir/<folder name>`
///
/// Local files whose SHA-1 already matches the remote digest are left
/// untouched. Nothing is ever deleted locally. Files are stored under their
/// item name, even when the download names them differently.
#[instrument(skip(tree, hasher, folder), fields(folder = %folder.id, dest = %local_dir.display()))]
pub async fn download_tree(
    tree: &dyn IRemoteTree,
    hasher: &dyn IContentHasher,
    folder: &RemoteNode,
    local_dir: &Path,
) -> SyncResult<DownloadReport> {
    if !folder.is_folder() {
        return Err(SyncError::NotAFolder(folder.name.clone()));
    }
    if !is_plain_name(&folder.name) {
        return Err(SyncError::Domain(
            boxsync_core::domain::DomainError::InvalidName(folder.name.clone()),
        ));
    }

    let mut report = DownloadReport::default();
    let mut pending = vec![(folder.clone(), local_dir.join(&folder.name))];

    while let Some((folder, target)) = pending.pop() {
        tokio::fs::create_dir_all(&target).await?;
        report.folders += 1;

        let children = match folder.children {
            Some(children) => children,
            None => tree.list_children(&folder.id).await?,
        };

        for child in children {
            if !is_plain_name(&child.name) {
                warn!(id = %child.id, name = %child.name, "Skipping item with unsafe name");
                continue;
            }
            let local = target.join(&child.name);

            match child.kind {
                NodeKind::Folder => pending.push((child, local)),
                NodeKind::File => {
                    let present = tokio::fs::metadata(&local)
                        .await
                        .is_ok_and(|m| m.is_file());
                    if present {
                        let local_hash = hasher.hash(&local).await?;
                        if child.content_hash.as_ref() == Some(&local_hash) {
                            debug!(path = %local.display(), "Same content, skipping");
                            report.skipped.push(local);
                            continue;
                        }
                    }
                    let written = tree.download_file(&child.id, &target).await?;
                    if written != local {
                        debug!(from = %written.display(), to = %local.display(), "Renaming download to item name");
                        tokio::fs::rename(&written, &local).await?;
                    }
                    report.downloaded.push(local);
                }
            }
        }
    }

    info!(
        downloaded = report.downloaded.len(),
        skipped = report.skipped.len(),
        folders = report.folders,
        "Download complete"
    );
    Ok(report)
}
