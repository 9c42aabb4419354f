//! Tree diff engine
//!
//! Compares a local directory tree with a remote folder tree and produces an
//! immutable [`DiffResult`]: one [`DirectoryDiff`] record set per directory
//! pair that exists on both sides.
//!
//! ## Traversal
//!
//! The walk is breadth-first over an explicit worklist of
//! `(local dir, remote folder id)` pairs. Each level's listings are fetched
//! concurrently up to the configured bound, and results are collected in
//! worklist order, so the output is the same regardless of which fetch
//! finishes first. Only folders present on both sides are descended.
//!
//! ## Identity
//!
//! An entry is identified by name and kind. A local file and a remote
//! folder with the same name are unrelated: the file is client-only and the
//! folder server-only. Two files with the same name are compared by content
//! hash only.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use futures_util::{stream, StreamExt, TryStreamExt};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use boxsync_core::domain::{ContentHash, NodeKind, RemoteNode};
use boxsync_core::ports::{IContentHasher, IRemoteTree};

use crate::{SyncError, SyncResult};

/// Default number of concurrent directory listings
pub const DEFAULT_CONCURRENCY: usize = 4;

// ============================================================================
// DiffResult
// ============================================================================

/// A local file paired with the remote file of the same name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilePair {
    pub local: PathBuf,
    pub remote: RemoteNode,
}

/// The six disjoint categories computed for one directory pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryDiff {
    /// Local directory that was compared
    pub local_dir: PathBuf,
    /// `local_dir` relative to the local root; empty for the root
    pub relative_dir: PathBuf,
    /// Remote folder the records were computed under
    pub context: RemoteNode,
    pub client_only_files: Vec<PathBuf>,
    pub client_only_folders: Vec<PathBuf>,
    pub server_only_files: Vec<RemoteNode>,
    pub server_only_folders: Vec<RemoteNode>,
    /// Same name on both sides, different content hash
    pub differing: Vec<FilePair>,
    /// Same name and content hash; empty when identical files are ignored
    pub identical: Vec<FilePair>,
}

impl DirectoryDiff {
    fn new(local_dir: PathBuf, relative_dir: PathBuf, context: RemoteNode) -> Self {
        Self {
            local_dir,
            relative_dir,
            context,
            client_only_files: Vec::new(),
            client_only_folders: Vec::new(),
            server_only_files: Vec::new(),
            server_only_folders: Vec::new(),
            differing: Vec::new(),
            identical: Vec::new(),
        }
    }

    /// True when nothing in this directory needs to change
    pub fn is_converged(&self) -> bool {
        self.client_only_files.is_empty()
            && self.client_only_folders.is_empty()
            && self.server_only_files.is_empty()
            && self.server_only_folders.is_empty()
            && self.differing.is_empty()
    }
}

/// Counts per category across the whole tree
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiffSummary {
    pub directories: usize,
    pub client_only_files: usize,
    pub client_only_folders: usize,
    pub server_only_files: usize,
    pub server_only_folders: usize,
    pub differing: usize,
    pub identical: usize,
}

/// Category contents as `/`-separated paths relative to the roots
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiffReport {
    pub client_only_files: Vec<String>,
    pub client_only_folders: Vec<String>,
    pub server_only_files: Vec<String>,
    pub server_only_folders: Vec<String>,
    pub differing: Vec<String>,
    /// `None` when identical files were not recorded
    pub identical: Option<Vec<String>>,
}

/// Outcome of comparing a local tree with a remote tree
///
/// Built once by [`TreeDiffEngine::diff`] and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffResult {
    local_root: PathBuf,
    remote_root: RemoteNode,
    ignore_identical: bool,
    directories: Vec<DirectoryDiff>,
}

impl DiffResult {
    pub fn local_root(&self) -> &Path {
        &self.local_root
    }

    pub fn remote_root(&self) -> &RemoteNode {
        &self.remote_root
    }

    /// Whether identical files were left out of the records
    pub fn ignores_identical(&self) -> bool {
        self.ignore_identical
    }

    /// Record sets in traversal order, the root first
    pub fn directories(&self) -> &[DirectoryDiff] {
        &self.directories
    }

    /// True when the local and remote trees already match
    pub fn is_converged(&self) -> bool {
        self.directories.iter().all(DirectoryDiff::is_converged)
    }

    pub fn summary(&self) -> DiffSummary {
        self.directories
            .iter()
            .fold(DiffSummary::default(), |mut s, d| {
                s.directories += 1;
                s.client_only_files += d.client_only_files.len();
                s.client_only_folders += d.client_only_folders.len();
                s.server_only_files += d.server_only_files.len();
                s.server_only_folders += d.server_only_folders.len();
                s.differing += d.differing.len();
                s.identical += d.identical.len();
                s
            })
    }

    /// Path relative to the local root, `/`-separated
    pub fn relative(&self, path: &Path) -> String {
        slash_path(path.strip_prefix(&self.local_root).unwrap_or(path))
    }

    pub fn report(&self) -> DiffReport {
        let mut report = DiffReport::default();
        let mut identical = Vec::new();

        for dir in &self.directories {
            let remote = |node: &RemoteNode| slash_path(&dir.relative_dir.join(&node.name));

            report
                .client_only_files
                .extend(dir.client_only_files.iter().map(|p| self.relative(p)));
            report
                .client_only_folders
                .extend(dir.client_only_folders.iter().map(|p| self.relative(p)));
            report
                .server_only_files
                .extend(dir.server_only_files.iter().map(remote));
            report
                .server_only_folders
                .extend(dir.server_only_folders.iter().map(remote));
            report
                .differing
                .extend(dir.differing.iter().map(|f| self.relative(&f.local)));
            identical.extend(dir.identical.iter().map(|f| self.relative(&f.local)));
        }

        if !self.ignore_identical {
            report.identical = Some(identical);
        }
        report
    }
}

impl fmt::Display for DiffResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self.report();
        writeln!(
            f,
            "diff between client path({}) and server path({}):",
            self.local_root.display(),
            self.remote_root.name
        )?;
        writeln!(f, "[client only files]:\n{}", report.client_only_files.join(", "))?;
        writeln!(f, "[client only folders]:\n{}", report.client_only_folders.join(", "))?;
        writeln!(f, "[server only files]:\n{}", report.server_only_files.join(", "))?;
        writeln!(f, "[server only folders]:\n{}", report.server_only_folders.join(", "))?;
        writeln!(f, "[diff files]:\n{}", report.differing.join(", "))?;
        match report.identical {
            Some(identical) => writeln!(f, "[common files]:\n{}", identical.join(", ")),
            None => writeln!(f, "[common files]:\n***ignored***"),
        }
    }
}

/// Outcome of comparing one local file with one remote file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileComparison {
    pub local: PathBuf,
    pub remote: RemoteNode,
    pub local_hash: ContentHash,
    /// The remote digest equals the local one
    pub identical: bool,
}

/// Joins normal path components with `/`
pub(crate) fn slash_path(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

// ============================================================================
// Local listing
// ============================================================================

/// An entry of a local directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LocalEntry {
    pub name: String,
    pub path: PathBuf,
    pub kind: NodeKind,
}

/// Lists a local directory, sorted by name
///
/// Symlinks are followed. Entries whose names are not valid UTF-8 cannot
/// exist remotely and are skipped, as are dangling links and special files.
pub(crate) async fn read_local_dir(dir: &Path) -> std::io::Result<Vec<LocalEntry>> {
    let mut entries = Vec::new();
    let mut reader = tokio::fs::read_dir(dir).await?;

    while let Some(entry) = reader.next_entry().await? {
        let path = entry.path();
        let name = match entry.file_name().into_string() {
            Ok(name) => name,
            Err(raw) => {
                warn!(path = ?raw, "Skipping entry with non UTF-8 name");
                continue;
            }
        };

        let metadata = match tokio::fs::metadata(&path).await {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "Skipping dangling entry");
                continue;
            }
            Err(e) => return Err(e),
        };

        let kind = if metadata.is_dir() {
            NodeKind::Folder
        } else if metadata.is_file() {
            NodeKind::File
        } else {
            debug!(path = %path.display(), "Skipping special file");
            continue;
        };

        entries.push(LocalEntry { name, path, kind });
    }

    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

// ============================================================================
// TreeDiffEngine
// ============================================================================

/// A directory pair waiting to be compared
struct WorkItem {
    local_dir: PathBuf,
    relative_dir: PathBuf,
    folder: RemoteNode,
    /// Already known children, saving one listing for the root
    children: Option<Vec<RemoteNode>>,
}

/// Computes [`DiffResult`]s between a local tree and a remote tree
pub struct TreeDiffEngine {
    tree: Arc<dyn IRemoteTree>,
    hasher: Arc<dyn IContentHasher>,
    concurrency: usize,
}

impl TreeDiffEngine {
    pub fn new(tree: Arc<dyn IRemoteTree>, hasher: Arc<dyn IContentHasher>) -> Self {
        Self {
            tree,
            hasher,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Sets how many directory listings may be in flight at once
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Compares `local_root` with the remote folder `remote_root`
    ///
    /// If `remote_root.children` is populated it is used as the root
    /// listing; every descended folder is listed afresh.
    ///
    /// # Errors
    /// Any listing, hashing or local I/O failure aborts the whole diff.
    #[instrument(skip(self, remote_root), fields(local = %local_root.display(), remote = %remote_root.id))]
    pub async fn diff(
        &self,
        local_root: &Path,
        remote_root: &RemoteNode,
        ignore_identical: bool,
    ) -> SyncResult<DiffResult> {
        if !remote_root.is_folder() {
            return Err(SyncError::NotAFolder(remote_root.name.clone()));
        }
        if !tokio::fs::metadata(local_root).await?.is_dir() {
            return Err(SyncError::NotADirectory(local_root.to_path_buf()));
        }

        let context = RemoteNode {
            children: None,
            ..remote_root.clone()
        };

        let mut level = vec![WorkItem {
            local_dir: local_root.to_path_buf(),
            relative_dir: PathBuf::new(),
            folder: context.clone(),
            children: remote_root.children.clone(),
        }];
        let mut directories = Vec::new();

        while !level.is_empty() {
            debug!(pending = level.len(), "Comparing directory level");

            let results: Vec<(DirectoryDiff, Vec<WorkItem>)> = stream::iter(level)
                .map(|item| self.diff_directory(item, ignore_identical))
                .buffered(self.concurrency)
                .try_collect()
                .await?;

            let mut next = Vec::new();
            for (record, queued) in results {
                directories.push(record);
                next.extend(queued);
            }
            level = next;
        }

        let result = DiffResult {
            local_root: local_root.to_path_buf(),
            remote_root: context,
            ignore_identical,
            directories,
        };

        let summary = result.summary();
        info!(
            directories = summary.directories,
            client_only = summary.client_only_files + summary.client_only_folders,
            server_only = summary.server_only_files + summary.server_only_folders,
            differing = summary.differing,
            "Diff complete"
        );
        Ok(result)
    }

    /// Compares a local file with a remote file by content hash
    ///
    /// The remote digest is fetched with `get_info` when `remote` does not
    /// carry one.
    #[instrument(skip(self, remote), fields(local = %local.display(), remote = %remote.id))]
    pub async fn compare_file(&self, local: &Path, remote: &RemoteNode) -> SyncResult<FileComparison> {
        if !remote.is_file() {
            return Err(SyncError::NotAFile(remote.name.clone()));
        }
        if !tokio::fs::metadata(local).await?.is_file() {
            return Err(SyncError::NotAFile(local.display().to_string()));
        }

        let remote = match remote.content_hash {
            Some(_) => remote.clone(),
            None => self.tree.get_info(&remote.id, NodeKind::File).await?,
        };
        let local_hash = self.hasher.hash(local).await?;
        let identical = remote.content_hash.as_ref() == Some(&local_hash);
        debug!(identical, "File compared");

        Ok(FileComparison {
            local: local.to_path_buf(),
            remote,
            local_hash,
            identical,
        })
    }

    /// Compares one directory pair and returns the subfolders to descend
    async fn diff_directory(
        &self,
        item: WorkItem,
        ignore_identical: bool,
    ) -> SyncResult<(DirectoryDiff, Vec<WorkItem>)> {
        let remote_children = match item.children {
            Some(children) => children,
            None => self.tree.list_children(&item.folder.id).await?,
        };

        let mut remote_files = BTreeMap::new();
        let mut remote_folders = BTreeMap::new();
        for node in remote_children {
            match node.kind {
                NodeKind::File => remote_files.insert(node.name.clone(), node),
                NodeKind::Folder => remote_folders.insert(node.name.clone(), node),
            };
        }

        let mut record = DirectoryDiff::new(
            item.local_dir.clone(),
            item.relative_dir.clone(),
            item.folder,
        );
        let mut queued = Vec::new();

        for entry in read_local_dir(&item.local_dir).await? {
            match entry.kind {
                NodeKind::File => match remote_files.remove(&entry.name) {
                    None => record.client_only_files.push(entry.path),
                    Some(remote) => {
                        let local_hash = self.hasher.hash(&entry.path).await?;
                        let pair = FilePair {
                            local: entry.path,
                            remote,
                        };
                        if pair.remote.content_hash.as_ref() == Some(&local_hash) {
                            if !ignore_identical {
                                record.identical.push(pair);
                            }
                        } else {
                            record.differing.push(pair);
                        }
                    }
                },
                NodeKind::Folder => match remote_folders.remove(&entry.name) {
                    None => record.client_only_folders.push(entry.path),
                    Some(folder) => queued.push(WorkItem {
                        relative_dir: item.relative_dir.join(&entry.name),
                        local_dir: entry.path,
                        folder,
                        children: None,
                    }),
                },
            }
        }

        record.server_only_files = remote_files.into_values().collect();
        record.server_only_folders = remote_folders.into_values().collect();

        Ok((record, queued))
    }
}
