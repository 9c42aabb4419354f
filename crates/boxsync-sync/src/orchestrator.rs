//! One-way synchronization orchestrator
//!
//! [`SyncOrchestrator`] pushes the state of a local tree onto a remote
//! folder. It diffs the two trees and then applies the records in four
//! passes, each over the whole tree:
//!
//! 1. Create client-only folders, each followed by an upload of its contents
//! 2. Upload client-only files into their existing parent folder
//! 3. Delete server-only files and folders
//! 4. Upload differing files as new versions of the existing remote file
//!
//! Folders exist before anything is uploaded into them, and nothing is
//! uploaded into a folder that is about to be deleted.
//!
//! ## Failure policy
//!
//! - A `Conflict` when creating a folder means it already exists; its id is
//!   looked up and its contents are uploaded with a precheck
//! - Any other action failure stops the run with [`SyncError::ActionFailed`],
//!   leaving earlier actions applied
//! - With `fail_fast` off, failures are collected in
//!   [`SyncReport::errors`] and the run continues with independent records

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{info, instrument, warn};

use boxsync_core::domain::{NodeKind, RemoteError, RemoteId, RemoteNode, RemoteResult};
use boxsync_core::ports::{IContentHasher, IRemoteTree};

use crate::diff::{read_local_dir, slash_path, DiffResult, TreeDiffEngine};
use crate::resolve::ensure_folder;
use crate::{SyncError, SyncResult};

/// Predicate over paths relative to the sync root
pub type IgnoreFn = Arc<dyn Fn(&Path) -> bool + Send + Sync>;

// ============================================================================
// Options and report
// ============================================================================

/// How a sync run behaves
#[derive(Clone)]
pub struct SyncOptions {
    /// Compute and report every action without issuing any mutation
    pub dry_run: bool,
    /// Entries for which this returns true are skipped
    pub ignore: Option<IgnoreFn>,
    /// Stop at the first failed action
    pub fail_fast: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            ignore: None,
            fail_fast: true,
        }
    }
}

impl fmt::Debug for SyncOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncOptions")
            .field("dry_run", &self.dry_run)
            .field("ignore", &self.ignore.is_some())
            .field("fail_fast", &self.fail_fast)
            .finish()
    }
}

/// One remote mutation, applied or planned
///
/// Paths are `/`-separated and relative to the sync root. `parent` is
/// `None` only in a dry run, for folders that would have been created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SyncAction {
    CreateFolder {
        path: String,
        parent: Option<RemoteId>,
    },
    Upload {
        path: String,
        parent: Option<RemoteId>,
    },
    UploadVersion {
        path: String,
        file: RemoteId,
    },
    DeleteFile {
        path: String,
        id: RemoteId,
    },
    DeleteFolder {
        path: String,
        id: RemoteId,
    },
}

impl SyncAction {
    pub fn path(&self) -> &str {
        match self {
            SyncAction::CreateFolder { path, .. }
            | SyncAction::Upload { path, .. }
            | SyncAction::UploadVersion { path, .. }
            | SyncAction::DeleteFile { path, .. }
            | SyncAction::DeleteFolder { path, .. } => path,
        }
    }
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncAction::CreateFolder { path, .. } => write!(f, "create folder {path}"),
            SyncAction::Upload { path, .. } => write!(f, "upload {path}"),
            SyncAction::UploadVersion { path, file } => {
                write!(f, "upload new version of {path} (file {file})")
            }
            SyncAction::DeleteFile { path, id } => write!(f, "delete file {path} (id {id})"),
            SyncAction::DeleteFolder { path, id } => write!(f, "delete folder {path} (id {id})"),
        }
    }
}

/// Summary of a sync run
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub dry_run: bool,
    /// Applied actions, or planned ones in a dry run, in order
    pub actions: Vec<SyncAction>,
    /// Files left alone because the remote copy has the same content
    pub skipped: Vec<String>,
    /// Entries matched by the ignore predicate
    pub ignored: Vec<String>,
    /// Failed actions, only populated when `fail_fast` is off
    pub errors: Vec<String>,
    pub duration_ms: u64,
}

impl SyncReport {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

// ============================================================================
// Run state
// ============================================================================

/// Result of attempting one action
enum Outcome<T> {
    Applied(T),
    /// Dry run: recorded, not issued
    Planned,
    /// Failed and recorded; only returned when `fail_fast` is off
    Failed,
}

/// Where the contents of a local directory go
enum Target {
    /// The folder must be created under this parent
    Create(Option<RemoteId>),
    /// The folder exists; its files are prechecked against a listing
    Existing(RemoteId),
}

struct Run<'a> {
    options: &'a SyncOptions,
    base: PathBuf,
    report: SyncReport,
}

impl<'a> Run<'a> {
    fn new(options: &'a SyncOptions, base: PathBuf) -> Self {
        Self {
            options,
            base,
            report: SyncReport {
                dry_run: options.dry_run,
                ..SyncReport::default()
            },
        }
    }

    fn relative(&self, path: &Path) -> PathBuf {
        path.strip_prefix(&self.base)
            .unwrap_or(path)
            .to_path_buf()
    }

    /// Checks the path and every ancestor against the ignore predicate
    fn skip_ignored(&mut self, relative: &Path) -> bool {
        let Some(ignore) = &self.options.ignore else {
            return false;
        };
        let ignored = relative
            .ancestors()
            .filter(|p| !p.as_os_str().is_empty())
            .any(|p| ignore(p));

        if ignored {
            let path = slash_path(relative);
            info!(path = %path, "Ignoring");
            self.report.ignored.push(path);
        }
        ignored
    }

    /// Issues `op` unless this is a dry run, recording the action
    async fn act<T, Fut>(
        &mut self,
        action: SyncAction,
        op: impl FnOnce() -> Fut,
    ) -> SyncResult<Outcome<T>>
    where
        Fut: Future<Output = RemoteResult<T>>,
    {
        if self.options.dry_run {
            info!(action = %action, "Would apply");
            self.report.actions.push(action);
            return Ok(Outcome::Planned);
        }

        info!(action = %action, "Applying");
        match op().await {
            Ok(value) => {
                self.report.actions.push(action);
                Ok(Outcome::Applied(value))
            }
            Err(e) => {
                self.fail(action, e.into())?;
                Ok(Outcome::Failed)
            }
        }
    }

    /// Records a failed step; an error unless failures are collected
    fn fail(&mut self, action: impl fmt::Display, err: SyncError) -> SyncResult<()> {
        if self.options.fail_fast {
            return Err(SyncError::ActionFailed {
                action: action.to_string(),
                applied: self.report.actions.len(),
                source: Box::new(err),
            });
        }
        warn!(action = %action, error = %err, "Action failed, continuing");
        self.report.errors.push(format!("{action}: {err}"));
        Ok(())
    }

    fn finish(mut self, started: Instant) -> SyncReport {
        self.report.duration_ms = started.elapsed().as_millis() as u64;
        self.report
    }
}

// ============================================================================
// SyncOrchestrator
// ============================================================================

/// Applies a local tree onto a remote folder
pub struct SyncOrchestrator {
    tree: Arc<dyn IRemoteTree>,
    hasher: Arc<dyn IContentHasher>,
    engine: TreeDiffEngine,
}

impl SyncOrchestrator {
    pub fn new(tree: Arc<dyn IRemoteTree>, hasher: Arc<dyn IContentHasher>) -> Self {
        Self {
            engine: TreeDiffEngine::new(tree.clone(), hasher.clone()),
            tree,
            hasher,
        }
    }

    /// Sets the diff listing concurrency
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.engine = self.engine.with_concurrency(concurrency);
        self
    }

    /// The diff engine used by [`sync`](Self::sync)
    pub fn engine(&self) -> &TreeDiffEngine {
        &self.engine
    }

    /// Makes `remote_root` match `local_root`
    #[instrument(skip(self, remote_root, options), fields(local = %local_root.display(), remote = %remote_root.id, dry_run = options.dry_run))]
    pub async fn sync(
        &self,
        local_root: &Path,
        remote_root: &RemoteNode,
        options: &SyncOptions,
    ) -> SyncResult<SyncReport> {
        if options.dry_run {
            info!("Dry run, no remote changes will be made");
        }
        let diff = self.engine.diff(local_root, remote_root, true).await?;
        self.apply(&diff, options).await
    }

    /// Applies an already computed diff
    pub async fn apply(&self, diff: &DiffResult, options: &SyncOptions) -> SyncResult<SyncReport> {
        let started = Instant::now();
        let mut run = Run::new(options, diff.local_root().to_path_buf());

        // Step 1: client-only folders, each with its contents
        for dir in diff.directories() {
            for folder in &dir.client_only_folders {
                self.upload_folder(&mut run, folder, Target::Create(Some(dir.context.id.clone())))
                    .await?;
            }
        }

        // Step 2: client-only files
        for dir in diff.directories() {
            for file in &dir.client_only_files {
                let relative = run.relative(file);
                if run.skip_ignored(&relative) {
                    continue;
                }
                let parent = dir.context.id.clone();
                let action = SyncAction::Upload {
                    path: slash_path(&relative),
                    parent: Some(parent.clone()),
                };
                run.act(action, || self.tree.upload_file(file, &parent, None))
                    .await?;
            }
        }

        // Step 3: server-only files and folders
        for dir in diff.directories() {
            let server_only = dir
                .server_only_files
                .iter()
                .chain(&dir.server_only_folders);

            for node in server_only {
                let relative = dir.relative_dir.join(&node.name);
                if run.skip_ignored(&relative) {
                    continue;
                }
                let path = slash_path(&relative);
                let action = match node.kind {
                    NodeKind::File => SyncAction::DeleteFile {
                        path,
                        id: node.id.clone(),
                    },
                    NodeKind::Folder => SyncAction::DeleteFolder {
                        path,
                        id: node.id.clone(),
                    },
                };
                run.act(action, || self.tree.delete(&node.id, node.kind, true))
                    .await?;
            }
        }

        // Step 4: differing files become new versions
        for dir in diff.directories() {
            for pair in &dir.differing {
                let relative = run.relative(&pair.local);
                if run.skip_ignored(&relative) {
                    continue;
                }
                let action = SyncAction::UploadVersion {
                    path: slash_path(&relative),
                    file: pair.remote.id.clone(),
                };
                run.act(action, || {
                    self.tree
                        .upload_file(&pair.local, &dir.context.id, Some(&pair.remote.id))
                })
                .await?;
            }
        }

        let report = run.finish(started);
        info!(
            actions = report.actions.len(),
            ignored = report.ignored.len(),
            errors = report.errors.len(),
            duration_ms = report.duration_ms,
            "Sync complete"
        );
        Ok(report)
    }

    /// Uploads a local file or directory into the remote folder `parent`
    ///
    /// Existing remote files are prechecked: the same content is skipped,
    /// different content becomes a new version.
    #[instrument(skip(self, options), fields(parent = %parent))]
    pub async fn upload_path(
        &self,
        local: &Path,
        parent: &RemoteId,
        options: &SyncOptions,
    ) -> SyncResult<SyncReport> {
        let started = Instant::now();
        // `.` and `..` have no file name of their own
        let local = tokio::fs::canonicalize(local).await?;
        let base = local.parent().unwrap_or(Path::new("")).to_path_buf();
        let mut run = Run::new(options, base);

        let metadata = tokio::fs::metadata(&local).await?;
        if metadata.is_dir() {
            self.upload_folder(&mut run, &local, Target::Create(Some(parent.clone())))
                .await?;
        } else {
            let relative = run.relative(&local);
            if !run.skip_ignored(&relative) {
                match self.tree.list_children(parent).await {
                    Ok(listing) => {
                        self.upload_checked(&mut run, &local, Some(parent), Some(&listing))
                            .await?
                    }
                    Err(e) => run.fail(format!("list folder {parent}"), e.into())?,
                }
            }
        }

        Ok(run.finish(started))
    }

    /// Creates (or reuses) a folder and uploads everything below it
    ///
    /// Walks with an explicit stack, so each folder is handled before its
    /// contents.
    async fn upload_folder(&self, run: &mut Run<'_>, local_dir: &Path, target: Target) -> SyncResult<()> {
        let mut pending = vec![(local_dir.to_path_buf(), target)];

        while let Some((dir, target)) = pending.pop() {
            let relative = run.relative(&dir);
            if run.skip_ignored(&relative) {
                continue;
            }

            let path = slash_path(&relative);

            let (folder_id, listing) = match target {
                Target::Existing(id) => match self.tree.list_children(&id).await {
                    Ok(listing) => (Some(id), Some(listing)),
                    Err(e) => {
                        run.fail(format!("list folder {path}"), e.into())?;
                        continue;
                    }
                },
                Target::Create(parent) => {
                    let name = dir
                        .file_name()
                        .and_then(|n| n.to_str())
                        .unwrap_or_default()
                        .to_string();
                    let action = SyncAction::CreateFolder {
                        path: path.clone(),
                        parent: parent.clone(),
                    };
                    if name.is_empty() {
                        let err = RemoteError::Parameter(format!(
                            "{} has no folder name",
                            dir.display()
                        ));
                        run.fail(action, err.into())?;
                        continue;
                    }
                    let tree = self.tree.as_ref();
                    let outcome = run
                        .act(action, || async move {
                            match parent {
                                Some(parent) => ensure_folder(tree, &parent, &name).await,
                                None => Err(RemoteError::Parameter(format!(
                                    "folder {name} has no remote parent"
                                ))),
                            }
                        })
                        .await?;

                    match outcome {
                        Outcome::Applied(ensured) if ensured.created => (Some(ensured.node.id), None),
                        Outcome::Applied(ensured) => {
                            info!(path = %path, "Folder already existed, prechecking contents");
                            match self.tree.list_children(&ensured.node.id).await {
                                Ok(listing) => (Some(ensured.node.id), Some(listing)),
                                Err(e) => {
                                    run.fail(format!("list folder {path}"), e.into())?;
                                    continue;
                                }
                            }
                        }
                        Outcome::Planned => (None, None),
                        Outcome::Failed => continue,
                    }
                }
            };

            let entries = match read_local_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) => {
                    run.fail(format!("read directory {}", dir.display()), e.into())?;
                    continue;
                }
            };
            let mut subfolders = Vec::new();

            for entry in entries {
                match entry.kind {
                    NodeKind::File => {
                        self.upload_checked(run, &entry.path, folder_id.as_ref(), listing.as_deref())
                            .await?;
                    }
                    NodeKind::Folder => {
                        let existing = listing.as_ref().and_then(|l| {
                            l.iter()
                                .find(|n| n.is_folder() && n.name == entry.name)
                                .map(|n| n.id.clone())
                        });
                        let target = match existing {
                            Some(id) => Target::Existing(id),
                            None => Target::Create(folder_id.clone()),
                        };
                        subfolders.push((entry.path, target));
                    }
                }
            }

            // Reversed so the stack pops subfolders in name order
            pending.extend(subfolders.into_iter().rev());
        }

        Ok(())
    }

    /// Uploads one file, prechecking against `listing` when the parent
    /// folder already existed
    async fn upload_checked(
        &self,
        run: &mut Run<'_>,
        local: &Path,
        parent: Option<&RemoteId>,
        listing: Option<&[RemoteNode]>,
    ) -> SyncResult<()> {
        let relative = run.relative(local);
        if run.skip_ignored(&relative) {
            return Ok(());
        }
        let path = slash_path(&relative);
        let name = local
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let existing = listing.and_then(|l| l.iter().find(|n| n.name == name));
        let action = match existing {
            Some(node) if node.is_folder() => {
                let action = SyncAction::Upload {
                    path: path.clone(),
                    parent: parent.cloned(),
                };
                let err = RemoteError::Conflict(format!(
                    "a folder named '{name}' already exists on the server"
                ));
                return run.fail(action, err.into());
            }
            Some(node) => {
                let local_hash = match self.hasher.hash(local).await {
                    Ok(hash) => hash,
                    Err(e) => return run.fail(format!("hash {path}"), e.into()),
                };
                if node.content_hash.as_ref() == Some(&local_hash) {
                    info!(path = %path, "Same content on server, skipping");
                    run.report.skipped.push(path);
                    return Ok(());
                }
                SyncAction::UploadVersion {
                    path,
                    file: node.id.clone(),
                }
            }
            None => SyncAction::Upload {
                path,
                parent: parent.cloned(),
            },
        };

        let existing_id = existing.map(|n| n.id.clone());
        run.act(action, || async move {
            match parent {
                Some(parent) => {
                    self.tree
                        .upload_file(local, parent, existing_id.as_ref())
                        .await
                }
                None => Err(RemoteError::Parameter(format!(
                    "{} has no remote parent",
                    local.display()
                ))),
            }
        })
        .await?;
        Ok(())
    }
}
