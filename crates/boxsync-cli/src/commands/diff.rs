//! Diff command - Compare a local directory with a remote folder
//!
//! Lists what `boxsync sync` would have to change without changing
//! anything: client-only, server-only and differing entries per directory.
//! Given a local file, compares it with a remote file by SHA-1 instead.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::Args;

use boxsync_core::domain::NodeKind;
use boxsync_sync::diff::TreeDiffEngine;
use boxsync_sync::hasher::Sha1ContentHasher;
use boxsync_sync::resolve::resolve_path;

use crate::context::{Context, Remote};

#[derive(Debug, Args)]
pub struct DiffCommand {
    /// Local directory, or a local file
    pub local: PathBuf,

    /// Remote folder path, e.g. /Backups/photos, or a remote file path
    pub remote: String,

    /// Also list files that are identical on both sides
    #[arg(long)]
    pub include_identical: bool,
}

impl DiffCommand {
    pub async fn execute(&self, ctx: &Context) -> Result<()> {
        let fmt = ctx.formatter();
        let metadata = tokio::fs::metadata(&self.local)
            .await
            .with_context(|| format!("{} not found", self.local.display()))?;
        let remote = ctx.connect().await?;

        let engine = TreeDiffEngine::new(remote.tree.clone(), Arc::new(Sha1ContentHasher))
            .with_concurrency(ctx.config.sync.diff_concurrency);

        if metadata.is_file() {
            return self.compare_file(ctx, &remote, &engine).await;
        }

        let folder = resolve_path(remote.tree.as_ref(), &self.remote, Some(NodeKind::Folder))
            .await
            .with_context(|| format!("Remote folder {} not found", self.remote))?;

        let diff = engine
            .diff(&self.local, &folder, !self.include_identical)
            .await
            .context("Diff failed")?;

        if ctx.is_json() {
            fmt.print_json(&serde_json::json!({
                "local": self.local,
                "remote": self.remote,
                "converged": diff.is_converged(),
                "summary": diff.summary(),
                "report": diff.report(),
            }));
            return Ok(());
        }

        print!("{diff}");
        let summary = diff.summary();
        if diff.is_converged() {
            fmt.success("Remote folder matches the local directory");
        } else {
            fmt.info(&format!(
                "{} to upload, {} to delete, {} to update across {} directories",
                summary.client_only_files + summary.client_only_folders,
                summary.server_only_files + summary.server_only_folders,
                summary.differing,
                summary.directories
            ));
        }

        Ok(())
    }

    async fn compare_file(&self, ctx: &Context, remote: &Remote, engine: &TreeDiffEngine) -> Result<()> {
        let fmt = ctx.formatter();
        let file = resolve_path(remote.tree.as_ref(), &self.remote, Some(NodeKind::File))
            .await
            .with_context(|| format!("Remote file {} not found", self.remote))?;

        let comparison = engine
            .compare_file(&self.local, &file)
            .await
            .context("Comparison failed")?;

        if ctx.is_json() {
            fmt.print_json(&serde_json::json!({
                "local": self.local,
                "remote": self.remote,
                "identical": comparison.identical,
                "local_sha1": comparison.local_hash,
                "remote_sha1": comparison.remote.content_hash,
            }));
        } else if comparison.identical {
            fmt.success(&format!(
                "{} and {} are identical ({})",
                self.local.display(),
                self.remote,
                comparison.local_hash
            ));
        } else {
            fmt.info(&format!(
                "{} and {} differ",
                self.local.display(),
                self.remote
            ));
            fmt.info(&format!("Local SHA-1:   {}", comparison.local_hash));
            if let Some(hash) = &comparison.remote.content_hash {
                fmt.info(&format!("Remote SHA-1:  {}", hash));
            }
        }
        Ok(())
    }
}
