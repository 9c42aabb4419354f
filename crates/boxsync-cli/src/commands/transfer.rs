//! Upload and download commands
//!
//! `upload` pushes a local file or directory into a remote folder, skipping
//! files whose content is already there. `download` mirrors a remote file
//! or folder into a local directory.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context as _, Result};
use clap::Args;

use boxsync_core::domain::NodeKind;
use boxsync_sync::hasher::Sha1ContentHasher;
use boxsync_sync::orchestrator::{SyncOptions, SyncOrchestrator};
use boxsync_sync::resolve::resolve_path;
use boxsync_sync::transfer::download_tree;

use crate::commands::sync::render_report;
use crate::context::Context;
use crate::output::plural;

// ============================================================================
// upload
// ============================================================================

#[derive(Debug, Args)]
pub struct UploadCommand {
    /// Local file or directory
    pub local: PathBuf,

    /// Remote folder to upload into
    #[arg(long, default_value = "/")]
    pub to: String,

    /// Show what would be uploaded without making changes
    #[arg(long)]
    pub dry_run: bool,
}

impl UploadCommand {
    pub async fn execute(&self, ctx: &Context) -> Result<()> {
        let fmt = ctx.formatter();
        if !tokio::fs::try_exists(&self.local).await.unwrap_or(false) {
            bail!("{} does not exist", self.local.display());
        }
        let options = SyncOptions {
            dry_run: self.dry_run,
            ignore: Some(ctx.ignore_rules(&[])?.into_predicate()),
            fail_fast: ctx.config.sync.fail_fast,
        };

        let remote = ctx.connect().await?;
        let folder = resolve_path(remote.tree.as_ref(), &self.to, Some(NodeKind::Folder))
            .await
            .with_context(|| format!("Remote folder {} not found", self.to))?;

        let orchestrator = SyncOrchestrator::new(remote.tree.clone(), Arc::new(Sha1ContentHasher));
        let report = orchestrator
            .upload_path(&self.local, &folder.id, &options)
            .await
            .context("Upload aborted")?;

        render_report(ctx, &*fmt, &report);
        if !report.is_success() {
            bail!(
                "{} upload{} failed",
                report.errors.len(),
                plural(report.errors.len())
            );
        }
        Ok(())
    }
}

// ============================================================================
// download
// ============================================================================

#[derive(Debug, Args)]
pub struct DownloadCommand {
    /// Remote file or folder path
    pub remote: String,

    /// Local directory to download into
    #[arg(long, default_value = ".")]
    pub to: PathBuf,
}

impl DownloadCommand {
    pub async fn execute(&self, ctx: &Context) -> Result<()> {
        let fmt = ctx.formatter();
        let remote = ctx.connect().await?;

        let node = resolve_path(remote.tree.as_ref(), &self.remote, None)
            .await
            .with_context(|| format!("{} not found", self.remote))?;

        match node.kind {
            NodeKind::File => {
                let written = remote
                    .tree
                    .download_file(&node.id, &self.to)
                    .await
                    .with_context(|| format!("Failed to download {}", self.remote))?;

                if ctx.is_json() {
                    fmt.print_json(&serde_json::json!({ "downloaded": [written] }));
                } else {
                    fmt.success(&format!("Downloaded {}", written.display()));
                }
            }
            NodeKind::Folder => {
                let report = download_tree(
                    remote.tree.as_ref(),
                    &Sha1ContentHasher,
                    &node,
                    &self.to,
                )
                .await
                .with_context(|| format!("Failed to download {}", self.remote))?;

                if ctx.is_json() {
                    fmt.print_json(&serde_json::to_value(&report)?);
                } else {
                    let count = report.downloaded.len();
                    fmt.success(&format!(
                        "Downloaded {} file{} into {}",
                        count,
                        plural(count),
                        self.to.join(&node.name).display()
                    ));
                    for path in &report.downloaded {
                        fmt.info(&format!("- {}", path.display()));
                    }
                    if !report.skipped.is_empty() {
                        fmt.info(&format!(
                            "Unchanged: {} file{}",
                            report.skipped.len(),
                            plural(report.skipped.len())
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}
