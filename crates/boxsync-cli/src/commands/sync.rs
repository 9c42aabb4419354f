//! Sync command - Make a remote folder match a local directory
//!
//! Provides the `boxsync sync` CLI command which:
//! 1. Authenticates with the stored credentials
//! 2. Resolves the remote folder
//! 3. Runs the SyncOrchestrator (diff, then create, upload, delete, update)
//! 4. Displays the applied or planned actions

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context as _, Result};
use clap::Args;
use tracing::info;

use boxsync_core::domain::NodeKind;
use boxsync_sync::hasher::Sha1ContentHasher;
use boxsync_sync::orchestrator::{SyncOptions, SyncOrchestrator, SyncReport};
use boxsync_sync::resolve::resolve_path;

use crate::context::Context;
use crate::output::{plural, OutputFormatter};

#[derive(Debug, Args)]
pub struct SyncCommand {
    /// Local directory to push
    pub local: PathBuf,

    /// Remote folder path, e.g. /Backups/photos
    pub remote: String,

    /// Show what would be done without making changes
    #[arg(long)]
    pub dry_run: bool,

    /// Continue with the remaining actions after one fails
    #[arg(long)]
    pub keep_going: bool,

    /// Skip entries matching this glob, in addition to sync.ignore
    #[arg(long = "ignore", value_name = "GLOB")]
    pub ignore: Vec<String>,
}

impl SyncCommand {
    pub async fn execute(&self, ctx: &Context) -> Result<()> {
        let fmt = ctx.formatter();
        let options = SyncOptions {
            dry_run: self.dry_run,
            ignore: Some(ctx.ignore_rules(&self.ignore)?.into_predicate()),
            fail_fast: ctx.config.sync.fail_fast && !self.keep_going,
        };

        let remote = ctx.connect().await?;
        let folder = resolve_path(remote.tree.as_ref(), &self.remote, Some(NodeKind::Folder))
            .await
            .with_context(|| format!("Remote folder {} not found", self.remote))?;

        info!(local = %self.local.display(), remote = %self.remote, "Starting synchronization");
        if self.dry_run {
            fmt.info("Dry run mode - no changes will be made");
        }

        let orchestrator = SyncOrchestrator::new(remote.tree.clone(), Arc::new(Sha1ContentHasher))
            .with_concurrency(ctx.config.sync.diff_concurrency);
        let report = orchestrator
            .sync(&self.local, &folder, &options)
            .await
            .context("Sync aborted")?;

        render_report(ctx, &*fmt, &report);
        if !report.is_success() {
            bail!(
                "{} action{} failed",
                report.errors.len(),
                plural(report.errors.len())
            );
        }
        Ok(())
    }
}

/// Prints a sync or upload report
pub(crate) fn render_report(ctx: &Context, fmt: &dyn OutputFormatter, report: &SyncReport) {
    if ctx.is_json() {
        fmt.print_json(&serde_json::to_value(report).unwrap_or_default());
        return;
    }

    let duration_display = if report.duration_ms >= 1000 {
        format!("{:.1}s", report.duration_ms as f64 / 1000.0)
    } else {
        format!("{}ms", report.duration_ms)
    };

    let count = report.actions.len();
    if count == 0 && report.errors.is_empty() {
        fmt.success("Already up to date");
    } else if report.dry_run {
        fmt.success(&format!("Would apply {} action{}", count, plural(count)));
    } else {
        fmt.success(&format!(
            "Applied {} action{} in {}",
            count,
            plural(count),
            duration_display
        ));
    }

    for action in &report.actions {
        fmt.info(&format!("- {}", action));
    }
    if !report.skipped.is_empty() {
        fmt.info(&format!(
            "Unchanged: {} file{}",
            report.skipped.len(),
            plural(report.skipped.len())
        ));
    }
    if !report.ignored.is_empty() {
        fmt.info(&format!(
            "Ignored:   {} entr{}",
            report.ignored.len(),
            if report.ignored.len() == 1 { "y" } else { "ies" }
        ));
    }

    if !report.errors.is_empty() {
        fmt.error(&format!(
            "{} error{} occurred:",
            report.errors.len(),
            plural(report.errors.len())
        ));
        for err in &report.errors {
            fmt.info(&format!("  - {}", err));
        }
    }
}
