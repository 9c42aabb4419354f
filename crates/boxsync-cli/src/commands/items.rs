//! Remote tree commands - ls, info, mkdir, rm and mv
//!
//! Remote paths are `/`-separated and start at the account root
//! ("All Files"). Each segment costs one folder listing.

use anyhow::{bail, Context as _, Result};
use clap::{ArgGroup, Args};
use tracing::info;

use boxsync_core::domain::{NodeKind, RemoteNode};
use boxsync_sync::resolve::{ensure_path, resolve_path, segments};

use crate::context::Context;
use crate::output::{human_size, OutputFormatter};

/// Splits a remote path into its parent path and final name
fn split_parent(path: &str) -> Result<(String, String)> {
    let segments = segments(path)?;
    let Some((name, parents)) = segments.split_last() else {
        bail!("{path} is the root folder");
    };
    Ok((format!("/{}", parents.join("/")), name.to_string()))
}

fn print_node(fmt: &dyn OutputFormatter, node: &RemoteNode) {
    let size = node.size.map(human_size).unwrap_or_default();
    let name = match node.kind {
        NodeKind::Folder => format!("{}/", node.name),
        NodeKind::File => node.name.clone(),
    };
    fmt.info(&format!(
        "{:<6} {:>12} {:>10}  {}",
        node.kind.to_string(),
        node.id.as_str(),
        size,
        name
    ));
}

// ============================================================================
// ls
// ============================================================================

#[derive(Debug, Args)]
pub struct LsCommand {
    /// Remote folder path
    #[arg(default_value = "/")]
    pub path: String,
}

impl LsCommand {
    pub async fn execute(&self, ctx: &Context) -> Result<()> {
        let fmt = ctx.formatter();
        let remote = ctx.connect().await?;

        let folder = resolve_path(remote.tree.as_ref(), &self.path, Some(NodeKind::Folder))
            .await
            .with_context(|| format!("Remote folder {} not found", self.path))?;
        let children = remote.tree.list_children(&folder.id).await?;

        if ctx.is_json() {
            fmt.print_json(&serde_json::to_value(&children)?);
            return Ok(());
        }

        fmt.success(&format!("{} ({} items)", self.path, children.len()));
        for child in &children {
            print_node(&*fmt, child);
        }
        Ok(())
    }
}

// ============================================================================
// info
// ============================================================================

#[derive(Debug, Args)]
pub struct InfoCommand {
    /// Remote file or folder path
    pub path: String,
}

impl InfoCommand {
    pub async fn execute(&self, ctx: &Context) -> Result<()> {
        let fmt = ctx.formatter();
        let remote = ctx.connect().await?;

        let found = resolve_path(remote.tree.as_ref(), &self.path, None)
            .await
            .with_context(|| format!("{} not found", self.path))?;
        let node = remote.tree.get_info(&found.id, found.kind).await?;

        if ctx.is_json() {
            fmt.print_json(&serde_json::to_value(&node)?);
            return Ok(());
        }

        fmt.success(&format!("{} ({})", node.name, node.kind));
        fmt.info(&format!("ID:        {}", node.id));
        if let Some(size) = node.size {
            fmt.info(&format!("Size:      {}", human_size(size)));
        }
        if let Some(hash) = &node.content_hash {
            fmt.info(&format!("SHA-1:     {}", hash));
        }
        if let Some(modified) = node.modified_at {
            fmt.info(&format!(
                "Modified:  {}",
                modified.format("%Y-%m-%d %H:%M:%S UTC")
            ));
        }
        if let Some(children) = &node.children {
            fmt.info(&format!("Items:     {}", children.len()));
            for child in children {
                print_node(&*fmt, child);
            }
        }
        Ok(())
    }
}

// ============================================================================
// mkdir
// ============================================================================

#[derive(Debug, Args)]
pub struct MkdirCommand {
    /// Remote folder path to create
    pub path: String,

    /// Create missing parent folders and accept an existing folder
    #[arg(short, long)]
    pub parents: bool,
}

impl MkdirCommand {
    pub async fn execute(&self, ctx: &Context) -> Result<()> {
        let fmt = ctx.formatter();
        let remote = ctx.connect().await?;

        let node = if self.parents {
            ensure_path(remote.tree.as_ref(), &self.path).await?
        } else {
            let (parent_path, name) = split_parent(&self.path)?;
            let parent = resolve_path(remote.tree.as_ref(), &parent_path, Some(NodeKind::Folder))
                .await
                .with_context(|| format!("Parent folder {} not found", parent_path))?;
            remote
                .tree
                .create_folder(&name, &parent.id)
                .await
                .with_context(|| format!("Failed to create {}", self.path))?
        };

        info!(path = %self.path, id = %node.id, "Folder ready");
        if ctx.is_json() {
            fmt.print_json(&serde_json::to_value(&node)?);
        } else {
            fmt.success(&format!("Created {} (id {})", self.path, node.id));
        }
        Ok(())
    }
}

// ============================================================================
// rm
// ============================================================================

#[derive(Debug, Args)]
pub struct RmCommand {
    /// Remote file or folder path
    pub path: String,

    /// Delete a folder together with its contents
    #[arg(short, long)]
    pub recursive: bool,
}

impl RmCommand {
    pub async fn execute(&self, ctx: &Context) -> Result<()> {
        let fmt = ctx.formatter();
        let remote = ctx.connect().await?;

        let node = resolve_path(remote.tree.as_ref(), &self.path, None)
            .await
            .with_context(|| format!("{} not found", self.path))?;
        if node.id.is_root() {
            bail!("Refusing to delete the root folder");
        }

        remote
            .tree
            .delete(&node.id, node.kind, self.recursive)
            .await
            .with_context(|| format!("Failed to delete {}", self.path))?;

        if ctx.is_json() {
            fmt.print_json(&serde_json::json!({
                "deleted": self.path,
                "id": node.id,
                "kind": node.kind,
            }));
        } else {
            fmt.success(&format!("Deleted {} {}", node.kind, self.path));
        }
        Ok(())
    }
}

// ============================================================================
// mv
// ============================================================================

#[derive(Debug, Args)]
#[command(group(ArgGroup::new("change").required(true).multiple(true).args(["name", "into"])))]
pub struct MvCommand {
    /// Remote file or folder path
    pub path: String,

    /// New name
    #[arg(long)]
    pub name: Option<String>,

    /// Destination folder path
    #[arg(long)]
    pub into: Option<String>,
}

impl MvCommand {
    pub async fn execute(&self, ctx: &Context) -> Result<()> {
        let fmt = ctx.formatter();
        let remote = ctx.connect().await?;

        let mut node = resolve_path(remote.tree.as_ref(), &self.path, None)
            .await
            .with_context(|| format!("{} not found", self.path))?;
        if node.id.is_root() {
            bail!("The root folder cannot be moved or renamed");
        }

        if let Some(into) = &self.into {
            let target = resolve_path(remote.tree.as_ref(), into, Some(NodeKind::Folder))
                .await
                .with_context(|| format!("Destination folder {} not found", into))?;
            node = remote.tree.move_to(&node.id, node.kind, &target.id).await?;
        }
        if let Some(name) = &self.name {
            node = remote.tree.rename(&node.id, node.kind, name).await?;
        }

        if ctx.is_json() {
            fmt.print_json(&serde_json::to_value(&node)?);
        } else {
            fmt.success(&format!("Moved {} to {} (id {})", self.path, node.name, node.id));
            if let Some(into) = &self.into {
                fmt.info(&format!("Folder: {}", into));
            }
        }
        Ok(())
    }
}
