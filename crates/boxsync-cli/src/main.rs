//! boxsync CLI - Command-line interface for boxsync
//!
//! Provides commands for:
//! - Authentication with Box
//! - Comparing and one-way syncing a local directory onto a remote folder
//! - Browsing and editing the remote tree
//! - Uploading and downloading files and folders

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod context;
mod output;

use commands::{
    auth::AuthCommand,
    completions::CompletionsCommand,
    config::ConfigCommand,
    diff::DiffCommand,
    items::{InfoCommand, LsCommand, MkdirCommand, MvCommand, RmCommand},
    sync::SyncCommand,
    transfer::{DownloadCommand, UploadCommand},
};
use context::Context;
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(name = "boxsync", version, about = "One-way sync of local directories onto Box")]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Account whose credentials are used, overriding auth.account
    #[arg(long, global = true)]
    account: Option<String>,

    /// Minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Emit log records as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Authentication commands
    #[command(subcommand)]
    Auth(AuthCommand),
    /// Compare a local directory with a remote folder
    Diff(DiffCommand),
    /// Make a remote folder match a local directory
    Sync(SyncCommand),
    /// List a remote folder
    Ls(LsCommand),
    /// Show details of a remote file or folder
    Info(InfoCommand),
    /// Create a remote folder
    Mkdir(MkdirCommand),
    /// Delete a remote file or folder
    Rm(RmCommand),
    /// Rename or move a remote file or folder
    Mv(MvCommand),
    /// Upload a local file or directory
    Upload(UploadCommand),
    /// Download a remote file or folder
    Download(DownloadCommand),
    /// View and validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Generate shell completions
    Completions(CompletionsCommand),
}

/// Installs the global subscriber
///
/// `RUST_LOG` wins over the flags, which win over `logging.level`.
fn init_tracing(cli: &Cli, config_level: &str) {
    let filter = match (cli.verbose, cli.quiet) {
        (0, true) => "error",
        (0, false) => config_level,
        (1, _) => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if cli.log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };
    let ctx = Context::load(cli.config.as_deref(), cli.account.as_deref(), format, cli.quiet)?;

    init_tracing(&cli, &ctx.config.logging.level);

    match cli.command {
        Commands::Auth(cmd) => cmd.execute(&ctx).await,
        Commands::Diff(cmd) => cmd.execute(&ctx).await,
        Commands::Sync(cmd) => cmd.execute(&ctx).await,
        Commands::Ls(cmd) => cmd.execute(&ctx).await,
        Commands::Info(cmd) => cmd.execute(&ctx).await,
        Commands::Mkdir(cmd) => cmd.execute(&ctx).await,
        Commands::Rm(cmd) => cmd.execute(&ctx).await,
        Commands::Mv(cmd) => cmd.execute(&ctx).await,
        Commands::Upload(cmd) => cmd.execute(&ctx).await,
        Commands::Download(cmd) => cmd.execute(&ctx).await,
        Commands::Config(cmd) => cmd.execute(&ctx).await,
        Commands::Completions(cmd) => cmd.execute(&ctx).await,
    }
}
