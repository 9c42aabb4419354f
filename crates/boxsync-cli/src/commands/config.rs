//! Config command - View and validate boxsync configuration
//!
//! Provides the `boxsync config` CLI command which:
//! 1. Shows the effective configuration (YAML or JSON), secret redacted
//! 2. Validates the configuration file and reports errors
//! 3. Prints the configuration file location

use anyhow::{bail, Context as _, Result};
use clap::Subcommand;

use boxsync_core::config::Config;

use crate::context::Context;

const REDACTED: &str = "********";

/// Config subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display the effective configuration
    Show,
    /// Validate the configuration
    Validate,
    /// Print the configuration file path
    Path,
}

impl ConfigCommand {
    pub async fn execute(&self, ctx: &Context) -> Result<()> {
        match self {
            ConfigCommand::Show => self.execute_show(ctx),
            ConfigCommand::Validate => self.execute_validate(ctx),
            ConfigCommand::Path => {
                let fmt = ctx.formatter();
                if ctx.is_json() {
                    fmt.print_json(&serde_json::json!({
                        "path": ctx.config_path,
                        "exists": ctx.config_path.exists(),
                    }));
                } else {
                    println!("{}", ctx.config_path.display());
                }
                Ok(())
            }
        }
    }

    fn execute_show(&self, ctx: &Context) -> Result<()> {
        let fmt = ctx.formatter();
        let config = redacted(&ctx.config);

        if ctx.is_json() {
            let json = serde_json::to_value(&config)
                .context("Failed to serialize configuration to JSON")?;
            fmt.print_json(&json);
        } else {
            fmt.success(&format!("Configuration ({})", ctx.config_path.display()));
            fmt.info("");

            let yaml = serde_yaml::to_string(&config)
                .context("Failed to serialize configuration to YAML")?;

            for line in yaml.lines() {
                fmt.info(line);
            }
        }

        Ok(())
    }

    fn execute_validate(&self, ctx: &Context) -> Result<()> {
        let fmt = ctx.formatter();
        let errors = ctx.config.validate();
        let mut messages: Vec<String> = errors.iter().map(ToString::to_string).collect();

        if ctx.config.auth.client_id.is_none() {
            messages.push("auth.client_id: not configured".to_string());
        }
        if ctx.config.auth.client_secret.is_none() {
            messages.push("auth.client_secret: not configured".to_string());
        }

        if ctx.is_json() {
            fmt.print_json(&serde_json::json!({
                "valid": messages.is_empty(),
                "path": ctx.config_path,
                "errors": messages,
            }));
        } else if messages.is_empty() {
            fmt.success(&format!(
                "Configuration is valid ({})",
                ctx.config_path.display()
            ));
        } else {
            for message in &messages {
                fmt.error(message);
            }
        }

        if !messages.is_empty() {
            bail!("Configuration has {} problem(s)", messages.len());
        }
        Ok(())
    }
}

/// A copy of `config` with the client secret masked
fn redacted(config: &Config) -> Config {
    let mut config = config.clone();
    if config.auth.client_secret.is_some() {
        config.auth.client_secret = Some(REDACTED.to_string());
    }
    config
}
