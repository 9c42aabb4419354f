//! Auth commands - Login, Logout, and Status for Box authentication
//!
//! Provides the `boxsync auth` CLI subcommands which:
//! 1. `login`  - Runs the OAuth2 authorization code flow (browser or console),
//!    persists the token pair, and shows the account it belongs to.
//! 2. `logout` - Removes the persisted token pair.
//! 3. `status` - Shows the stored token's age and the account it reaches.

use anyhow::{Context as _, Result};
use chrono::Utc;
use clap::Subcommand;
use tracing::info;

use boxsync_api::auth::{BrowserAuthorizationProvider, ConsoleAuthorizationProvider};
use boxsync_api::client::AccountInfo;
use boxsync_core::ports::IAuthorizationCodeProvider;

use crate::context::Context;
use crate::output::{human_size, OutputFormatter};

#[derive(Debug, Subcommand)]
pub enum AuthCommand {
    /// Authenticate with Box via OAuth2
    Login {
        /// Print the authorization URL and read the redirect URL from stdin
        /// instead of opening a browser
        #[arg(long)]
        console: bool,
    },
    /// Remove stored credentials
    Logout,
    /// Check authentication status
    Status,
}

impl AuthCommand {
    pub async fn execute(&self, ctx: &Context) -> Result<()> {
        let fmt = ctx.formatter();
        match self {
            AuthCommand::Login { console } => self.execute_login(ctx, *console, &*fmt).await,
            AuthCommand::Logout => self.execute_logout(ctx, &*fmt).await,
            AuthCommand::Status => self.execute_status(ctx, &*fmt).await,
        }
    }

    /// Execute the login flow:
    /// 1. Obtain an authorization code from the browser or the console
    /// 2. Exchange it and persist the token pair
    /// 3. Fetch the account the tokens belong to
    async fn execute_login(
        &self,
        ctx: &Context,
        console: bool,
        fmt: &dyn OutputFormatter,
    ) -> Result<()> {
        let provider: Box<dyn IAuthorizationCodeProvider> = if console {
            Box::new(ConsoleAuthorizationProvider)
        } else {
            Box::new(BrowserAuthorizationProvider::new(
                ctx.config.auth.redirect_uri.clone(),
            ))
        };

        info!(account = %ctx.account(), console, "Logging in");
        let remote = ctx
            .connect_with(Some(provider.as_ref()))
            .await
            .context("Login failed")?;

        let user = remote
            .client
            .current_user()
            .await
            .context("Failed to fetch account info")?;

        if ctx.is_json() {
            fmt.print_json(&serde_json::json!({
                "authenticated": true,
                "account": ctx.account(),
                "user": user,
                "credential_store": ctx.credential_store_name(),
            }));
        } else {
            fmt.success(&format!("Logged in as {} ({})", user.name, user.login));
            fmt.info(&format!("Credentials saved to the {}", ctx.credential_store_name()));
            print_usage(fmt, &user);
        }

        Ok(())
    }

    async fn execute_logout(&self, ctx: &Context, fmt: &dyn OutputFormatter) -> Result<()> {
        info!(account = %ctx.account(), "Logging out");
        ctx.credential_store()
            .clear(ctx.account())
            .context("Failed to remove stored credentials")?;

        fmt.success("Logged out successfully");
        fmt.info(&format!(
            "Credentials removed from the {}",
            ctx.credential_store_name()
        ));
        Ok(())
    }

    /// Execute status check:
    /// 1. Load the stored token pair and compute its age
    /// 2. Refresh it and fetch the account it belongs to
    async fn execute_status(&self, ctx: &Context, fmt: &dyn OutputFormatter) -> Result<()> {
        let stored = ctx
            .credential_store()
            .load(ctx.account())
            .context("Failed to read stored credentials")?;

        let Some(stored) = stored else {
            if ctx.is_json() {
                fmt.print_json(&serde_json::json!({
                    "authenticated": false,
                    "account": ctx.account(),
                }));
            } else {
                fmt.info("Authentication status: Not configured");
                fmt.info("Run 'boxsync auth login' to authenticate");
            }
            return Ok(());
        };

        let age_days = stored.age_days_at(Utc::now());
        let max_days = ctx.config.auth.max_token_age_days;

        let user = match ctx.connect().await {
            Ok(remote) => remote.client.current_user().await.map_err(anyhow::Error::from),
            Err(e) => Err(e),
        };

        match (user, ctx.is_json()) {
            (Ok(user), true) => fmt.print_json(&serde_json::json!({
                "authenticated": true,
                "account": ctx.account(),
                "token_age_days": age_days,
                "max_token_age_days": max_days,
                "user": user,
            })),
            (Err(e), true) => fmt.print_json(&serde_json::json!({
                "authenticated": false,
                "account": ctx.account(),
                "token_age_days": age_days,
                "max_token_age_days": max_days,
                "error": format!("{e:#}"),
            })),
            (Ok(user), false) => {
                fmt.success(&format!("Authenticated as {} ({})", user.name, user.login));
                fmt.info(&format!("Account:       {}", ctx.account()));
                fmt.info(&format!("Token age:     {} of {} days", age_days, max_days));
                fmt.info(&format!("Stored in:     {}", ctx.credential_store_name()));
                print_usage(fmt, &user);
            }
            (Err(e), false) => {
                fmt.error(&format!("{e:#}"));
                fmt.info(&format!("Token age:     {} of {} days", age_days, max_days));
                fmt.info("Run 'boxsync auth login' to authenticate again");
            }
        }

        Ok(())
    }
}

fn print_usage(fmt: &dyn OutputFormatter, user: &AccountInfo) {
    let percent = if user.space_amount > 0 {
        user.space_used as f64 * 100.0 / user.space_amount as f64
    } else {
        0.0
    };
    fmt.info(&format!(
        "Storage:       {} / {} ({:.1}%)",
        human_size(user.space_used),
        human_size(user.space_amount),
        percent
    ));
}
