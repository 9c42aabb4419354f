//! Shared command context
//!
//! Holds the loaded configuration and output settings, and wires the
//! credential store, OAuth flow, session, client and remote tree together
//! for commands that talk to Box.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context as _, Result};
use tracing::info;

use boxsync_api::auth::{OAuth2Config, OAuthFlow};
use boxsync_api::client::BoxClient;
use boxsync_api::provider::BoxRemoteTree;
use boxsync_api::session::{AuthSession, TokenAgePolicy};
use boxsync_api::store::{FileCredentialStore, KeyringCredentialStore};
use boxsync_core::config::Config;
use boxsync_core::ports::{IAuthorizationCodeProvider, ICredentialStore, IRemoteTree};
use boxsync_sync::ignore::IgnoreRules;

use crate::output::{get_formatter, OutputFormat, OutputFormatter};

/// Everything a command needs before it touches the network
pub struct Context {
    pub config: Config,
    pub config_path: PathBuf,
    pub format: OutputFormat,
    pub quiet: bool,
}

/// An authenticated connection to the remote tree
pub struct Remote {
    pub client: Arc<BoxClient>,
    pub tree: Arc<dyn IRemoteTree>,
}

impl Context {
    /// Loads the configuration
    ///
    /// An explicitly given file must exist and parse; the default location
    /// falls back to built-in defaults. `account` overrides `auth.account`.
    pub fn load(
        config_path: Option<&Path>,
        account: Option<&str>,
        format: OutputFormat,
        quiet: bool,
    ) -> Result<Self> {
        let (mut config, config_path) = match config_path {
            Some(path) => {
                let config = Config::load(path).with_context(|| {
                    format!("Failed to load configuration from {}", path.display())
                })?;
                (config, path.to_path_buf())
            }
            None => {
                let path = Config::default_path();
                (Config::load_or_default(&path), path)
            }
        };

        if let Some(account) = account {
            config.auth.account = account.to_string();
        }

        Ok(Self {
            config,
            config_path,
            format,
            quiet,
        })
    }

    pub fn formatter(&self) -> Box<dyn OutputFormatter> {
        get_formatter(self.format, self.quiet)
    }

    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    pub fn account(&self) -> &str {
        &self.config.auth.account
    }

    /// Fails with every validation error found in the configuration
    pub fn validate(&self) -> Result<()> {
        let errors = self.config.validate();
        if errors.is_empty() {
            return Ok(());
        }
        let list: Vec<String> = errors.iter().map(ToString::to_string).collect();
        bail!(
            "Invalid configuration ({}): {}",
            self.config_path.display(),
            list.join("; ")
        )
    }

    /// The credential store selected by `auth.credential_store`
    pub fn credential_store(&self) -> Arc<dyn ICredentialStore> {
        match self.config.auth.credential_store.as_str() {
            "file" => Arc::new(FileCredentialStore::new(
                self.config.auth.credentials_dir.clone(),
            )),
            _ => Arc::new(KeyringCredentialStore),
        }
    }

    /// Human-readable name of the credential store
    pub fn credential_store_name(&self) -> String {
        match self.config.auth.credential_store.as_str() {
            "file" => format!("file store ({})", self.config.auth.credentials_dir.display()),
            _ => "system keyring".to_string(),
        }
    }

    /// Builds an unauthenticated session for the configured account
    pub fn session(&self) -> Result<AuthSession> {
        self.validate()?;
        let oauth = OAuth2Config::from_config(&self.config.auth, &self.config.api)
            .context("Box application credentials are missing")?;
        let flow = OAuthFlow::new(&oauth)?;

        Ok(
            AuthSession::new(self.account(), flow, self.credential_store())
                .with_policy(TokenAgePolicy::from(&self.config.auth)),
        )
    }

    /// Authenticates with stored credentials
    pub async fn connect(&self) -> Result<Remote> {
        self.connect_with(None).await
    }

    /// Authenticates, running an interactive login when `login` is given
    pub async fn connect_with(
        &self,
        login: Option<&dyn IAuthorizationCodeProvider>,
    ) -> Result<Remote> {
        let session = Arc::new(self.session()?);
        let acquired = session.acquire(login).await.with_context(|| {
            format!("Failed to authenticate account '{}'", self.account())
        })?;

        if let Some(days) = acquired.age_warning_days {
            self.formatter().warn(&format!(
                "Refresh token is {} days old and stops working after {} days. Run 'boxsync auth login' to renew it",
                days, self.config.auth.max_token_age_days
            ));
        }

        let client = Arc::new(
            BoxClient::from_config(session, &self.config.api)
                .context("Failed to build the HTTP client")?,
        );
        let tree = BoxRemoteTree::new(client.clone()).with_page_size(self.config.api.page_size);
        info!(account = %self.account(), "Connected");

        Ok(Remote {
            client,
            tree: Arc::new(tree),
        })
    }

    /// Ignore rules from the configuration plus `extra` patterns
    pub fn ignore_rules(&self, extra: &[String]) -> Result<IgnoreRules> {
        let patterns = self.config.sync.ignore.iter().chain(extra);
        IgnoreRules::new(patterns).context("Invalid ignore pattern")
    }
}
