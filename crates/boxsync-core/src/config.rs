//! Configuration module for boxsync.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for boxsync.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub auth: AuthConfig,
    pub api: ApiConfig,
    pub sync: SyncConfig,
    pub logging: LoggingConfig,
}

/// Authentication / OAuth settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Box application client ID. `None` until configured.
    pub client_id: Option<String>,
    /// Box application client secret.
    pub client_secret: Option<String>,
    /// Redirect URI registered with the application.
    pub redirect_uri: String,
    /// Account name under which credentials are stored.
    pub account: String,
    /// Where credentials are persisted: `keyring` or `file`.
    pub credential_store: String,
    /// Directory used by the `file` credential store.
    pub credentials_dir: PathBuf,
    /// Refresh tokens older than this are rejected and require a new login.
    pub max_token_age_days: i64,
    /// Refresh tokens older than this still work but produce a warning.
    pub warn_token_age_days: i64,
}

/// Remote REST API endpoints and request settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the content API.
    pub base_url: String,
    /// Base URL of the upload API.
    pub upload_url: String,
    /// OAuth2 authorization endpoint.
    pub auth_url: String,
    /// OAuth2 token endpoint.
    pub token_url: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Number of entries requested per folder listing page.
    pub page_size: u32,
}

/// Synchronization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Glob patterns of local paths (relative to the sync root) to skip.
    pub ignore: Vec<String>,
    /// Maximum number of folder listings fetched concurrently while diffing.
    pub diff_concurrency: usize,
    /// Stop at the first failed action instead of continuing with the rest.
    pub fail_fast: bool,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/boxsync/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("boxsync")
            .join("config.yaml")
    }
}

// ---------------------------------------------------------------------------
// Config::default()
// ---------------------------------------------------------------------------

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            redirect_uri: "http://127.0.0.1:8400/callback".to_string(),
            account: "default".to_string(),
            credential_store: "keyring".to_string(),
            credentials_dir: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("~/.local/share"))
                .join("boxsync")
                .join("credentials"),
            max_token_age_days: 60,
            warn_token_age_days: 10,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.box.com/2.0".to_string(),
            upload_url: "https://upload.box.com/api/2.0".to_string(),
            auth_url: "https://account.box.com/api/oauth2/authorize".to_string(),
            token_url: "https://api.box.com/oauth2/token".to_string(),
            timeout_secs: 60,
            page_size: 1000,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            ignore: Vec::new(),
            diff_concurrency: 4,
            fail_fast: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"api.page_size"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Valid values for `auth.credential_store`.
const VALID_CREDENTIAL_STORES: &[&str] = &["keyring", "file"];

/// Largest page the folder items endpoint accepts.
const MAX_PAGE_SIZE: u32 = 1000;

fn is_http_url(value: &str) -> bool {
    value.starts_with("https://") || value.starts_with("http://")
}

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- auth ---
        if self.auth.account.trim().is_empty() {
            errors.push(ValidationError {
                field: "auth.account".into(),
                message: "must not be empty".into(),
            });
        }
        if !is_http_url(&self.auth.redirect_uri) {
            errors.push(ValidationError {
                field: "auth.redirect_uri".into(),
                message: format!("not an http(s) URL: {}", self.auth.redirect_uri),
            });
        }
        if !VALID_CREDENTIAL_STORES.contains(&self.auth.credential_store.as_str()) {
            errors.push(ValidationError {
                field: "auth.credential_store".into(),
                message: format!(
                    "invalid store '{}'; valid options: {}",
                    self.auth.credential_store,
                    VALID_CREDENTIAL_STORES.join(", ")
                ),
            });
        }
        if self.auth.max_token_age_days <= 0 {
            errors.push(ValidationError {
                field: "auth.max_token_age_days".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.auth.warn_token_age_days <= 0 {
            errors.push(ValidationError {
                field: "auth.warn_token_age_days".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.auth.warn_token_age_days > self.auth.max_token_age_days {
            errors.push(ValidationError {
                field: "auth.warn_token_age_days".into(),
                message: "must not exceed auth.max_token_age_days".into(),
            });
        }

        // --- api ---
        for (field, value) in [
            ("api.base_url", &self.api.base_url),
            ("api.upload_url", &self.api.upload_url),
            ("api.auth_url", &self.api.auth_url),
            ("api.token_url", &self.api.token_url),
        ] {
            if !is_http_url(value) {
                errors.push(ValidationError {
                    field: field.into(),
                    message: format!("not an http(s) URL: {value}"),
                });
            }
        }
        if self.api.timeout_secs == 0 {
            errors.push(ValidationError {
                field: "api.timeout_secs".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.api.page_size == 0 || self.api.page_size > MAX_PAGE_SIZE {
            errors.push(ValidationError {
                field: "api.page_size".into(),
                message: format!("must be in range 1..={MAX_PAGE_SIZE}"),
            });
        }

        // --- sync ---
        if self.sync.diff_concurrency == 0 {
            errors.push(ValidationError {
                field: "sync.diff_concurrency".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use boxsync_core::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .auth_client_id("client-id")
///     .auth_client_secret("client-secret")
///     .sync_ignore(vec!["*.tmp".to_string()])
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- auth ---

    pub fn auth_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.config.auth.client_id = Some(client_id.into());
        self
    }

    pub fn auth_client_secret(mut self, client_secret: impl Into<String>) -> Self {
        self.config.auth.client_secret = Some(client_secret.into());
        self
    }

    pub fn auth_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.config.auth.redirect_uri = uri.into();
        self
    }

    pub fn auth_account(mut self, account: impl Into<String>) -> Self {
        self.config.auth.account = account.into();
        self
    }

    pub fn auth_credential_store(mut self, store: impl Into<String>) -> Self {
        self.config.auth.credential_store = store.into();
        self
    }

    pub fn auth_token_age_days(mut self, warn: i64, max: i64) -> Self {
        self.config.auth.warn_token_age_days = warn;
        self.config.auth.max_token_age_days = max;
        self
    }

    // --- api ---

    /// Points every endpoint at `base`, e.g. a local mock server.
    pub fn api_base(mut self, base: impl Into<String>) -> Self {
        let base = base.into();
        self.config.api.base_url = base.clone();
        self.config.api.upload_url = base.clone();
        self.config.api.auth_url = format!("{base}/oauth2/authorize");
        self.config.api.token_url = format!("{base}/oauth2/token");
        self
    }

    pub fn api_timeout_secs(mut self, seconds: u64) -> Self {
        self.config.api.timeout_secs = seconds;
        self
    }

    pub fn api_page_size(mut self, page_size: u32) -> Self {
        self.config.api.page_size = page_size;
        self
    }

    // --- sync ---

    pub fn sync_ignore(mut self, patterns: Vec<String>) -> Self {
        self.config.sync.ignore = patterns;
        self
    }

    pub fn sync_diff_concurrency(mut self, n: usize) -> Self {
        self.config.sync.diff_concurrency = n;
        self
    }

    pub fn sync_fail_fast(mut self, fail_fast: bool) -> Self {
        self.config.sync.fail_fast = fail_fast;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
