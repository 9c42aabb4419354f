//! Credential store implementations
//!
//! - [`KeyringCredentialStore`] - OS credential store (GNOME Keyring, KDE Wallet, macOS Keychain)
//! - [`FileCredentialStore`] - One JSON file per account, readable only by the owner
//! - [`MemoryCredentialStore`] - In-process map, nothing survives the process

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use boxsync_core::{domain::Credentials, ports::ICredentialStore};
use tracing::{debug, info};

/// Keyring service name for storing credentials
const KEYRING_SERVICE: &str = "boxsync";

// ============================================================================
// KeyringCredentialStore
// ============================================================================

/// Stores credentials in the system keyring
///
/// Credentials are serialized as JSON under the service name "boxsync" with
/// the account name as the keyring username.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeyringCredentialStore;

impl KeyringCredentialStore {
    fn entry(account: &str) -> Result<keyring::Entry> {
        keyring::Entry::new(KEYRING_SERVICE, account).context("Failed to create keyring entry")
    }
}

impl ICredentialStore for KeyringCredentialStore {
    fn load(&self, account: &str) -> Result<Option<Credentials>> {
        match Self::entry(account)?.get_password() {
            Ok(json) => {
                let credentials: Credentials = serde_json::from_str(&json)
                    .context("Failed to deserialize credentials from keyring")?;
                debug!("Loaded credentials from keyring for account: {}", account);
                Ok(Some(credentials))
            }
            Err(keyring::Error::NoEntry) => {
                debug!("No credentials found in keyring for account: {}", account);
                Ok(None)
            }
            Err(e) => Err(anyhow::Error::new(e).context("Failed to read from keyring")),
        }
    }

    fn save(&self, account: &str, credentials: &Credentials) -> Result<()> {
        let json = serde_json::to_string(credentials).context("Failed to serialize credentials")?;
        Self::entry(account)?
            .set_password(&json)
            .context("Failed to store credentials in keyring")?;
        debug!("Stored credentials in keyring for account: {}", account);
        Ok(())
    }

    fn clear(&self, account: &str) -> Result<()> {
        match Self::entry(account)?.delete_credential() {
            Ok(()) => {
                info!("Cleared credentials from keyring for account: {}", account);
                Ok(())
            }
            Err(keyring::Error::NoEntry) => {
                debug!("No credentials to clear for account: {}", account);
                Ok(())
            }
            Err(e) => Err(anyhow::Error::new(e).context("Failed to delete from keyring")),
        }
    }
}

// ============================================================================
// FileCredentialStore
// ============================================================================

/// Stores each account's credentials as `<dir>/<account>.json`
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    dir: PathBuf,
}

impl FileCredentialStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the credentials file for `account`
    ///
    /// Characters outside `[A-Za-z0-9._-]` are replaced so an account name
    /// can never escape the store directory.
    pub fn path_for(&self, account: &str) -> PathBuf {
        let safe: String = account
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        let safe = safe.trim_start_matches('.');
        let name = if safe.is_empty() { "_" } else { safe };
        self.dir.join(format!("{name}.json"))
    }

    fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
        use std::io::Write;

        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(path)?;
        file.write_all(contents)?;
        file.sync_all()
    }
}

impl ICredentialStore for FileCredentialStore {
    fn load(&self, account: &str) -> Result<Option<Credentials>> {
        let path = self.path_for(account);
        match std::fs::read_to_string(&path) {
            Ok(json) => {
                let credentials = serde_json::from_str(&json)
                    .with_context(|| format!("Failed to parse {}", path.display()))?;
                debug!(path = %path.display(), "Loaded credentials from file");
                Ok(Some(credentials))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(anyhow::Error::new(e).context(format!("Failed to read {}", path.display()))),
        }
    }

    fn save(&self, account: &str, credentials: &Credentials) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;
        let path = self.path_for(account);
        let json = serde_json::to_vec_pretty(credentials).context("Failed to serialize credentials")?;
        Self::write_private(&path, &json)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        debug!(path = %path.display(), "Stored credentials in file");
        Ok(())
    }

    fn clear(&self, account: &str) -> Result<()> {
        let path = self.path_for(account);
        match std::fs::remove_file(&path) {
            Ok(()) => {
                info!(path = %path.display(), "Cleared credentials file");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(anyhow::Error::new(e).context(format!("Failed to remove {}", path.display()))),
        }
    }
}

// ============================================================================
// MemoryCredentialStore
// ============================================================================

/// Keeps credentials in memory only
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    entries: Mutex<HashMap<String, Credentials>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with one account
    pub fn with_entry(account: impl Into<String>, credentials: Credentials) -> Self {
        let store = Self::new();
        if let Ok(mut entries) = store.entries.lock() {
            entries.insert(account.into(), credentials);
        }
        store
    }

    fn entries(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Credentials>>> {
        self.entries
            .lock()
            .map_err(|_| anyhow!("credential store lock poisoned"))
    }
}

impl ICredentialStore for MemoryCredentialStore {
    fn load(&self, account: &str) -> Result<Option<Credentials>> {
        Ok(self.entries()?.get(account).cloned())
    }

    fn save(&self, account: &str, credentials: &Credentials) -> Result<()> {
        self.entries()?
            .insert(account.to_string(), credentials.clone());
        Ok(())
    }

    fn clear(&self, account: &str) -> Result<()> {
        self.entries()?.remove(account);
        Ok(())
    }
}
