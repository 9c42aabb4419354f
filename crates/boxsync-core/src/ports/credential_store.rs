//! Credential persistence port
//!
//! Stores the token pair of each account between runs. Implementations live
//! in `boxsync-api` (system keyring, JSON file, in-memory).

use anyhow::Result;

use crate::domain::Credentials;

/// Persists OAuth credentials per account
pub trait ICredentialStore: Send + Sync {
    /// Loads the credentials for `account`
    ///
    /// # Returns
    /// `Some(Credentials)` if found, `None` if the account has never been stored
    fn load(&self, account: &str) -> Result<Option<Credentials>>;

    /// Stores the credentials for `account`, replacing any previous pair
    fn save(&self, account: &str, credentials: &Credentials) -> Result<()>;

    /// Removes the credentials for `account`; missing entries are not an error
    fn clear(&self, account: &str) -> Result<()>;
}
