//! Authenticated session for one account
//!
//! [`AuthSession`] owns the current credential pair of an account and is
//! shared by handle (`Arc<AuthSession>`) with every [`BoxClient`] that
//! issues requests on its behalf. It is the only shared mutable state in a
//! sync run.
//!
//! ## Token lifecycle
//!
//! 1. `acquire` reuses in-memory credentials, or loads the persisted pair,
//!    checks its age and exchanges its refresh token for a fresh pair.
//!    With a login provider it runs the authorization-code flow instead.
//! 2. `refresh` replaces the pair wholesale and persists it with the
//!    current timestamp.
//! 3. Refreshes are serialized: concurrent callers that saw the same
//!    rejected token share a single refresh.
//!
//! [`BoxClient`]: crate::client::BoxClient

use std::sync::Arc;

use boxsync_core::{
    config::AuthConfig,
    domain::{Credentials, RemoteError, RemoteResult},
    ports::{IAuthorizationCodeProvider, ICredentialStore},
};
use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};

use crate::auth::OAuthFlow;

// ============================================================================
// TokenAgePolicy
// ============================================================================

/// Age limits for a persisted refresh token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenAgePolicy {
    /// Beyond this the token is rejected and a new login is required
    pub max_age_days: i64,
    /// Beyond this the token is used but a warning is reported
    pub warn_age_days: i64,
}

impl Default for TokenAgePolicy {
    fn default() -> Self {
        Self {
            max_age_days: 60,
            warn_age_days: 10,
        }
    }
}

impl From<&AuthConfig> for TokenAgePolicy {
    fn from(config: &AuthConfig) -> Self {
        Self {
            max_age_days: config.max_token_age_days,
            warn_age_days: config.warn_token_age_days,
        }
    }
}

/// Outcome of [`AuthSession::acquire`]
#[derive(Debug, Clone)]
pub struct AcquiredCredentials {
    pub credentials: Credentials,
    /// Set when the persisted token was older than the warning threshold
    pub age_warning_days: Option<i64>,
}

// ============================================================================
// AuthSession
// ============================================================================

/// Holds and refreshes the credentials of one account
pub struct AuthSession {
    account: String,
    flow: OAuthFlow,
    store: Arc<dyn ICredentialStore>,
    policy: TokenAgePolicy,
    current: RwLock<Option<Credentials>>,
    refresh_lock: Mutex<()>,
}

impl AuthSession {
    /// Creates a session with no credentials loaded yet
    pub fn new(
        account: impl Into<String>,
        flow: OAuthFlow,
        store: Arc<dyn ICredentialStore>,
    ) -> Self {
        Self {
            account: account.into(),
            flow,
            store,
            policy: TokenAgePolicy::default(),
            current: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Sets the refresh-token age policy
    pub fn with_policy(mut self, policy: TokenAgePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Seeds the in-memory credentials without touching the store
    pub fn with_credentials(self, credentials: Credentials) -> Self {
        Self {
            current: RwLock::new(Some(credentials)),
            ..self
        }
    }

    /// The account this session authenticates
    pub fn account(&self) -> &str {
        &self.account
    }

    /// A copy of the current credentials, if any
    pub async fn current(&self) -> Option<Credentials> {
        self.current.read().await.clone()
    }

    /// The bearer token to attach to the next request
    ///
    /// # Errors
    /// [`RemoteError::Configuration`] if the session holds no credentials
    pub async fn access_token(&self) -> RemoteResult<String> {
        self.current
            .read()
            .await
            .as_ref()
            .map(|c| c.access_token.clone())
            .ok_or_else(|| {
                RemoteError::Configuration(format!(
                    "account '{}' is not authenticated",
                    self.account
                ))
            })
    }

    /// Obtains usable credentials for the account
    ///
    /// Without `login`, in-memory credentials are returned unchanged when
    /// present; otherwise the persisted pair is loaded, its age checked and
    /// its refresh token exchanged. With `login`, an authorization code is
    /// obtained from the provider and exchanged.
    ///
    /// # Errors
    /// - [`RemoteError::Configuration`] if nothing is persisted and no login
    ///   was requested, or the persisted token is older than the maximum age
    /// - [`RemoteError::Status`] if the returned CSRF state does not match
    /// - [`RemoteError::TokenExchange`] if the token endpoint fails
    #[instrument(skip(self, login), fields(account = %self.account, relogin = login.is_some()))]
    pub async fn acquire(
        &self,
        login: Option<&dyn IAuthorizationCodeProvider>,
    ) -> RemoteResult<AcquiredCredentials> {
        if let Some(provider) = login {
            let credentials = self.login(provider).await?;
            return Ok(AcquiredCredentials {
                credentials,
                age_warning_days: None,
            });
        }

        if let Some(credentials) = self.current().await {
            info!("Reusing in-memory access token");
            return Ok(AcquiredCredentials {
                credentials,
                age_warning_days: None,
            });
        }

        let stored = self
            .store
            .load(&self.account)
            .map_err(|e| RemoteError::CredentialStore(format!("{e:#}")))?
            .ok_or_else(|| {
                RemoteError::Configuration(format!(
                    "no stored credentials for account '{}', login required",
                    self.account
                ))
            })?;

        let age_warning_days = self.check_age(&stored)?;

        let _guard = self.refresh_lock.lock().await;
        let credentials = self.flow.refresh(&stored.refresh_token).await?;
        self.install(credentials.clone()).await?;

        Ok(AcquiredCredentials {
            credentials,
            age_warning_days,
        })
    }

    /// Exchanges the current refresh token for a new pair
    ///
    /// Every call replaces the previous access token; the new pair is
    /// persisted with the current timestamp.
    #[instrument(skip(self), fields(account = %self.account))]
    pub async fn refresh(&self) -> RemoteResult<Credentials> {
        let _guard = self.refresh_lock.lock().await;
        self.refresh_locked().await
    }

    /// Refreshes unless another caller already replaced `rejected_token`
    ///
    /// Used after a 401: when several requests fail with the same token at
    /// once, only the first performs the exchange and the rest pick up its
    /// result.
    pub async fn refresh_if_stale(&self, rejected_token: &str) -> RemoteResult<String> {
        let _guard = self.refresh_lock.lock().await;

        if let Some(current) = self.current().await {
            if current.access_token != rejected_token {
                debug!("Access token already refreshed by a concurrent request");
                return Ok(current.access_token);
            }
        }

        Ok(self.refresh_locked().await?.access_token)
    }

    /// Forgets the in-memory pair and removes the persisted one
    pub async fn logout(&self) -> RemoteResult<()> {
        *self.current.write().await = None;
        self.store
            .clear(&self.account)
            .map_err(|e| RemoteError::CredentialStore(format!("{e:#}")))
    }

    async fn login(&self, provider: &dyn IAuthorizationCodeProvider) -> RemoteResult<Credentials> {
        info!("Starting OAuth2 authorization code login");

        let (auth_url, csrf_token) = self.flow.authorization_url();
        let grant = provider
            .authorize(&auth_url)
            .await
            .map_err(|e| RemoteError::Configuration(format!("authorization failed: {e:#}")))?;

        if grant.state != *csrf_token.secret() {
            return Err(RemoteError::status(
                "csrf",
                "security token mismatched(CSRF)",
            ));
        }

        let _guard = self.refresh_lock.lock().await;
        let credentials = self.flow.exchange_code(grant.code).await?;
        self.install(credentials.clone()).await?;

        info!("Login completed");
        Ok(credentials)
    }

    /// Caller must hold `refresh_lock`
    async fn refresh_locked(&self) -> RemoteResult<Credentials> {
        let refresh_token = self
            .current()
            .await
            .map(|c| c.refresh_token)
            .ok_or_else(|| {
                RemoteError::Configuration(format!(
                    "account '{}' has no refresh token",
                    self.account
                ))
            })?;

        let credentials = self.flow.refresh(&refresh_token).await?;
        self.install(credentials.clone()).await?;
        Ok(credentials)
    }

    /// Replaces the in-memory pair and persists it
    async fn install(&self, credentials: Credentials) -> RemoteResult<()> {
        *self.current.write().await = Some(credentials.clone());
        self.store
            .save(&self.account, &credentials)
            .map_err(|e| RemoteError::CredentialStore(format!("{e:#}")))
    }

    fn check_age(&self, credentials: &Credentials) -> RemoteResult<Option<i64>> {
        let days = credentials.age_days_at(Utc::now());

        if days > self.policy.max_age_days {
            return Err(RemoteError::Configuration(format!(
                "token expired ({days} days old), re-authentication required"
            )));
        }

        if days > self.policy.warn_age_days {
            warn!(age_days = days, "Refresh token is getting old");
            return Ok(Some(days));
        }

        Ok(None)
    }
}
