//! Authorization-code provider port
//!
//! Obtains an OAuth authorization code out of band, e.g. by opening a
//! browser and waiting for the redirect. The session only checks that the
//! returned `state` matches the one it issued.

use anyhow::Result;
use async_trait::async_trait;

/// Code and anti-forgery state returned by the authorization endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationGrant {
    /// The authorization code
    pub code: String,
    /// The CSRF state parameter echoed back by the server
    pub state: String,
}

/// Drives the user through the authorization URL
#[async_trait]
pub trait IAuthorizationCodeProvider: Send + Sync {
    /// Presents `authorization_url` to the user and returns the grant
    async fn authorize(&self, authorization_url: &str) -> Result<AuthorizationGrant>;
}
