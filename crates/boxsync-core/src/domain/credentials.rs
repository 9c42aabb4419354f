//! OAuth credentials held by an authenticated session

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Access and refresh token pair with the time it was issued
///
/// A pair is replaced wholesale on every refresh and never partially
/// updated. The issue time drives the refresh-token age policy.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Short-lived bearer token
    pub access_token: String,
    /// Long-lived token used to obtain new access tokens
    pub refresh_token: String,
    /// When this pair was obtained
    pub issued_at: DateTime<Utc>,
}

impl Credentials {
    /// Creates a credential pair issued now
    pub fn issued_now(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            issued_at: Utc::now(),
        }
    }

    /// Age of the pair at `now`
    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        now - self.issued_at
    }

    /// Age of the pair in whole days at `now`
    pub fn age_days_at(&self, now: DateTime<Utc>) -> i64 {
        self.age_at(now).num_days()
    }
}

// Tokens are secrets; keep them out of logs and panic messages.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("issued_at", &self.issued_at)
            .finish()
    }
}
