//! Session tests: acquiring persisted credentials, age policy and login

use async_trait::async_trait;
use chrono::{Duration, Utc};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, ResponseTemplate};

use boxsync_api::store::MemoryCredentialStore;
use boxsync_core::domain::{Credentials, RemoteError};
use boxsync_core::ports::{AuthorizationGrant, IAuthorizationCodeProvider, ICredentialStore};

use crate::common::*;

fn stored(days_old: i64) -> Credentials {
    Credentials {
        access_token: "stored-access".to_string(),
        refresh_token: "stored-refresh".to_string(),
        issued_at: Utc::now() - Duration::days(days_old) - Duration::minutes(5),
    }
}

/// Completes the authorization step without a browser
struct FakeProvider {
    /// Replaces the echoed state when set
    forged_state: Option<String>,
}

#[async_trait]
impl IAuthorizationCodeProvider for FakeProvider {
    async fn authorize(&self, authorization_url: &str) -> anyhow::Result<AuthorizationGrant> {
        let url = url::Url::parse(authorization_url)?;
        let state = url
            .query_pairs()
            .find(|(k, _)| k == "state")
            .map(|(_, v)| v.into_owned())
            .unwrap_or_default();

        Ok(AuthorizationGrant {
            code: "the-code".to_string(),
            state: self.forged_state.clone().unwrap_or(state),
        })
    }
}

#[tokio::test]
async fn test_acquire_exchanges_persisted_refresh_token() {
    let env = setup_with_store(MemoryCredentialStore::with_entry(ACCOUNT, stored(1))).await;

    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .and(body_string_contains("refresh_token=stored-refresh"))
        .respond_with(token_response())
        .expect(1)
        .mount(&env.server)
        .await;

    let acquired = env.session.acquire(None).await.unwrap();
    assert_eq!(acquired.credentials.access_token, FRESH_ACCESS);
    assert!(acquired.age_warning_days.is_none());

    let persisted = env.store.load(ACCOUNT).unwrap().unwrap();
    assert_eq!(persisted.refresh_token, FRESH_REFRESH);
    assert!(Utc::now() - persisted.issued_at < Duration::minutes(1));

    // A second acquire reuses the in-memory token
    let again = env.session.acquire(None).await.unwrap();
    assert_eq!(again.credentials.access_token, FRESH_ACCESS);
}

#[tokio::test]
async fn test_acquire_warns_on_old_token() {
    let env = setup_with_store(MemoryCredentialStore::with_entry(ACCOUNT, stored(15))).await;
    mount_refresh_endpoint(&env.server, 1).await;

    let acquired = env.session.acquire(None).await.unwrap();
    assert_eq!(acquired.age_warning_days, Some(15));
}

#[tokio::test]
async fn test_acquire_rejects_expired_token_without_network() {
    let env = setup_with_store(MemoryCredentialStore::with_entry(ACCOUNT, stored(61))).await;
    mount_refresh_endpoint(&env.server, 0).await;

    let err = env.session.acquire(None).await.unwrap_err();
    assert!(matches!(err, RemoteError::Configuration(_)));
    assert!(err.to_string().contains("re-authentication required"));
}

#[tokio::test]
async fn test_refresh_failure_is_surfaced() {
    let env = setup_with_store(MemoryCredentialStore::with_entry(ACCOUNT, stored(1))).await;

    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "invalid_grant",
            "error_description": "Refresh token has expired"
        })))
        .expect(1)
        .mount(&env.server)
        .await;

    let err = env.session.acquire(None).await.unwrap_err();
    assert!(matches!(err, RemoteError::TokenExchange(_)), "got {err:?}");
    // Nothing was replaced
    assert_eq!(
        env.store.load(ACCOUNT).unwrap().unwrap().refresh_token,
        "stored-refresh"
    );
}

#[tokio::test]
async fn test_login_exchanges_code() {
    let env = setup_with_store(MemoryCredentialStore::new()).await;

    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=the-code"))
        .respond_with(token_response())
        .expect(1)
        .mount(&env.server)
        .await;

    let provider = FakeProvider { forged_state: None };
    let acquired = env.session.acquire(Some(&provider)).await.unwrap();
    assert_eq!(acquired.credentials.access_token, FRESH_ACCESS);
    assert!(env.store.load(ACCOUNT).unwrap().is_some());
}

#[tokio::test]
async fn test_login_state_mismatch_is_rejected() {
    let env = setup_with_store(MemoryCredentialStore::new()).await;

    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(token_response())
        .expect(0)
        .mount(&env.server)
        .await;

    let provider = FakeProvider {
        forged_state: Some("forged".to_string()),
    };
    let err = env.session.acquire(Some(&provider)).await.unwrap_err();
    match err {
        RemoteError::Status { message, .. } => {
            assert_eq!(message, "security token mismatched(CSRF)");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(env.store.load(ACCOUNT).unwrap().is_none());
}

#[tokio::test]
async fn test_logout_clears_store() {
    let env = setup_with_store(MemoryCredentialStore::with_entry(ACCOUNT, stored(1))).await;
    env.session.logout().await.unwrap();
    assert!(env.store.load(ACCOUNT).unwrap().is_none());
}
