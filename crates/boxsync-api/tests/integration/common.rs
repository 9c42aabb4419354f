//! Shared test helpers for Box API integration tests
//!
//! Each helper starts a wiremock server that stands in for the Box API, the
//! upload host and the OAuth2 token endpoint at once, and returns a client
//! wired to it.

use std::sync::Arc;
use std::time::Duration;

use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use boxsync_api::auth::{OAuth2Config, OAuthFlow};
use boxsync_api::client::BoxClient;
use boxsync_api::session::AuthSession;
use boxsync_api::store::MemoryCredentialStore;
use boxsync_core::domain::Credentials;

pub const ACCOUNT: &str = "default";
pub const INITIAL_ACCESS: &str = "initial-access";
pub const INITIAL_REFRESH: &str = "initial-refresh";
pub const FRESH_ACCESS: &str = "fresh-access";
pub const FRESH_REFRESH: &str = "fresh-refresh";

/// A mock server and everything wired to it
pub struct TestEnv {
    pub server: MockServer,
    pub store: Arc<MemoryCredentialStore>,
    pub session: Arc<AuthSession>,
    pub client: Arc<BoxClient>,
}

fn oauth_config(server: &MockServer) -> OAuth2Config {
    OAuth2Config::new("test-client", "test-secret").with_endpoints(
        format!("{}/oauth2/authorize", server.uri()),
        format!("{}/oauth2/token", server.uri()),
    )
}

async fn build_env(credentials: Option<Credentials>, store: MemoryCredentialStore) -> TestEnv {
    let server = MockServer::start().await;
    let store = Arc::new(store);

    let flow = OAuthFlow::new(&oauth_config(&server)).expect("valid oauth config");
    let mut session = AuthSession::new(ACCOUNT, flow, store.clone());
    if let Some(credentials) = credentials {
        session = session.with_credentials(credentials);
    }
    let session = Arc::new(session);

    let client = BoxClient::with_endpoints(
        session.clone(),
        server.uri(),
        server.uri(),
        Duration::from_secs(10),
    )
    .expect("http client");
    let client = Arc::new(client);

    TestEnv {
        server,
        store,
        session,
        client,
    }
}

/// Sets up a client whose session already holds `initial-access`
pub async fn setup_box_mock() -> TestEnv {
    build_env(
        Some(Credentials::issued_now(INITIAL_ACCESS, INITIAL_REFRESH)),
        MemoryCredentialStore::new(),
    )
    .await
}

/// Sets up a client with no in-memory credentials and the given store
pub async fn setup_with_store(store: MemoryCredentialStore) -> TestEnv {
    build_env(None, store).await
}

/// Token endpoint response carrying the fresh pair
pub fn token_response() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "access_token": FRESH_ACCESS,
        "refresh_token": FRESH_REFRESH,
        "token_type": "bearer",
        "expires_in": 3600
    }))
}

/// Mounts the token endpoint for refresh-token grants, expecting `times` calls
pub async fn mount_refresh_endpoint(server: &MockServer, times: u64) {
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(token_response())
        .expect(times)
        .mount(server)
        .await;
}

/// A Box folder item
pub fn folder_json(id: &str, name: &str) -> serde_json::Value {
    serde_json::json!({ "type": "folder", "id": id, "name": name })
}

/// A Box file item
pub fn file_json(id: &str, name: &str, sha1: &str) -> serde_json::Value {
    serde_json::json!({ "type": "file", "id": id, "name": name, "sha1": sha1, "size": 11 })
}
