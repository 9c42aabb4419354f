//! OAuth2 authorization code flow for the Box API
//!
//! Box issues a short-lived access token and a long-lived refresh token in
//! exchange for an authorization code. The application authenticates with
//! its client secret, sent in the token request body.
//!
//! ## Components
//!
//! - [`OAuth2Config`] - Client credentials and endpoints
//! - [`OAuthFlow`] - Authorization URL generation and token exchange
//! - [`LocalCallbackServer`] - Minimal HTTP server for the OAuth redirect
//! - [`BrowserAuthorizationProvider`] - Opens the browser and waits for the redirect
//! - [`ConsoleAuthorizationProvider`] - Prints the URL and reads the redirect from stdin

use std::time::Duration;

use anyhow::{bail, Context};
use async_trait::async_trait;
use boxsync_core::{
    config::{ApiConfig, AuthConfig},
    domain::{Credentials, RemoteError, RemoteResult},
    ports::{AuthorizationGrant, IAuthorizationCodeProvider},
};
use oauth2::{
    basic::BasicClient, AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken,
    EndpointNotSet, EndpointSet, RedirectUrl, RefreshToken, TokenResponse, TokenUrl,
};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

/// Default Box OAuth2 authorization endpoint
const AUTH_URL: &str = "https://account.box.com/api/oauth2/authorize";

/// Default Box OAuth2 token endpoint
const TOKEN_URL: &str = "https://api.box.com/oauth2/token";

/// Default redirect URI for the local callback server
const REDIRECT_URI: &str = "http://127.0.0.1:8400/callback";

/// How long the browser flow waits for the redirect
const CALLBACK_TIMEOUT: Duration = Duration::from_secs(300);

// ============================================================================
// OAuth2Config
// ============================================================================

/// Configuration for the OAuth2 authorization code flow
#[derive(Clone)]
pub struct OAuth2Config {
    /// Application client ID
    pub client_id: String,
    /// Application client secret
    pub client_secret: String,
    /// Redirect URI for receiving the authorization code
    pub redirect_uri: String,
    /// Authorization endpoint
    pub auth_url: String,
    /// Token endpoint
    pub token_url: String,
}

impl OAuth2Config {
    /// Creates a new OAuth2Config with the Box endpoints and default redirect
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: REDIRECT_URI.to_string(),
            auth_url: AUTH_URL.to_string(),
            token_url: TOKEN_URL.to_string(),
        }
    }

    /// Builds the flow configuration from the `auth` and `api` config sections
    ///
    /// # Errors
    /// [`RemoteError::Configuration`] if the client ID or secret is missing
    pub fn from_config(auth: &AuthConfig, api: &ApiConfig) -> RemoteResult<Self> {
        let client_id = auth.client_id.clone().ok_or_else(|| {
            RemoteError::Configuration("auth.client_id is not configured".to_string())
        })?;
        let client_secret = auth.client_secret.clone().ok_or_else(|| {
            RemoteError::Configuration("auth.client_secret is not configured".to_string())
        })?;

        Ok(Self::new(client_id, client_secret)
            .with_redirect_uri(auth.redirect_uri.clone())
            .with_endpoints(api.auth_url.clone(), api.token_url.clone()))
    }

    /// Creates a config with a custom redirect URI
    pub fn with_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uri = uri.into();
        self
    }

    /// Creates a config with custom authorization and token endpoints
    pub fn with_endpoints(mut self, auth_url: impl Into<String>, token_url: impl Into<String>) -> Self {
        self.auth_url = auth_url.into();
        self.token_url = token_url.into();
        self
    }
}

impl std::fmt::Debug for OAuth2Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuth2Config")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri)
            .field("auth_url", &self.auth_url)
            .field("token_url", &self.token_url)
            .finish()
    }
}

// ============================================================================
// OAuthFlow
// ============================================================================

/// OAuth2 code and refresh-token exchange using the `oauth2` crate
pub struct OAuthFlow {
    client: BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>,
    http: reqwest::Client,
}

impl OAuthFlow {
    /// Creates a new OAuthFlow with the given configuration
    pub fn new(config: &OAuth2Config) -> RemoteResult<Self> {
        let invalid = |what: &str, e: oauth2::url::ParseError| {
            RemoteError::Configuration(format!("Invalid {what}: {e}"))
        };

        let client = BasicClient::new(ClientId::new(config.client_id.clone()))
            .set_client_secret(ClientSecret::new(config.client_secret.clone()))
            .set_auth_type(AuthType::RequestBody)
            .set_auth_uri(
                AuthUrl::new(config.auth_url.clone())
                    .map_err(|e| invalid("authorization URL", e))?,
            )
            .set_token_uri(
                TokenUrl::new(config.token_url.clone()).map_err(|e| invalid("token URL", e))?,
            )
            .set_redirect_uri(
                RedirectUrl::new(config.redirect_uri.clone())
                    .map_err(|e| invalid("redirect URI", e))?,
            );

        // The token endpoint must not be followed through redirects
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        Ok(Self { client, http })
    }

    /// Generates an authorization URL with a fresh CSRF state token
    ///
    /// # Returns
    /// A tuple of `(authorization_url, csrf_token)`. The token must be
    /// compared with the `state` returned by the redirect.
    pub fn authorization_url(&self) -> (String, CsrfToken) {
        let (auth_url, csrf_token) = self.client.authorize_url(CsrfToken::new_random).url();
        debug!("Generated authorization URL");
        (auth_url.to_string(), csrf_token)
    }

    /// Exchanges an authorization code for credentials
    pub async fn exchange_code(&self, code: String) -> RemoteResult<Credentials> {
        info!("Exchanging authorization code for tokens");

        let token_result = self
            .client
            .exchange_code(AuthorizationCode::new(code))
            .request_async(&self.http)
            .await
            .map_err(|e| RemoteError::TokenExchange(e.to_string()))?;

        let refresh_token = token_result
            .refresh_token()
            .map(|t| t.secret().to_string())
            .ok_or_else(|| {
                RemoteError::TokenExchange("token response has no refresh_token".to_string())
            })?;

        info!("Successfully obtained OAuth tokens");
        Ok(Credentials::issued_now(
            token_result.access_token().secret().to_string(),
            refresh_token,
        ))
    }

    /// Exchanges a refresh token for a new access/refresh pair
    ///
    /// Box rotates refresh tokens on every use; if the response carries
    /// none, the previous one is kept.
    pub async fn refresh(&self, refresh_token: &str) -> RemoteResult<Credentials> {
        info!("Refreshing access token");

        let token_result = self
            .client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(&self.http)
            .await
            .map_err(|e| RemoteError::TokenExchange(e.to_string()))?;

        let credentials = Credentials::issued_now(
            token_result.access_token().secret().to_string(),
            token_result
                .refresh_token()
                .map(|t| t.secret().to_string())
                .unwrap_or_else(|| refresh_token.to_string()),
        );

        info!("Successfully refreshed access token");
        Ok(credentials)
    }
}

// ============================================================================
// LocalCallbackServer
// ============================================================================

/// Result of inspecting one redirect request
#[derive(Debug, PartialEq, Eq)]
enum CallbackOutcome {
    /// The redirect carried an authorization code
    Grant(AuthorizationGrant),
    /// The user denied access or the server reported an error
    Denied(String),
    /// Unrelated request (e.g. favicon)
    Ignored,
}

/// Minimal HTTP server that listens for the OAuth2 redirect callback.
///
/// Binds the host and port of the redirect URI, answers each request with a
/// small HTML page and resolves once a request carrying an authorization
/// code (or an error) arrives.
pub struct LocalCallbackServer {
    listener: TcpListener,
}

impl LocalCallbackServer {
    /// Binds the listener for `redirect_uri`
    ///
    /// Binding happens before the browser is opened so the redirect cannot
    /// arrive before the server is listening.
    pub async fn bind(redirect_uri: &str) -> anyhow::Result<Self> {
        let url = url::Url::parse(redirect_uri).context("Invalid redirect URI")?;
        let host = url.host_str().unwrap_or("127.0.0.1").to_string();
        let port = url.port_or_known_default().unwrap_or(80);

        let listener = TcpListener::bind((host.as_str(), port))
            .await
            .with_context(|| format!("Failed to bind callback server to {host}:{port}"))?;

        info!(host = %host, port, "Local OAuth callback server listening");
        Ok(Self { listener })
    }

    /// Returns the bound port
    pub fn port(&self) -> anyhow::Result<u16> {
        Ok(self.listener.local_addr()?.port())
    }

    /// Serves connections until a redirect with a code or an error arrives
    pub async fn wait_for_grant(self) -> anyhow::Result<AuthorizationGrant> {
        use http_body_util::Full;
        use hyper::body::Bytes;
        use hyper::header::{HeaderValue, CONTENT_TYPE};
        use hyper::server::conn::http1;
        use hyper::service::service_fn;
        use hyper::{Request, Response, StatusCode};
        use hyper_util::rt::TokioIo;
        use tokio::sync::{mpsc, Mutex};

        let (tx, mut rx) = mpsc::channel::<Result<AuthorizationGrant, String>>(1);
        let tx = std::sync::Arc::new(Mutex::new(Some(tx)));

        loop {
            let (stream, _addr) = tokio::select! {
                outcome = rx.recv() => {
                    return match outcome {
                        Some(Ok(grant)) => {
                            info!("Received OAuth callback with authorization code");
                            Ok(grant)
                        }
                        Some(Err(reason)) => bail!("Authorization was denied: {reason}"),
                        None => bail!("Callback server closed without receiving a redirect"),
                    };
                }
                accepted = self.listener.accept() => {
                    accepted.context("Failed to accept connection on callback server")?
                }
            };

            let io = TokioIo::new(stream);
            let tx = tx.clone();

            let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                let tx = tx.clone();
                async move {
                    let uri = req.uri().to_string();
                    debug!("Callback server received request: {}", uri);

                    let (status, html, outcome) = match parse_callback_uri(&uri) {
                        CallbackOutcome::Grant(grant) => {
                            (StatusCode::OK, success_html(), Some(Ok(grant)))
                        }
                        CallbackOutcome::Denied(reason) => {
                            (StatusCode::BAD_REQUEST, error_html(&reason), Some(Err(reason)))
                        }
                        CallbackOutcome::Ignored => (
                            StatusCode::NOT_FOUND,
                            error_html("Missing authorization code in callback"),
                            None,
                        ),
                    };

                    if let Some(outcome) = outcome {
                        if let Some(sender) = tx.lock().await.take() {
                            let _ = sender.send(outcome).await;
                        }
                    }

                    let mut response = Response::new(Full::new(Bytes::from(html)));
                    *response.status_mut() = status;
                    response.headers_mut().insert(
                        CONTENT_TYPE,
                        HeaderValue::from_static("text/html; charset=utf-8"),
                    );
                    Ok::<_, hyper::Error>(response)
                }
            });

            tokio::spawn(async move {
                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    warn!("Callback server connection error: {}", e);
                }
            });
        }
    }
}

/// Extracts the authorization outcome from a redirect URI
///
/// Accepts both the request target seen by the server (`/callback?code=..`)
/// and a full URL pasted by the user.
fn parse_callback_uri(uri: &str) -> CallbackOutcome {
    let absolute = if uri.starts_with('/') {
        format!("http://localhost{uri}")
    } else {
        uri.trim().to_string()
    };
    let Ok(url) = url::Url::parse(&absolute) else {
        return CallbackOutcome::Ignored;
    };

    let mut code = None;
    let mut state = None;
    let mut error = None;
    let mut error_description = None;

    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.to_string()),
            "state" => state = Some(value.to_string()),
            "error" => error = Some(value.to_string()),
            "error_description" => error_description = Some(value.to_string()),
            _ => {}
        }
    }

    match (code, error) {
        (Some(code), _) => CallbackOutcome::Grant(AuthorizationGrant {
            code,
            state: state.unwrap_or_default(),
        }),
        (None, Some(error)) => CallbackOutcome::Denied(match error_description {
            Some(description) => format!("{error}({description})"),
            None => error,
        }),
        (None, None) => CallbackOutcome::Ignored,
    }
}

/// Returns the HTML for a successful authentication page
fn success_html() -> String {
    r#"<!DOCTYPE html>
<html>
<head><title>boxsync - Authentication Successful</title></head>
<body style="font-family: sans-serif; text-align: center; padding-top: 50px;">
    <h1>Authentication Successful</h1>
    <p>boxsync has been authorized to access your Box account.</p>
    <p>You can close this window and return to the terminal.</p>
</body>
</html>"#
        .to_string()
}

/// Returns the HTML for an authentication error page
fn error_html(message: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><title>boxsync - Authentication Error</title></head>
<body style="font-family: sans-serif; text-align: center; padding-top: 50px;">
    <h1>Authentication Error</h1>
    <p>{}</p>
    <p>Please close this window and try again.</p>
</body>
</html>"#,
        message
    )
}

// ============================================================================
// Authorization-code providers
// ============================================================================

/// Opens the system browser and captures the redirect on a local server
pub struct BrowserAuthorizationProvider {
    redirect_uri: String,
    timeout: Duration,
}

impl BrowserAuthorizationProvider {
    pub fn new(redirect_uri: impl Into<String>) -> Self {
        Self {
            redirect_uri: redirect_uri.into(),
            timeout: CALLBACK_TIMEOUT,
        }
    }

    /// Overrides how long to wait for the redirect
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl IAuthorizationCodeProvider for BrowserAuthorizationProvider {
    async fn authorize(&self, authorization_url: &str) -> anyhow::Result<AuthorizationGrant> {
        let server = LocalCallbackServer::bind(&self.redirect_uri).await?;

        info!("Opening browser for authentication");
        if let Err(e) = webbrowser::open(authorization_url) {
            warn!(error = %e, "Failed to open browser");
            eprintln!("Open this URL in a browser to continue:\n{authorization_url}");
        }

        tokio::time::timeout(self.timeout, server.wait_for_grant())
            .await
            .context("Timed out waiting for the OAuth redirect")?
    }
}

/// Prints the authorization URL and reads the redirect URL from stdin
///
/// For hosts without a browser: the user completes the login elsewhere and
/// pastes the URL the browser was redirected to.
pub struct ConsoleAuthorizationProvider;

#[async_trait]
impl IAuthorizationCodeProvider for ConsoleAuthorizationProvider {
    async fn authorize(&self, authorization_url: &str) -> anyhow::Result<AuthorizationGrant> {
        use tokio::io::{AsyncBufReadExt, BufReader};

        eprintln!("Open this URL in a browser and authorize boxsync:\n{authorization_url}\n");
        eprintln!("Then paste the full URL you were redirected to:");

        let mut line = String::new();
        BufReader::new(tokio::io::stdin())
            .read_line(&mut line)
            .await
            .context("Failed to read redirect URL from stdin")?;

        match parse_callback_uri(&line) {
            CallbackOutcome::Grant(grant) => Ok(grant),
            CallbackOutcome::Denied(reason) => bail!("Authorization was denied: {reason}"),
            CallbackOutcome::Ignored => bail!("No authorization code found in the pasted URL"),
        }
    }
}
