//! Box REST API request executor
//!
//! [`BoxClient`] attaches the session's bearer token to every request,
//! classifies error statuses into [`RemoteError`] kinds and retries exactly
//! once after refreshing the token when the service answers 401.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use boxsync_api::client::{ApiRequest, BoxClient};
//! # use boxsync_api::session::AuthSession;
//!
//! # async fn example(session: Arc<AuthSession>) -> boxsync_core::domain::RemoteResult<()> {
//! let client = BoxClient::new(session)?;
//! let folder = client
//!     .execute(&ApiRequest::get(client.api_url("/folders/0")))
//!     .await?
//!     .into_json()?;
//! println!("{}", folder["name"]);
//! # Ok(())
//! # }
//! ```

use std::{sync::Arc, time::Duration};

use boxsync_core::{
    config::ApiConfig,
    domain::{RemoteError, RemoteResult},
};
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    multipart::{Form, Part},
    Client, Method, Response, StatusCode,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::session::AuthSession;

/// Base URL for Box API v2.0
const BOX_BASE_URL: &str = "https://api.box.com/2.0";

/// Base URL for Box uploads
const BOX_UPLOAD_URL: &str = "https://upload.box.com/api/2.0";

/// Request timeout used when none is configured
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

// ============================================================================
// Request and response types
// ============================================================================

/// Body of an [`ApiRequest`]
///
/// Bodies are kept as owned data rather than a `reqwest::Body` so the exact
/// same request can be rebuilt for the retry after a token refresh.
#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(Value),
    Multipart(MultipartBody),
}

/// A multipart upload: JSON attributes followed by the file part
#[derive(Clone)]
pub struct MultipartBody {
    pub attributes: Value,
    pub file_name: String,
    pub content: Vec<u8>,
}

impl std::fmt::Debug for MultipartBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultipartBody")
            .field("attributes", &self.attributes)
            .field("file_name", &self.file_name)
            .field("content_len", &self.content.len())
            .finish()
    }
}

impl MultipartBody {
    fn to_form(&self) -> Form {
        // Box requires the attributes part to precede the file part
        Form::new()
            .text("attributes", self.attributes.to_string())
            .part(
                "file",
                Part::bytes(self.content.clone()).file_name(self.file_name.clone()),
            )
    }
}

/// A fully described API call, replayable as-is
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: RequestBody,
}

impl ApiRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::PUT, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::DELETE, url)
    }

    /// Appends a query parameter
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Adds a header
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sets a JSON body
    pub fn json(mut self, body: Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    /// Sets a multipart upload body
    pub fn multipart(mut self, body: MultipartBody) -> Self {
        self.body = RequestBody::Multipart(body);
        self
    }
}

/// Parsed outcome of [`BoxClient::execute`]
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResponse {
    /// HTTP 204
    NoContent,
    Json(Value),
}

impl ApiResponse {
    /// Returns the JSON body
    ///
    /// # Errors
    /// [`RemoteError::Status`] if the response had no content
    pub fn into_json(self) -> RemoteResult<Value> {
        match self {
            ApiResponse::Json(value) => Ok(value),
            ApiResponse::NoContent => Err(RemoteError::Status {
                code: None,
                message: "expected a JSON body, got no content".to_string(),
            }),
        }
    }

    /// Deserializes the JSON body into `T`
    pub fn parse<T: DeserializeOwned>(self) -> RemoteResult<T> {
        let value = self.into_json()?;
        serde_json::from_value(value).map_err(|e| RemoteError::Status {
            code: None,
            message: format!("unexpected response shape: {e}"),
        })
    }
}

/// The authenticated user and their storage usage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub login: String,
    /// Total space in bytes
    #[serde(default)]
    pub space_amount: u64,
    /// Used space in bytes
    #[serde(default)]
    pub space_used: u64,
}

// ============================================================================
// BoxClient
// ============================================================================

/// HTTP client for Box API calls
pub struct BoxClient {
    http: Client,
    base_url: String,
    upload_url: String,
    session: Arc<AuthSession>,
}

impl BoxClient {
    /// Creates a client against the public Box endpoints
    pub fn new(session: Arc<AuthSession>) -> RemoteResult<Self> {
        Self::with_endpoints(session, BOX_BASE_URL, BOX_UPLOAD_URL, DEFAULT_TIMEOUT)
    }

    /// Creates a client with custom endpoints (useful for testing)
    pub fn with_endpoints(
        session: Arc<AuthSession>,
        base_url: impl Into<String>,
        upload_url: impl Into<String>,
        timeout: Duration,
    ) -> RemoteResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url: trim_slash(base_url.into()),
            upload_url: trim_slash(upload_url.into()),
            session,
        })
    }

    /// Creates a client from the `api` config section
    pub fn from_config(session: Arc<AuthSession>, config: &ApiConfig) -> RemoteResult<Self> {
        Self::with_endpoints(
            session,
            config.base_url.clone(),
            config.upload_url.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// The session whose token this client sends
    pub fn session(&self) -> &Arc<AuthSession> {
        &self.session
    }

    /// Absolute URL for an API path such as `/folders/0`
    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Absolute URL for an upload path such as `/files/content`
    pub fn upload_endpoint(&self, path: &str) -> String {
        format!("{}{}", self.upload_url, path)
    }

    /// Executes a request and parses its body
    ///
    /// # Returns
    /// - [`ApiResponse::NoContent`] for HTTP 204
    /// - [`ApiResponse::Json`] for any other success
    ///
    /// # Errors
    /// - [`RemoteError::Status`] if a success body is not JSON or embeds an
    ///   error descriptor
    /// - the classified error for any non-success status
    #[instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    pub async fn execute(&self, request: &ApiRequest) -> RemoteResult<ApiResponse> {
        let response = self.execute_stream(request).await?;

        if response.status() == StatusCode::NO_CONTENT {
            debug!("No content");
            return Ok(ApiResponse::NoContent);
        }

        let body = response
            .text()
            .await
            .map_err(|e| transport_error(&e))?;

        let value: Value = serde_json::from_str(&body).map_err(|_| RemoteError::Status {
            code: None,
            message: format!("non-json response: {body}"),
        })?;

        if let Some(err) = embedded_error(&value) {
            return Err(err);
        }

        debug!(bytes = body.len(), "Parsed JSON response");
        Ok(ApiResponse::Json(value))
    }

    /// Executes a request and returns the raw successful response
    ///
    /// The body is left unread for the caller to stream.
    pub async fn execute_stream(&self, request: &ApiRequest) -> RemoteResult<Response> {
        let response = self.send_authorized(request).await?;
        check_status(response).await
    }

    /// Retrieves the authenticated user (`GET /users/me`)
    pub async fn current_user(&self) -> RemoteResult<AccountInfo> {
        let request = ApiRequest::get(self.api_url("/users/me"))
            .query("fields", "id,name,login,space_amount,space_used");
        self.execute(&request).await?.parse()
    }

    /// Sends the request with the current token, refreshing once on 401
    ///
    /// The retry response is returned whatever its status, so a second 401
    /// is classified like any other error.
    async fn send_authorized(&self, request: &ApiRequest) -> RemoteResult<Response> {
        let token = self.session.access_token().await?;
        let response = self.dispatch(request, &token).await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        info!(url = %request.url, "Access token rejected, refreshing");
        let token = self.session.refresh_if_stale(&token).await?;

        debug!(url = %request.url, "Retrying request with refreshed token");
        self.dispatch(request, &token).await
    }

    async fn dispatch(&self, request: &ApiRequest, token: &str) -> RemoteResult<Response> {
        debug!(method = %request.method, url = %request.url, "Requesting");

        let mut builder = self
            .http
            .request(request.method.clone(), &request.url)
            .headers(request.headers.clone())
            .bearer_auth(token);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }

        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Multipart(body) => builder.multipart(body.to_form()),
        };

        builder.send().await.map_err(|e| transport_error(&e))
    }
}

fn trim_slash(mut url: String) -> String {
    while url.ends_with('/') {
        url.pop();
    }
    url
}

/// Maps a non-success response to its [`RemoteError`] kind
async fn check_status(response: Response) -> RemoteResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = error_message(&body);
    debug!(status = status.as_u16(), %message, "Request failed");

    Err(match status {
        StatusCode::NOT_FOUND => RemoteError::NotFound(message),
        StatusCode::CONFLICT => RemoteError::Conflict(message),
        StatusCode::METHOD_NOT_ALLOWED => RemoteError::MethodNotAllowed(message),
        StatusCode::BAD_REQUEST => RemoteError::BadRequest(message),
        StatusCode::UNAUTHORIZED => RemoteError::Unauthorized(message),
        other => RemoteError::Http {
            status: other.as_u16(),
            message,
        },
    })
}

/// Prefers the `message` of a Box error object, falls back to the raw body
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

/// Detects an error descriptor inside a success body
///
/// Box reports OAuth-style errors as `{"error", "error_description"}` and
/// API errors as `{"type": "error", "code", "message"}`.
fn embedded_error(value: &Value) -> Option<RemoteError> {
    let text = |key: &str| value.get(key).and_then(Value::as_str).map(str::to_string);

    if let Some(code) = text("error") {
        let message = text("error_description").unwrap_or_else(|| code.clone());
        return Some(RemoteError::Status {
            code: Some(code),
            message,
        });
    }

    if text("type").as_deref() == Some("error") {
        return Some(RemoteError::Status {
            code: text("code"),
            message: text("message").unwrap_or_else(|| value.to_string()),
        });
    }

    None
}

pub(crate) fn transport_error(e: &reqwest::Error) -> RemoteError {
    RemoteError::Transport(e.to_string())
}
