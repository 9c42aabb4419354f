//! Domain error types
//!
//! [`DomainError`] covers validation of domain values. [`RemoteError`] is the
//! classification every remote operation reports; callers decide recovery by
//! matching on its variants, never on raw HTTP status codes.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid remote ID format
    #[error("Invalid remote ID: {0}")]
    InvalidRemoteId(String),

    /// Invalid hash format (expected hex SHA-1)
    #[error("Invalid hash format: {0}")]
    InvalidHash(String),

    /// Invalid file or folder name
    #[error("Invalid name: {0}")]
    InvalidName(String),

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

/// Errors reported by the remote service and the layer that talks to it
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Missing or expired credentials; the user must re-authenticate
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The caller passed an identifier that cannot resolve
    #[error("Parameter error: {0}")]
    Parameter(String),

    /// The service reported an error inside an otherwise successful
    /// response, or the body could not be parsed
    #[error("Status error: {message}")]
    Status {
        /// Error code from the embedded descriptor, if any
        code: Option<String>,
        /// Description or raw body
        message: String,
    },

    /// HTTP 404
    #[error("File not found: {0}")]
    NotFound(String),

    /// HTTP 409, e.g. an item with the same name already exists
    #[error("File conflict: {0}")]
    Conflict(String),

    /// HTTP 405, the operation is not permitted on this resource shape
    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    /// HTTP 400
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The request was rejected as unauthorized even after a refresh
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Any other non-success status
    #[error("HTTP {status}: {message}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Response body
        message: String,
    },

    /// The request never produced a response (connect, timeout, TLS)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Exchanging an authorization code or refresh token failed
    #[error("Token exchange failed: {0}")]
    TokenExchange(String),

    /// Reading or writing persisted credentials failed
    #[error("Credential store error: {0}")]
    CredentialStore(String),

    /// Local I/O failure while preparing a request or writing a download
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A value returned by the service did not pass domain validation
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),
}

/// Result alias for remote operations
pub type RemoteResult<T> = Result<T, RemoteError>;

impl RemoteError {
    /// Builds a [`RemoteError::Status`] from an embedded error descriptor
    pub fn status(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Status {
            code: Some(code.into()),
            message: message.into(),
        }
    }

    /// Returns true for [`RemoteError::Conflict`]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// Returns true for [`RemoteError::NotFound`]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
