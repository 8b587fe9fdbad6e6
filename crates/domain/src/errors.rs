//! Error types used throughout the engine

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for storage, configuration and plumbing failures
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum CalSyncError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, CalSyncError>;

/// Failure to obtain a usable access token for a connection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The stored grant is no longer valid; the user must re-authorize.
    #[error("calendar connection requires re-authorization")]
    ReauthRequired,

    /// The token endpoint could not be reached or answered with a server
    /// error. The connection is left untouched and can be retried later.
    #[error("token refresh failed temporarily: {0}")]
    Transient(String),
}

/// Structured failure from the calendar API.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// HTTP 401: the access token was rejected.
    #[error("calendar API rejected credentials: {0}")]
    Unauthorized(String),

    /// HTTP 404/410: the addressed event does not exist.
    #[error("remote event not found: {0}")]
    NotFound(String),

    /// HTTP 429 (or a quota 403), optionally carrying the server's hint.
    #[error("rate limited by calendar API: {message}")]
    RateLimited { retry_after: Option<Duration>, message: String },

    /// Timeouts, connection failures and 5xx responses.
    #[error("transient calendar API failure: {0}")]
    Transient(String),

    /// Any other 4xx, or a response that could not be understood.
    #[error("calendar API rejected request (status {status:?}): {message}")]
    Permanent { status: Option<u16>, message: String },
}

impl RemoteError {
    /// Whether a bounded retry may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Transient(_))
    }

    /// Server-provided delay before the next attempt, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// Failure of the OAuth refresh-token grant.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RefreshError {
    /// `invalid_grant` or a 401-class answer: the refresh token is dead.
    #[error("refresh token rejected: {0}")]
    InvalidGrant(String),

    /// Any other client error from the token endpoint (bad client config).
    #[error("token endpoint rejected refresh: {0}")]
    Rejected(String),

    /// Network failure, timeout or 5xx from the token endpoint.
    #[error("token endpoint unavailable: {0}")]
    Transient(String),
}

impl RefreshError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}
