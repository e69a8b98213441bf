//! Session error types.

use crate::forms::ValidationErrors;
use thiserror::Error;

/// Session error type.
#[derive(Error, Debug)]
pub enum SessionError {
    /// The backend refused the email/secret pair
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The backend refused the registration
    #[error("Registration failed: {0}")]
    Registration(String),

    /// The backend no longer accepts the held credential
    #[error("Session expired")]
    SessionExpired,

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Network unavailable (transient error, can retry)
    #[error("Network unavailable: {0}")]
    NetworkUnavailable(String),

    /// Timeout error
    #[error("Operation timed out")]
    Timeout,

    /// 5xx answer from the backend
    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    /// Other non-success answer from the backend
    #[error("Request failed with status {status}: {message}")]
    Api { status: u16, message: String },

    /// Operation requires an authenticated session
    #[error("Not logged in")]
    NotAuthenticated,

    /// A newer credential change overtook this operation
    #[error("Superseded by a newer session change")]
    Superseded,

    /// Client-side form validation failed
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    /// Invalid state transition in the session FSM
    #[error("Invalid session state transition: {0}")]
    InvalidStateTransition(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] hive_storage::StorageError),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SessionError {
    /// Returns true if this error is transient and the operation can be retried.
    ///
    /// Transient errors include:
    /// - Network unavailable and connection failures
    /// - Timeouts
    /// - 5xx answers
    pub fn is_transient(&self) -> bool {
        match self {
            SessionError::NetworkUnavailable(_) => true,
            SessionError::Timeout => true,
            SessionError::Server { .. } => true,
            SessionError::Http(e) => {
                if e.is_connect() || e.is_timeout() {
                    return true;
                }
                if let Some(status) = e.status() {
                    return status.is_server_error();
                }
                false
            }
            _ => false,
        }
    }

    /// Returns true if the request never got a usable answer.
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            SessionError::Http(_) | SessionError::NetworkUnavailable(_) | SessionError::Timeout
        )
    }
}

/// Result type alias using SessionError.
pub type SessionResult<T> = Result<T, SessionError>;
