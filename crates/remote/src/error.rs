//! Error types for the remote dispatcher.

use fieldsync_core::sync::{classify_http_status, DispatchClass, DispatchError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RemoteError>;

/// Retry policy class for API failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiRetryClass {
    Retryable,
    Conflict,
    ReauthRequired,
}

#[derive(Debug, Error)]
pub enum RemoteError {
    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Non-2xx response from the API
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Missing or malformed credentials
    #[error("Authentication error: {0}")]
    Auth(String),
}

impl RemoteError {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Classify error for retry policy. Only 409 is terminal for a queued mutation.
    pub fn retry_class(&self) -> ApiRetryClass {
        match self {
            Self::Api { status, .. } => match classify_http_status(*status) {
                DispatchClass::Conflict => ApiRetryClass::Conflict,
                _ if matches!(*status, 401 | 403) => ApiRetryClass::ReauthRequired,
                _ => ApiRetryClass::Retryable,
            },
            Self::Auth(_) => ApiRetryClass::ReauthRequired,
            Self::Http(_) | Self::Json(_) | Self::InvalidRequest(_) => ApiRetryClass::Retryable,
        }
    }
}

impl From<RemoteError> for DispatchError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::Api { status, message } => match classify_http_status(status) {
                DispatchClass::Conflict => DispatchError::Conflict { status, message },
                DispatchClass::Success | DispatchClass::Retryable => {
                    DispatchError::Rejected { status, message }
                }
            },
            RemoteError::Auth(message) => DispatchError::MissingCredentials(message),
            other => DispatchError::Transport(other.to_string()),
        }
    }
}
