//! Error types shared by every fieldsync crate.

use thiserror::Error;

use crate::sync::DispatchError;

/// Result type alias for fieldsync operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Database operation failed: {0}")]
    Database(#[from] DatabaseError),

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Dispatch failed: {0}")]
    Dispatch(#[from] DispatchError),
}

/// Storage-level failures. Never retried by the store itself.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// True when the failure came from the durable store.
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}
