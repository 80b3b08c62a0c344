//! Network boundary contract used by the sync engine.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::model::{SyncAction, SyncQueueItem};

/// HTTP method derived from a queued action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DispatchMethod {
    Post,
    Put,
    Delete,
}

impl DispatchMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl From<SyncAction> for DispatchMethod {
    fn from(action: SyncAction) -> Self {
        match action {
            SyncAction::Create => Self::Post,
            SyncAction::Update => Self::Put,
            SyncAction::Delete => Self::Delete,
        }
    }
}

/// One request across the network boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchRequest {
    pub method: DispatchMethod,
    pub endpoint: String,
    pub entity_type: String,
    /// Request body; `None` for deletes.
    pub body: Option<serde_json::Value>,
}

impl DispatchRequest {
    pub fn from_item(item: &SyncQueueItem) -> Self {
        let method = DispatchMethod::from(item.action);
        let body = match method {
            DispatchMethod::Delete => None,
            DispatchMethod::Post | DispatchMethod::Put => Some(item.payload.clone()),
        };
        Self {
            method,
            endpoint: item.endpoint.clone(),
            entity_type: item.entity_type.clone(),
            body,
        }
    }
}

/// Outcome class of a remote response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchClass {
    Success,
    Conflict,
    Retryable,
}

/// Classify an HTTP status: 2xx succeeds, 409 conflicts, everything else is retried.
pub fn classify_http_status(status: u16) -> DispatchClass {
    match status {
        200..=299 => DispatchClass::Success,
        409 => DispatchClass::Conflict,
        _ => DispatchClass::Retryable,
    }
}

/// Failure reported by a [`RemoteDispatcher`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DispatchError {
    /// The remote system rejected the mutation as stale.
    #[error("Remote conflict ({status}): {message}")]
    Conflict { status: u16, message: String },

    /// Non-2xx response other than a conflict.
    #[error("Remote rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// Connection, timeout or body transfer failure.
    #[error("Transport error: {0}")]
    Transport(String),

    /// No bearer credential was available for the request.
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),
}

impl DispatchError {
    pub fn class(&self) -> DispatchClass {
        match self {
            Self::Conflict { .. } => DispatchClass::Conflict,
            Self::Rejected { .. } | Self::Transport(_) | Self::MissingCredentials(_) => {
                DispatchClass::Retryable
            }
        }
    }

    pub fn is_conflict(&self) -> bool {
        self.class() == DispatchClass::Conflict
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Conflict { status, .. } | Self::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Sends queued mutations to the remote system of record.
#[async_trait]
pub trait RemoteDispatcher: Send + Sync {
    async fn dispatch(&self, request: DispatchRequest) -> Result<(), DispatchError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn item(action: SyncAction) -> SyncQueueItem {
        SyncQueueItem {
            id: "q1".to_string(),
            action,
            entity_type: "expense".to_string(),
            endpoint: "/api/expenses".to_string(),
            payload: serde_json::json!({ "id": "e1", "amount": 12 }),
            retries: 0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn classify_http_status_for_dispatch_outcome() {
        assert_eq!(classify_http_status(200), DispatchClass::Success);
        assert_eq!(classify_http_status(204), DispatchClass::Success);
        assert_eq!(classify_http_status(409), DispatchClass::Conflict);
        assert_eq!(classify_http_status(400), DispatchClass::Retryable);
        assert_eq!(classify_http_status(401), DispatchClass::Retryable);
        assert_eq!(classify_http_status(503), DispatchClass::Retryable);
    }

    #[test]
    fn method_follows_action_and_delete_has_no_body() {
        let create = DispatchRequest::from_item(&item(SyncAction::Create));
        assert_eq!(create.method, DispatchMethod::Post);
        assert!(create.body.is_some());

        let update = DispatchRequest::from_item(&item(SyncAction::Update));
        assert_eq!(update.method, DispatchMethod::Put);

        let delete = DispatchRequest::from_item(&item(SyncAction::Delete));
        assert_eq!(delete.method, DispatchMethod::Delete);
        assert_eq!(delete.body, None);
        assert_eq!(delete.endpoint, "/api/expenses");
    }

    #[test]
    fn missing_credentials_is_an_ordinary_failure() {
        let err = DispatchError::MissingCredentials("no token".to_string());
        assert_eq!(err.class(), DispatchClass::Retryable);
        assert!(!err.is_conflict());
        assert_eq!(err.status_code(), None);
    }
}
