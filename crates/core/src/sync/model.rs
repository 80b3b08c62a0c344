//! Outbox domain models: local records, queued mutations, cache entries.

use chrono::{DateTime, Duration, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

/// Length of the random suffix appended to locally generated ids.
const LOCAL_ID_SUFFIX_LEN: usize = 9;

/// Sync lifecycle of a locally held record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Pending,
    Synced,
    Conflict,
}

/// Mutation kinds that can be queued for the remote system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncAction {
    Create,
    Update,
    Delete,
}

/// Local copy of one business entity.
///
/// `data` is owned by the caller's business logic and never interpreted here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalRecord {
    pub id: String,
    pub entity_type: String,
    pub data: serde_json::Value,
    pub sync_status: SyncStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub synced_at: Option<DateTime<Utc>>,
}

/// Upsert input for [`LocalStore::save_record`](super::LocalStore::save_record).
///
/// Timestamps are stamped by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewLocalRecord {
    pub id: String,
    pub entity_type: String,
    pub data: serde_json::Value,
    pub sync_status: SyncStatus,
}

impl NewLocalRecord {
    pub fn pending(
        id: impl Into<String>,
        entity_type: impl Into<String>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            entity_type: entity_type.into(),
            data,
            sync_status: SyncStatus::Pending,
        }
    }
}

/// Durable intent to apply one mutation remotely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncQueueItem {
    pub id: String,
    pub action: SyncAction,
    pub entity_type: String,
    pub endpoint: String,
    pub payload: serde_json::Value,
    pub retries: u32,
    pub created_at: DateTime<Utc>,
}

impl SyncQueueItem {
    /// Id of the local record this item refers to, read from the payload.
    pub fn record_id(&self) -> Option<String> {
        match self.payload.get("id")? {
            serde_json::Value::String(id) => Some(id.clone()),
            serde_json::Value::Number(id) => Some(id.to_string()),
            _ => None,
        }
    }
}

/// Enqueue input; id, `created_at` and `retries` are assigned by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSyncQueueItem {
    pub action: SyncAction,
    pub entity_type: String,
    pub endpoint: String,
    pub payload: serde_json::Value,
}

impl NewSyncQueueItem {
    pub fn new(
        action: SyncAction,
        entity_type: impl Into<String>,
        endpoint: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            action,
            entity_type: entity_type.into(),
            endpoint: endpoint.into(),
            payload,
        }
    }
}

/// Time-bounded snapshot of a remote read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub key: String,
    pub data: serde_json::Value,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Expiry instant `ttl_minutes` after `now`. Negative TTLs are allowed.
    pub fn expiry_after(now: DateTime<Utc>, ttl_minutes: i64) -> Result<DateTime<Utc>> {
        Duration::try_minutes(ttl_minutes)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| {
                Error::invalid_input(format!("cache TTL of {} minutes is out of range", ttl_minutes))
            })
    }
}

/// Aggregate counts for observability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageStats {
    pub record_count: u64,
    pub pending_count: u64,
    pub sync_queue_length: u64,
    pub cache_entries: u64,
}

/// Generates an id for an entity created offline: `local_<unix millis>_<suffix>`.
pub fn generate_local_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(LOCAL_ID_SUFFIX_LEN)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();
    format!("local_{}_{}", Utc::now().timestamp_millis(), suffix)
}
