//! Contract for the local durable store.

use async_trait::async_trait;

use crate::errors::Result;

use super::model::{
    LocalRecord, NewLocalRecord, NewSyncQueueItem, StorageStats, SyncQueueItem,
};

/// Metadata key holding the RFC 3339 time of the last fully successful sync run.
pub const LAST_SYNC_AT_KEY: &str = "last_sync_at";

/// Persistent, indexed store for records, the sync queue, the read cache and metadata.
///
/// Every operation is atomic for its target collection. No operation spans
/// collections, so callers that write a record and then enqueue it perform two
/// independent commits. Failures are surfaced to the caller and never retried here.
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Upserts a record, stamping `created_at` on first insert and always refreshing `updated_at`.
    async fn save_record(&self, record: NewLocalRecord) -> Result<LocalRecord>;
    async fn get_record(&self, id: &str) -> Result<Option<LocalRecord>>;
    async fn get_records_by_type(&self, entity_type: &str) -> Result<Vec<LocalRecord>>;
    /// Records whose status is `pending`, served from the status index.
    async fn get_pending_records(&self) -> Result<Vec<LocalRecord>>;
    /// Removes a record unconditionally. The sync queue is left untouched.
    async fn delete_record(&self, id: &str) -> Result<()>;
    /// Sets status `synced` and stamps `synced_at`. No-op when the record is gone.
    async fn mark_synced(&self, id: &str) -> Result<()>;
    /// Sets status `conflict`. No-op when the record is gone.
    async fn mark_conflict(&self, id: &str) -> Result<()>;

    /// Inserts a queue item with a fresh id, `created_at = now` and zero retries.
    async fn add_to_sync_queue(&self, item: NewSyncQueueItem) -> Result<String>;
    /// All queued items ordered by `created_at`, ties broken by id.
    async fn get_sync_queue(&self) -> Result<Vec<SyncQueueItem>>;
    async fn remove_sync_item(&self, id: &str) -> Result<()>;
    /// Read-modify-write of the retry counter in a single transaction.
    /// Returns the new count, or `None` when the item no longer exists.
    async fn increment_retry(&self, id: &str) -> Result<Option<u32>>;
    /// Drops every queued item and returns how many were removed.
    async fn clear_sync_queue(&self) -> Result<usize>;

    async fn set_cache(&self, key: &str, data: serde_json::Value, ttl_minutes: i64) -> Result<()>;
    /// Returns `None` for missing or expired entries. Expired entries are not deleted.
    async fn get_cache(&self, key: &str) -> Result<Option<serde_json::Value>>;
    /// Deletes every expired entry and returns how many were removed.
    async fn clear_expired_cache(&self) -> Result<usize>;

    async fn set_metadata(&self, key: &str, value: serde_json::Value) -> Result<()>;
    async fn get_metadata(&self, key: &str) -> Result<Option<serde_json::Value>>;

    /// Aggregate counts computed with indexed count queries.
    async fn get_storage_stats(&self) -> Result<StorageStats>;
    /// Destructive reset of all four collections.
    async fn clear_all(&self) -> Result<()>;
}
