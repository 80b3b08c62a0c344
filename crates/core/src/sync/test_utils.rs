//! In-memory store and scripted dispatcher shared by the sync unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Notify;

use crate::errors::{DatabaseError, Error, Result};

use super::dispatch::{DispatchError, DispatchRequest, RemoteDispatcher};
use super::events::{SyncEvent, SyncEventBus};
use super::model::{
    CacheEntry, LocalRecord, NewLocalRecord, NewSyncQueueItem, StorageStats, SyncQueueItem,
    SyncStatus,
};
use super::store::LocalStore;

#[derive(Default)]
struct MemoryState {
    records: HashMap<String, LocalRecord>,
    queue: Vec<SyncQueueItem>,
    cache: HashMap<String, CacheEntry>,
    metadata: HashMap<String, serde_json::Value>,
    last_created_at: Option<DateTime<Utc>>,
    reverse_queue: bool,
}

#[derive(Default)]
pub(crate) struct MemoryStore {
    state: Mutex<MemoryState>,
    next_id: AtomicU64,
    fail_queue_reads: AtomicBool,
}

impl MemoryStore {
    /// Serve `get_sync_queue` in reverse insertion order.
    pub(crate) fn reverse_queue_order(&self) {
        self.lock().reverse_queue = true;
    }

    pub(crate) fn fail_queue_reads(&self, fail: bool) {
        self.fail_queue_reads.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn insert_cache_entry(&self, entry: CacheEntry) {
        self.lock().cache.insert(entry.key.clone(), entry);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().expect("memory store lock")
    }
}

#[async_trait]
impl LocalStore for MemoryStore {
    async fn save_record(&self, record: NewLocalRecord) -> Result<LocalRecord> {
        let now = Utc::now();
        let mut state = self.lock();
        let previous = state.records.get(&record.id).cloned();
        let saved = LocalRecord {
            id: record.id.clone(),
            entity_type: record.entity_type,
            data: record.data,
            sync_status: record.sync_status,
            created_at: previous.as_ref().map(|r| r.created_at).unwrap_or(now),
            updated_at: now,
            synced_at: previous.and_then(|r| r.synced_at),
        };
        state.records.insert(record.id, saved.clone());
        Ok(saved)
    }

    async fn get_record(&self, id: &str) -> Result<Option<LocalRecord>> {
        Ok(self.lock().records.get(id).cloned())
    }

    async fn get_records_by_type(&self, entity_type: &str) -> Result<Vec<LocalRecord>> {
        Ok(self
            .lock()
            .records
            .values()
            .filter(|r| r.entity_type == entity_type)
            .cloned()
            .collect())
    }

    async fn get_pending_records(&self) -> Result<Vec<LocalRecord>> {
        Ok(self
            .lock()
            .records
            .values()
            .filter(|r| r.sync_status == SyncStatus::Pending)
            .cloned()
            .collect())
    }

    async fn delete_record(&self, id: &str) -> Result<()> {
        self.lock().records.remove(id);
        Ok(())
    }

    async fn mark_synced(&self, id: &str) -> Result<()> {
        if let Some(record) = self.lock().records.get_mut(id) {
            record.sync_status = SyncStatus::Synced;
            record.synced_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn mark_conflict(&self, id: &str) -> Result<()> {
        if let Some(record) = self.lock().records.get_mut(id) {
            record.sync_status = SyncStatus::Conflict;
        }
        Ok(())
    }

    async fn add_to_sync_queue(&self, item: NewSyncQueueItem) -> Result<String> {
        let id = format!("q{:04}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let mut state = self.lock();
        let now = Utc::now();
        // Strictly increasing so ordering tests do not depend on clock resolution.
        let created_at = match state.last_created_at {
            Some(last) if last >= now => last + Duration::microseconds(1),
            _ => now,
        };
        state.last_created_at = Some(created_at);
        state.queue.push(SyncQueueItem {
            id: id.clone(),
            action: item.action,
            entity_type: item.entity_type,
            endpoint: item.endpoint,
            payload: item.payload,
            retries: 0,
            created_at,
        });
        Ok(id)
    }

    async fn get_sync_queue(&self) -> Result<Vec<SyncQueueItem>> {
        if self.fail_queue_reads.load(Ordering::SeqCst) {
            return Err(Error::Database(DatabaseError::QueryFailed(
                "sync_queue unavailable".to_string(),
            )));
        }
        let state = self.lock();
        let mut queue = state.queue.clone();
        if state.reverse_queue {
            queue.reverse();
        }
        Ok(queue)
    }

    async fn remove_sync_item(&self, id: &str) -> Result<()> {
        self.lock().queue.retain(|item| item.id != id);
        Ok(())
    }

    async fn increment_retry(&self, id: &str) -> Result<Option<u32>> {
        let mut state = self.lock();
        Ok(state.queue.iter_mut().find(|item| item.id == id).map(|item| {
            item.retries += 1;
            item.retries
        }))
    }

    async fn clear_sync_queue(&self) -> Result<usize> {
        let mut state = self.lock();
        let removed = state.queue.len();
        state.queue.clear();
        Ok(removed)
    }

    async fn set_cache(&self, key: &str, data: serde_json::Value, ttl_minutes: i64) -> Result<()> {
        let expires_at = CacheEntry::expiry_after(Utc::now(), ttl_minutes)?;
        self.insert_cache_entry(CacheEntry {
            key: key.to_string(),
            data,
            expires_at,
        });
        Ok(())
    }

    async fn get_cache(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let now = Utc::now();
        Ok(self
            .lock()
            .cache
            .get(key)
            .filter(|entry| !entry.is_expired_at(now))
            .map(|entry| entry.data.clone()))
    }

    async fn clear_expired_cache(&self) -> Result<usize> {
        let now = Utc::now();
        let mut state = self.lock();
        let before = state.cache.len();
        state.cache.retain(|_, entry| !entry.is_expired_at(now));
        Ok(before - state.cache.len())
    }

    async fn set_metadata(&self, key: &str, value: serde_json::Value) -> Result<()> {
        self.lock().metadata.insert(key.to_string(), value);
        Ok(())
    }

    async fn get_metadata(&self, key: &str) -> Result<Option<serde_json::Value>> {
        Ok(self.lock().metadata.get(key).cloned())
    }

    async fn get_storage_stats(&self) -> Result<StorageStats> {
        let state = self.lock();
        Ok(StorageStats {
            record_count: state.records.len() as u64,
            pending_count: state
                .records
                .values()
                .filter(|r| r.sync_status == SyncStatus::Pending)
                .count() as u64,
            sync_queue_length: state.queue.len() as u64,
            cache_entries: state.cache.len() as u64,
        })
    }

    async fn clear_all(&self) -> Result<()> {
        let mut state = self.lock();
        state.records.clear();
        state.queue.clear();
        state.cache.clear();
        state.metadata.clear();
        Ok(())
    }
}

/// Records every request and answers from a per-endpoint script.
#[derive(Default)]
pub(crate) struct ScriptedDispatcher {
    calls: Mutex<Vec<DispatchRequest>>,
    default_error: Option<DispatchError>,
    endpoint_errors: Mutex<HashMap<String, DispatchError>>,
    gate: Mutex<Option<Arc<Notify>>>,
}

impl ScriptedDispatcher {
    pub(crate) fn failing_with(error: DispatchError) -> Self {
        Self {
            default_error: Some(error),
            ..Self::default()
        }
    }

    pub(crate) fn fail_endpoint(&self, endpoint: &str, error: DispatchError) {
        self.endpoint_errors
            .lock()
            .expect("lock")
            .insert(endpoint.to_string(), error);
    }

    /// Makes the next dispatch wait until the returned notifier fires.
    pub(crate) fn hold(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.gate.lock().expect("lock") = Some(Arc::clone(&notify));
        notify
    }

    pub(crate) fn calls(&self) -> Vec<DispatchRequest> {
        self.calls.lock().expect("lock").clone()
    }
}

#[async_trait]
impl RemoteDispatcher for ScriptedDispatcher {
    async fn dispatch(&self, request: DispatchRequest) -> std::result::Result<(), DispatchError> {
        let gate = self.gate.lock().expect("lock").take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let endpoint_error = self
            .endpoint_errors
            .lock()
            .expect("lock")
            .get(&request.endpoint)
            .cloned();
        self.calls.lock().expect("lock").push(request);
        match endpoint_error.or_else(|| self.default_error.clone()) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Collects every event emitted on `bus`.
pub(crate) fn record_events(bus: &SyncEventBus) -> Arc<Mutex<Vec<SyncEvent>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    bus.subscribe(move |event| sink.lock().expect("lock").push(event.clone()));
    seen
}
