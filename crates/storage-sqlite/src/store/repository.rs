//! SQLite-backed local store for records, the sync queue, the cache and metadata.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use diesel::prelude::*;
use diesel::r2d2::{self, Pool};
use diesel::sqlite::SqliteConnection;
use log::debug;
use uuid::Uuid;

use fieldsync_core::errors::{DatabaseError, Error, Result};
use fieldsync_core::sync::{
    CacheEntry, LocalRecord, LocalStore, NewLocalRecord, NewSyncQueueItem, StorageStats,
    SyncQueueItem, SyncStatus,
};

use crate::db::{create_pool, get_connection, init, run_migrations, write_actor, WriteHandle};
use crate::errors::StorageError;
use crate::schema::{cache, metadata, records, sync_queue};

use super::model::{CacheEntryDB, LocalRecordDB, MetadataDB, SyncQueueItemDB};

fn enum_to_db<T: serde::Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?.trim_matches('"').to_string())
}

fn enum_from_db<T: serde::de::DeserializeOwned>(value: &str) -> Result<T> {
    Ok(serde_json::from_str(&format!("\"{}\"", value))?)
}

/// Fixed-width UTC timestamps so text ordering matches time ordering.
fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| {
            Error::Database(DatabaseError::Internal(format!(
                "Invalid stored timestamp '{}': {}",
                value, e
            )))
        })
}

fn to_local_record(row: LocalRecordDB) -> Result<LocalRecord> {
    Ok(LocalRecord {
        id: row.id,
        entity_type: row.entity_type,
        data: serde_json::from_str(&row.data)?,
        sync_status: enum_from_db(&row.sync_status)?,
        created_at: parse_timestamp(&row.created_at)?,
        updated_at: parse_timestamp(&row.updated_at)?,
        synced_at: row.synced_at.as_deref().map(parse_timestamp).transpose()?,
    })
}

fn parse_retries(value: i32) -> Result<u32> {
    u32::try_from(value).map_err(|_| {
        Error::Database(DatabaseError::Internal(format!(
            "Invalid stored retry count {}",
            value
        )))
    })
}

fn to_sync_queue_item(row: SyncQueueItemDB) -> Result<SyncQueueItem> {
    Ok(SyncQueueItem {
        id: row.id,
        action: enum_from_db(&row.action)?,
        entity_type: row.entity_type,
        endpoint: row.endpoint,
        payload: serde_json::from_str(&row.payload)?,
        retries: parse_retries(row.retries)?,
        created_at: parse_timestamp(&row.created_at)?,
    })
}

fn count_to_u64(count: i64) -> u64 {
    u64::try_from(count).unwrap_or(0)
}

pub struct SqliteLocalStore {
    pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
}

impl SqliteLocalStore {
    pub fn new(
        pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
        writer: WriteHandle,
    ) -> Self {
        Self { pool, writer }
    }

    /// Opens (creating if needed) the database under `app_data_dir` and applies migrations.
    pub fn open(app_data_dir: &str) -> Result<Self> {
        let db_path = init(app_data_dir)?;
        run_migrations(&db_path)?;
        let pool = create_pool(&db_path)?;
        let writer = write_actor::spawn_writer(pool.as_ref().clone());
        Ok(Self::new(pool, writer))
    }
}

#[async_trait]
impl LocalStore for SqliteLocalStore {
    async fn save_record(&self, record: NewLocalRecord) -> Result<LocalRecord> {
        let data = serde_json::to_string(&record.data)?;
        let status = enum_to_db(&record.sync_status)?;

        self.writer
            .exec(move |conn| {
                let now = format_timestamp(Utc::now());
                let row = LocalRecordDB {
                    id: record.id,
                    entity_type: record.entity_type,
                    data,
                    sync_status: status,
                    created_at: now.clone(),
                    updated_at: now,
                    synced_at: None,
                };

                // created_at and synced_at survive a re-save.
                diesel::insert_into(records::table)
                    .values(&row)
                    .on_conflict(records::id)
                    .do_update()
                    .set((
                        records::entity_type.eq(&row.entity_type),
                        records::data.eq(&row.data),
                        records::sync_status.eq(&row.sync_status),
                        records::updated_at.eq(&row.updated_at),
                    ))
                    .execute(conn)
                    .map_err(StorageError::from)?;

                let saved = records::table
                    .find(&row.id)
                    .first::<LocalRecordDB>(conn)
                    .map_err(StorageError::from)?;
                to_local_record(saved)
            })
            .await
    }

    async fn get_record(&self, id: &str) -> Result<Option<LocalRecord>> {
        let mut conn = get_connection(&self.pool)?;
        records::table
            .find(id)
            .first::<LocalRecordDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?
            .map(to_local_record)
            .transpose()
    }

    async fn get_records_by_type(&self, entity_type: &str) -> Result<Vec<LocalRecord>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = records::table
            .filter(records::entity_type.eq(entity_type))
            .order((records::created_at.asc(), records::id.asc()))
            .load::<LocalRecordDB>(&mut conn)
            .map_err(StorageError::from)?;
        rows.into_iter().map(to_local_record).collect()
    }

    async fn get_pending_records(&self) -> Result<Vec<LocalRecord>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = records::table
            .filter(records::sync_status.eq(enum_to_db(&SyncStatus::Pending)?))
            .order((records::created_at.asc(), records::id.asc()))
            .load::<LocalRecordDB>(&mut conn)
            .map_err(StorageError::from)?;
        rows.into_iter().map(to_local_record).collect()
    }

    async fn delete_record(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        self.writer
            .exec(move |conn| {
                diesel::delete(records::table.find(&id))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }

    async fn mark_synced(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        let status = enum_to_db(&SyncStatus::Synced)?;
        self.writer
            .exec(move |conn| {
                let updated = diesel::update(records::table.find(&id))
                    .set((
                        records::sync_status.eq(status),
                        records::synced_at.eq(Some(format_timestamp(Utc::now()))),
                    ))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                if updated == 0 {
                    debug!("[Storage] mark_synced: no local record {}", id);
                }
                Ok(())
            })
            .await
    }

    async fn mark_conflict(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        let status = enum_to_db(&SyncStatus::Conflict)?;
        self.writer
            .exec(move |conn| {
                diesel::update(records::table.find(&id))
                    .set(records::sync_status.eq(status))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }

    async fn add_to_sync_queue(&self, item: NewSyncQueueItem) -> Result<String> {
        let payload = serde_json::to_string(&item.payload)?;
        let action = enum_to_db(&item.action)?;

        self.writer
            .exec(move |conn| {
                let row = SyncQueueItemDB {
                    id: Uuid::now_v7().to_string(),
                    action,
                    entity_type: item.entity_type,
                    endpoint: item.endpoint,
                    payload,
                    retries: 0,
                    created_at: format_timestamp(Utc::now()),
                };
                diesel::insert_into(sync_queue::table)
                    .values(&row)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(row.id)
            })
            .await
    }

    async fn get_sync_queue(&self) -> Result<Vec<SyncQueueItem>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = sync_queue::table
            .order((sync_queue::created_at.asc(), sync_queue::id.asc()))
            .load::<SyncQueueItemDB>(&mut conn)
            .map_err(StorageError::from)?;
        rows.into_iter().map(to_sync_queue_item).collect()
    }

    async fn remove_sync_item(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        self.writer
            .exec(move |conn| {
                diesel::delete(sync_queue::table.find(&id))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }

    async fn increment_retry(&self, id: &str) -> Result<Option<u32>> {
        let id = id.to_string();
        self.writer
            .exec(move |conn| {
                let updated = diesel::update(sync_queue::table.find(&id))
                    .set(sync_queue::retries.eq(sync_queue::retries + 1))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                if updated == 0 {
                    return Ok(None);
                }
                let retries = sync_queue::table
                    .find(&id)
                    .select(sync_queue::retries)
                    .first::<i32>(conn)
                    .map_err(StorageError::from)?;
                Ok(Some(parse_retries(retries)?))
            })
            .await
    }

    async fn clear_sync_queue(&self) -> Result<usize> {
        self.writer
            .exec(|conn| {
                Ok(diesel::delete(sync_queue::table)
                    .execute(conn)
                    .map_err(StorageError::from)?)
            })
            .await
    }

    async fn set_cache(&self, key: &str, data: serde_json::Value, ttl_minutes: i64) -> Result<()> {
        let row = CacheEntryDB {
            key: key.to_string(),
            data: serde_json::to_string(&data)?,
            expires_at: CacheEntry::expiry_after(Utc::now(), ttl_minutes)?.timestamp_millis(),
        };
        self.writer
            .exec(move |conn| {
                diesel::insert_into(cache::table)
                    .values(&row)
                    .on_conflict(cache::key)
                    .do_update()
                    .set((
                        cache::data.eq(&row.data),
                        cache::expires_at.eq(row.expires_at),
                    ))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }

    async fn get_cache(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let mut conn = get_connection(&self.pool)?;
        let row = cache::table
            .find(key)
            .first::<CacheEntryDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?;
        let now = Utc::now().timestamp_millis();
        match row {
            Some(entry) if entry.expires_at > now => Ok(Some(serde_json::from_str(&entry.data)?)),
            _ => Ok(None),
        }
    }

    async fn clear_expired_cache(&self) -> Result<usize> {
        self.writer
            .exec(|conn| {
                let now = Utc::now().timestamp_millis();
                Ok(diesel::delete(cache::table.filter(cache::expires_at.le(now)))
                    .execute(conn)
                    .map_err(StorageError::from)?)
            })
            .await
    }

    async fn set_metadata(&self, key: &str, value: serde_json::Value) -> Result<()> {
        let row = MetadataDB {
            key: key.to_string(),
            value: serde_json::to_string(&value)?,
            updated_at: format_timestamp(Utc::now()),
        };
        self.writer
            .exec(move |conn| {
                diesel::insert_into(metadata::table)
                    .values(&row)
                    .on_conflict(metadata::key)
                    .do_update()
                    .set((
                        metadata::value.eq(&row.value),
                        metadata::updated_at.eq(&row.updated_at),
                    ))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }

    async fn get_metadata(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let mut conn = get_connection(&self.pool)?;
        let row = metadata::table
            .find(key)
            .first::<MetadataDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?;
        match row {
            Some(row) => Ok(Some(serde_json::from_str(&row.value)?)),
            None => Ok(None),
        }
    }

    async fn get_storage_stats(&self) -> Result<StorageStats> {
        let mut conn = get_connection(&self.pool)?;
        let pending = enum_to_db(&SyncStatus::Pending)?;

        let record_count: i64 = records::table
            .count()
            .get_result(&mut conn)
            .map_err(StorageError::from)?;
        let pending_count: i64 = records::table
            .filter(records::sync_status.eq(pending))
            .count()
            .get_result(&mut conn)
            .map_err(StorageError::from)?;
        let sync_queue_length: i64 = sync_queue::table
            .count()
            .get_result(&mut conn)
            .map_err(StorageError::from)?;
        let cache_entries: i64 = cache::table
            .count()
            .get_result(&mut conn)
            .map_err(StorageError::from)?;

        Ok(StorageStats {
            record_count: count_to_u64(record_count),
            pending_count: count_to_u64(pending_count),
            sync_queue_length: count_to_u64(sync_queue_length),
            cache_entries: count_to_u64(cache_entries),
        })
    }

    async fn clear_all(&self) -> Result<()> {
        self.writer
            .exec(|conn| {
                diesel::delete(records::table)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                diesel::delete(sync_queue::table)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                diesel::delete(cache::table)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                diesel::delete(metadata::table)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use fieldsync_core::sync::{
        ConnectivityMonitor, DispatchError, DispatchRequest, RemoteDispatcher, SyncAction,
        SyncConfig, SyncEngine, SyncRunStatus, LAST_SYNC_AT_KEY,
    };
    use serde_json::json;
    use tempfile::{tempdir, TempDir};

    fn setup_store() -> (TempDir, SqliteLocalStore) {
        let dir = tempdir().expect("tempdir");
        let store = SqliteLocalStore::open(&dir.path().to_string_lossy()).expect("open store");
        (dir, store)
    }

    #[derive(Default)]
    struct RecordingDispatcher {
        calls: Mutex<Vec<DispatchRequest>>,
        fail_endpoint: Option<(String, DispatchError)>,
    }

    #[async_trait]
    impl RemoteDispatcher for RecordingDispatcher {
        async fn dispatch(&self, request: DispatchRequest) -> std::result::Result<(), DispatchError> {
            let failure = self
                .fail_endpoint
                .as_ref()
                .filter(|(endpoint, _)| *endpoint == request.endpoint)
                .map(|(_, err)| err.clone());
            self.calls.lock().expect("lock").push(request);
            match failure {
                Some(err) => Err(err),
                None => Ok(()),
            }
        }
    }

    #[tokio::test]
    async fn save_and_get_record_round_trips() {
        let (_dir, store) = setup_store();
        let saved = store
            .save_record(NewLocalRecord::pending(
                "local_1",
                "job",
                json!({"id": "local_1", "title": "Fix pump"}),
            ))
            .await
            .expect("save");
        assert_eq!(saved.sync_status, SyncStatus::Pending);
        assert!(saved.synced_at.is_none());

        let loaded = store.get_record("local_1").await.expect("get").expect("exists");
        assert_eq!(loaded.data["title"], "Fix pump");
        assert_eq!(loaded.entity_type, "job");
        assert_eq!(loaded.created_at, saved.created_at);

        assert!(store.get_record("missing").await.expect("get").is_none());
    }

    #[tokio::test]
    async fn resave_preserves_created_at_and_refreshes_updated_at() {
        let (_dir, store) = setup_store();
        let first = store
            .save_record(NewLocalRecord::pending("r1", "job", json!({"v": 1})))
            .await
            .expect("save");
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = store
            .save_record(NewLocalRecord::pending("r1", "job", json!({"v": 2})))
            .await
            .expect("resave");

        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at > first.updated_at);
        assert_eq!(second.data["v"], 2);
        assert_eq!(store.get_storage_stats().await.expect("stats").record_count, 1);
    }

    #[tokio::test]
    async fn records_filter_by_type_and_status() {
        let (_dir, store) = setup_store();
        for (id, kind) in [("a", "job"), ("b", "job"), ("c", "note")] {
            store
                .save_record(NewLocalRecord::pending(id, kind, json!({"id": id})))
                .await
                .expect("save");
        }
        store.mark_synced("b").await.expect("mark synced");
        store.mark_conflict("c").await.expect("mark conflict");

        let jobs = store.get_records_by_type("job").await.expect("by type");
        assert_eq!(
            jobs.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(),
            vec!["a", "b"]
        );

        let pending = store.get_pending_records().await.expect("pending");
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, "a");

        let synced = store.get_record("b").await.expect("get").expect("exists");
        assert_eq!(synced.sync_status, SyncStatus::Synced);
        assert!(synced.synced_at.is_some());

        let conflicted = store.get_record("c").await.expect("get").expect("exists");
        assert_eq!(conflicted.sync_status, SyncStatus::Conflict);
    }

    #[tokio::test]
    async fn marking_missing_record_is_a_no_op() {
        let (_dir, store) = setup_store();
        store.mark_synced("ghost").await.expect("mark synced");
        store.mark_conflict("ghost").await.expect("mark conflict");
        store.delete_record("ghost").await.expect("delete");
        assert!(store.get_record("ghost").await.expect("get").is_none());
    }

    #[tokio::test]
    async fn sync_queue_is_fifo_and_tracks_retries() {
        let (_dir, store) = setup_store();
        let mut ids = Vec::new();
        for n in 0..3 {
            ids.push(
                store
                    .add_to_sync_queue(NewSyncQueueItem::new(
                        SyncAction::Create,
                        "job",
                        format!("/jobs/{}", n),
                        json!({"id": n}),
                    ))
                    .await
                    .expect("enqueue"),
            );
        }

        let queue = store.get_sync_queue().await.expect("queue");
        assert_eq!(queue.iter().map(|i| i.id.clone()).collect::<Vec<_>>(), ids);
        assert!(queue.iter().all(|i| i.retries == 0));
        assert_eq!(queue[0].action, SyncAction::Create);

        assert_eq!(store.increment_retry(&ids[1]).await.expect("inc"), Some(1));
        assert_eq!(store.increment_retry(&ids[1]).await.expect("inc"), Some(2));
        assert_eq!(store.increment_retry("missing").await.expect("inc"), None);

        store.remove_sync_item(&ids[0]).await.expect("remove");
        let queue = store.get_sync_queue().await.expect("queue");
        assert_eq!(queue.len(), 2);
        assert_eq!(queue[0].id, ids[1]);
        assert_eq!(queue[0].retries, 2);

        assert_eq!(store.clear_sync_queue().await.expect("clear"), 2);
        assert!(store.get_sync_queue().await.expect("queue").is_empty());
    }

    #[tokio::test]
    async fn cache_honors_expiry() {
        let (_dir, store) = setup_store();
        store
            .set_cache("fresh", json!({"n": 1}), 10)
            .await
            .expect("set fresh");
        store
            .set_cache("stale", json!({"n": 2}), -1)
            .await
            .expect("set stale");
        store
            .set_cache("instant", json!({"n": 3}), 0)
            .await
            .expect("set instant");

        assert_eq!(
            store.get_cache("fresh").await.expect("get"),
            Some(json!({"n": 1}))
        );
        assert_eq!(store.get_cache("stale").await.expect("get"), None);
        assert_eq!(store.get_cache("missing").await.expect("get"), None);

        // Expired entries stay until swept.
        assert_eq!(store.get_storage_stats().await.expect("stats").cache_entries, 3);
        assert_eq!(store.clear_expired_cache().await.expect("sweep"), 2);
        assert_eq!(store.get_storage_stats().await.expect("stats").cache_entries, 1);
    }

    #[tokio::test]
    async fn cache_rejects_out_of_range_ttl() {
        let (_dir, store) = setup_store();
        let err = store
            .set_cache("k", json!(1), 200_000_000_000)
            .await
            .expect_err("ttl overflow");
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(store.set_cache("k", json!(1), i64::MIN).await.is_err());
        assert_eq!(store.get_storage_stats().await.expect("stats").cache_entries, 0);
    }

    #[tokio::test]
    async fn negative_stored_retry_count_is_reported_as_corrupt() {
        let (_dir, store) = setup_store();
        let id = store
            .add_to_sync_queue(NewSyncQueueItem::new(
                SyncAction::Create,
                "job",
                "/jobs",
                json!({"id": "a"}),
            ))
            .await
            .expect("enqueue");
        let mut conn = get_connection(&store.pool).expect("conn");
        diesel::update(sync_queue::table.find(&id))
            .set(sync_queue::retries.eq(-1))
            .execute(&mut conn)
            .expect("corrupt row");

        let err = store.get_sync_queue().await.expect_err("corrupt retries");
        assert!(matches!(
            err,
            Error::Database(DatabaseError::Internal(ref m)) if m.contains("retry count")
        ));
    }

    #[tokio::test]
    async fn cache_overwrite_replaces_value_and_expiry() {
        let (_dir, store) = setup_store();
        store.set_cache("k", json!(1), -5).await.expect("set");
        store.set_cache("k", json!(2), 5).await.expect("overwrite");
        assert_eq!(store.get_cache("k").await.expect("get"), Some(json!(2)));
    }

    #[tokio::test]
    async fn metadata_upserts() {
        let (_dir, store) = setup_store();
        assert!(store.get_metadata("k").await.expect("get").is_none());
        store.set_metadata("k", json!("one")).await.expect("set");
        store.set_metadata("k", json!({"two": 2})).await.expect("set");
        assert_eq!(
            store.get_metadata("k").await.expect("get"),
            Some(json!({"two": 2}))
        );
    }

    #[tokio::test]
    async fn stats_and_clear_all() {
        let (_dir, store) = setup_store();
        store
            .save_record(NewLocalRecord::pending("a", "job", json!({})))
            .await
            .expect("save");
        store
            .save_record(NewLocalRecord::pending("b", "job", json!({})))
            .await
            .expect("save");
        store.mark_synced("b").await.expect("synced");
        store
            .add_to_sync_queue(NewSyncQueueItem::new(
                SyncAction::Delete,
                "job",
                "/jobs/b",
                json!({"id": "b"}),
            ))
            .await
            .expect("enqueue");
        store.set_cache("k", json!(1), 5).await.expect("cache");
        store.set_metadata("m", json!(1)).await.expect("meta");

        let stats = store.get_storage_stats().await.expect("stats");
        assert_eq!(
            stats,
            StorageStats {
                record_count: 2,
                pending_count: 1,
                sync_queue_length: 1,
                cache_entries: 1,
            }
        );

        store.clear_all().await.expect("clear");
        assert_eq!(
            store.get_storage_stats().await.expect("stats"),
            StorageStats::default()
        );
        assert!(store.get_metadata("m").await.expect("meta").is_none());
    }

    #[tokio::test]
    async fn data_survives_reopen() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().to_string_lossy().to_string();
        {
            let store = SqliteLocalStore::open(&path).expect("open");
            store
                .save_record(NewLocalRecord::pending("a", "job", json!({"x": 1})))
                .await
                .expect("save");
            store
                .add_to_sync_queue(NewSyncQueueItem::new(
                    SyncAction::Create,
                    "job",
                    "/jobs",
                    json!({"id": "a", "x": 1}),
                ))
                .await
                .expect("enqueue");
        }

        let reopened = SqliteLocalStore::open(&path).expect("reopen");
        assert!(reopened.get_record("a").await.expect("get").is_some());
        assert_eq!(reopened.get_sync_queue().await.expect("queue").len(), 1);
    }

    #[tokio::test]
    async fn engine_drains_sqlite_queue_in_order() {
        let (_dir, store) = setup_store();
        let store: Arc<dyn LocalStore> = Arc::new(store);
        let dispatcher = Arc::new(RecordingDispatcher {
            fail_endpoint: Some((
                "/jobs/b".to_string(),
                DispatchError::Rejected {
                    status: 500,
                    message: "boom".to_string(),
                },
            )),
            ..RecordingDispatcher::default()
        });
        for id in ["a", "b", "c"] {
            store
                .save_record(NewLocalRecord::pending(id, "job", json!({"id": id})))
                .await
                .expect("save");
            store
                .add_to_sync_queue(NewSyncQueueItem::new(
                    SyncAction::Update,
                    "job",
                    format!("/jobs/{}", id),
                    json!({"id": id}),
                ))
                .await
                .expect("enqueue");
        }

        let engine = SyncEngine::new(
            Arc::clone(&store),
            dispatcher.clone(),
            ConnectivityMonitor::new(true),
            SyncConfig::default(),
        );
        let result = engine.run().await;

        assert_eq!(result.status, SyncRunStatus::Completed);
        assert_eq!((result.total, result.synced, result.failed), (3, 2, 1));
        let endpoints = dispatcher
            .calls
            .lock()
            .expect("lock")
            .iter()
            .map(|c| c.endpoint.clone())
            .collect::<Vec<_>>();
        assert_eq!(endpoints, vec!["/jobs/a", "/jobs/b", "/jobs/c"]);

        let queue = store.get_sync_queue().await.expect("queue");
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].endpoint, "/jobs/b");
        assert_eq!(queue[0].retries, 1);

        let a = store.get_record("a").await.expect("get").expect("a");
        assert_eq!(a.sync_status, SyncStatus::Synced);
        let b = store.get_record("b").await.expect("get").expect("b");
        assert_eq!(b.sync_status, SyncStatus::Pending);
        assert!(store
            .get_metadata(LAST_SYNC_AT_KEY)
            .await
            .expect("meta")
            .is_none());
    }
}
