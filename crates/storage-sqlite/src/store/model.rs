//! Row types for the four local store tables.

use diesel::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(
    Queryable,
    Identifiable,
    Insertable,
    AsChangeset,
    Selectable,
    Debug,
    Clone,
    Serialize,
    Deserialize,
)]
#[diesel(table_name = crate::schema::records)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct LocalRecordDB {
    pub id: String,
    pub entity_type: String,
    pub data: String,
    pub sync_status: String,
    pub created_at: String,
    pub updated_at: String,
    pub synced_at: Option<String>,
}

#[derive(
    Queryable,
    Identifiable,
    Insertable,
    AsChangeset,
    Selectable,
    Debug,
    Clone,
    Serialize,
    Deserialize,
)]
#[diesel(table_name = crate::schema::sync_queue)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SyncQueueItemDB {
    pub id: String,
    pub action: String,
    pub entity_type: String,
    pub endpoint: String,
    pub payload: String,
    pub retries: i32,
    pub created_at: String,
}

/// `expires_at` is epoch milliseconds so expiry filters stay numeric.
#[derive(
    Queryable,
    Identifiable,
    Insertable,
    AsChangeset,
    Selectable,
    Debug,
    Clone,
    Serialize,
    Deserialize,
)]
#[diesel(primary_key(key))]
#[diesel(table_name = crate::schema::cache)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct CacheEntryDB {
    pub key: String,
    pub data: String,
    pub expires_at: i64,
}

#[derive(
    Queryable,
    Identifiable,
    Insertable,
    AsChangeset,
    Selectable,
    Debug,
    Clone,
    Serialize,
    Deserialize,
)]
#[diesel(primary_key(key))]
#[diesel(table_name = crate::schema::metadata)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct MetadataDB {
    pub key: String,
    pub value: String,
    pub updated_at: String,
}
