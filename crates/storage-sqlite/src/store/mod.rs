mod model;
mod repository;

pub use model::{CacheEntryDB, LocalRecordDB, MetadataDB, SyncQueueItemDB};
pub use repository::SqliteLocalStore;
