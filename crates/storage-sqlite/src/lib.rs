//! SQLite implementation of the fieldsync local durable store.

pub mod db;
pub mod errors;
pub mod schema;
pub mod store;

pub use db::{create_pool, get_connection, init, run_migrations, DbPool, WriteHandle};
pub use errors::StorageError;
pub use store::SqliteLocalStore;
