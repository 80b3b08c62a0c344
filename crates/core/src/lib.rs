//! Core domain model and synchronization engine for the fieldsync local-first outbox.
//!
//! Storage and network access are abstracted behind [`sync::LocalStore`] and
//! [`sync::RemoteDispatcher`]; concrete implementations live in the
//! `fieldsync-storage-sqlite` and `fieldsync-remote` crates.

pub mod errors;
pub mod sync;

pub use errors::{DatabaseError, Error, Result};
