//! Storage module for persisting audit data
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Project and crawl persistence
//! - Page reports with their links, hreflangs and resources
//! - Issues and their aggregation
//! - Batched retention of previous crawls

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use serde::Serialize;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(StorageError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> StorageResult<SqliteStorage> {
    SqliteStorage::new(path)
}

/// Locks a shared storage backend
///
/// A poisoned lock surfaces as a `StorageError` instead of a panic.
pub fn lock_storage<S>(storage: &Mutex<S>) -> StorageResult<MutexGuard<'_, S>> {
    storage
        .lock()
        .map_err(|_| StorageError::Database("storage lock poisoned".to_string()))
}

/// A persisted page report as listed by the issue service
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageReportRecord {
    pub id: i64,
    pub url: String,
    pub status_code: u16,
    pub media_type: String,
    pub title: String,
    pub depth: u32,
}
