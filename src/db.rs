//! SQLite connection management for the persisted collection.
//!
//! WAL mode is enabled on every connection so that concurrent searches from
//! the HTTP server do not block on a writer. The file and its parent
//! directories are only created when `create` is set: opening a collection
//! that was never written must not leave an empty database behind.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

use ragline_core::{Error, Result};

/// Open a pool on `path` (up to 5 connections).
pub async fn connect(path: &Path, create: bool) -> Result<SqlitePool> {
    if create {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
        .map_err(Error::storage)?
        .create_if_missing(create)
        .journal_mode(SqliteJournalMode::Wal);

    SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .map_err(Error::storage)
}
