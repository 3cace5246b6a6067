//! Scoped SQLite connections.
//!
//! Both relational stores (credentials, patient data) are opened with a
//! short-lived connection per operation: open, execute, close. There is no
//! pool; every lookup sees fresh data and nothing holds a handle across
//! requests.

use anyhow::Result;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{ConnectOptions, SqliteConnection};
use std::path::Path;

/// Open a connection to an existing database. Fails if the file is absent.
pub async fn open(path: &Path) -> Result<SqliteConnection> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(false);
    Ok(options.connect().await?)
}

/// Open a connection, creating the database file (and parent directories)
/// when missing. Used by migrations only.
pub async fn open_or_create(path: &Path) -> Result<SqliteConnection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);
    Ok(options.connect().await?)
}
