//! Watermark store implementations

use rusqlite::{Connection, OptionalExtension, params};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tracing::{debug, info};

use crate::WATERMARK_KEY;

/// Errors from the watermark store
///
/// Every one of these is fatal: without a durable watermark the relay can
/// neither avoid duplicates nor know where to resume.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Stored watermark {0} is negative")]
    Corrupt(i64),

    #[error("Watermark {0} does not fit in storage")]
    OutOfRange(u64),

    #[error("Watermark store lock poisoned")]
    Poisoned,
}

/// Durable record of the last delivered event id
pub trait WatermarkStore: Send + Sync {
    /// Last committed watermark, None if never set
    fn get(&self) -> Result<Option<u64>, StoreError>;

    /// Replace the watermark; durable once this returns Ok
    fn set(&self, value: u64) -> Result<(), StoreError>;
}

/// Watermark kept in a single-row SQLite table
///
/// Each `set` is one autocommitted statement, so a crash leaves either the
/// old or the new value, never a mix.
pub struct SqliteWatermarkStore {
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl SqliteWatermarkStore {
    /// Open or create the store at the given path
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&path)?;
        let journal_mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        debug!(%journal_mode, "open: journal mode set");
        conn.pragma_update(None, "synchronous", "FULL")?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS watermark (
                key   TEXT PRIMARY KEY NOT NULL,
                value INTEGER NOT NULL
            )",
            [],
        )?;

        info!(path = %path.display(), "Opened watermark store");
        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    /// Path of the database file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl WatermarkStore for SqliteWatermarkStore {
    fn get(&self) -> Result<Option<u64>, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let value: Option<i64> = conn
            .query_row(
                "SELECT value FROM watermark WHERE key = ?1",
                params![WATERMARK_KEY],
                |row| row.get(0),
            )
            .optional()?;

        match value {
            Some(v) => u64::try_from(v).map(Some).map_err(|_| StoreError::Corrupt(v)),
            None => Ok(None),
        }
    }

    fn set(&self, value: u64) -> Result<(), StoreError> {
        let stored = i64::try_from(value).map_err(|_| StoreError::OutOfRange(value))?;
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        conn.execute(
            "INSERT INTO watermark (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![WATERMARK_KEY, stored],
        )?;
        debug!(watermark = value, "Watermark committed");
        Ok(())
    }
}
