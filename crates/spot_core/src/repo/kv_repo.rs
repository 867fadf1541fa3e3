//! Key-value repository contracts with SQLite and in-memory backends.
//!
//! # Invariants
//! - `set` overwrites the whole value for a key; there are no partial writes.
//! - SQLite-backed repositories require a migrated connection.

use crate::db::migrations::latest_version;
use crate::db::{open_db, DbError};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

pub type StorageResult<T> = Result<T, StorageError>;

/// Errors from durable storage reads and writes.
#[derive(Debug)]
pub enum StorageError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Task sequence could not be encoded or decoded as JSON.
    Encoding(serde_json::Error),
    /// Backend refused the write (e.g. quota exhausted).
    WriteRejected(String),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
}

impl Display for StorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Encoding(err) => write!(f, "task encoding failed: {err}"),
            Self::WriteRejected(message) => write!(f, "storage write rejected: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "kv repository requires schema version {expected_version}, got {actual_version}"
            ),
        }
    }
}

impl Error for StorageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Encoding(err) => Some(err),
            Self::WriteRejected(_) | Self::UninitializedConnection { .. } => {
                None
            }
        }
    }
}

impl From<DbError> for StorageError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(value: serde_json::Error) -> Self {
        Self::Encoding(value)
    }
}

/// Durable string key-value storage provided by the host.
pub trait KvRepository {
    /// Reads one value.
    fn get(&self, key: &str) -> StorageResult<Option<String>>;
    /// Overwrites one value.
    fn set(&mut self, key: &str, value: &str) -> StorageResult<()>;
    /// Removes one value; returns whether it existed.
    fn remove(&mut self, key: &str) -> StorageResult<bool>;
}

/// SQLite-backed key-value repository.
pub struct SqliteKvRepository {
    conn: Connection,
}

impl SqliteKvRepository {
    /// Wraps an already migrated connection.
    pub fn try_new(conn: Connection) -> StorageResult<Self> {
        let actual_version =
            conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
        let expected_version = latest_version();
        if actual_version != expected_version {
            return Err(StorageError::UninitializedConnection {
                expected_version,
                actual_version,
            });
        }
        Ok(Self { conn })
    }

    /// Opens (and migrates) a database file.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        Self::try_new(open_db(path)?)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl KvRepository for SqliteKvRepository {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM kv_entries WHERE key = ?1;",
                [key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&mut self, key: &str, value: &str) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO kv_entries (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> StorageResult<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM kv_entries WHERE key = ?1;", [key])?;
        Ok(changed > 0)
    }
}

/// In-process key-value repository.
///
/// `reject_writes` simulates a host that refuses writes (quota exceeded).
#[derive(Debug, Default)]
pub struct MemoryKvRepository {
    entries: HashMap<String, String>,
    reject_writes: bool,
    write_count: usize,
}

impl MemoryKvRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a repository pre-populated with one entry.
    pub fn with_entry(key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut repo = Self::default();
        repo.entries.insert(key.into(), value.into());
        repo
    }

    pub fn set_reject_writes(&mut self, reject: bool) {
        self.reject_writes = reject;
    }

    /// Number of successful `set` calls.
    pub fn write_count(&self) -> usize {
        self.write_count
    }
}

impl KvRepository for MemoryKvRepository {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> StorageResult<()> {
        if self.reject_writes {
            return Err(StorageError::WriteRejected(format!(
                "quota exceeded writing `{key}`"
            )));
        }
        self.entries.insert(key.to_string(), value.to_string());
        self.write_count += 1;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> StorageResult<bool> {
        Ok(self.entries.remove(key).is_some())
    }
}
