//! Local key-value storage for float
//!
//! The store persists three string values (see [`POD_KEY`], [`IDENTITY_KEY`],
//! [`ACTIVE_POD_KEY`]). [`SqliteStore`] keeps them in a single SQLite table,
//! [`MemoryStore`] keeps them in process and can enforce a byte quota.

use std::collections::HashMap;

use rusqlite::{params, Connection, OptionalExtension};

use crate::config::FloatPaths;

/// JSON array of every pod
pub const POD_KEY: &str = "floatPods";
/// JSON array of every master identity
pub const IDENTITY_KEY: &str = "floatIdentities";
/// Id of the active pod; absent when none is active
pub const ACTIVE_POD_KEY: &str = "floatActivePod";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Storage quota of {limit} bytes exceeded while writing '{key}'")]
    QuotaExceeded { key: String, limit: usize },
}

/// A single write in a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KvWrite {
    Set { key: &'static str, value: String },
    Remove { key: &'static str },
}

/// String key-value storage
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;

    fn remove(&mut self, key: &str) -> Result<(), StorageError>;

    /// Apply a batch of writes. Backends that can should make the batch atomic.
    fn apply(&mut self, writes: &[KvWrite]) -> Result<(), StorageError> {
        for write in writes {
            match write {
                KvWrite::Set { key, value } => self.set(key, value)?,
                KvWrite::Remove { key } => self.remove(key)?,
            }
        }
        Ok(())
    }
}

/// SQLite-backed storage
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (creating if needed) the database at the configured path
    pub fn open(paths: &FloatPaths) -> Result<Self, StorageError> {
        let conn = Connection::open(&paths.db_file)?;
        Self::init(conn)
    }

    /// Open a private in-memory database
    pub fn in_memory() -> Result<Self, StorageError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StorageError> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key    TEXT PRIMARY KEY,
                value  TEXT NOT NULL
            )
            "#,
            [],
        )?;
        Ok(Self { conn })
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }

    fn apply(&mut self, writes: &[KvWrite]) -> Result<(), StorageError> {
        let tx = self.conn.transaction()?;
        for write in writes {
            match write {
                KvWrite::Set { key, value } => {
                    tx.execute(
                        "INSERT INTO kv (key, value) VALUES (?1, ?2)
                         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                        params![key, value],
                    )?;
                }
                KvWrite::Remove { key } => {
                    tx.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
                }
            }
        }
        tx.commit()?;
        Ok(())
    }
}

/// In-process storage, optionally limited to a total number of bytes
/// (keys plus values), like a browser storage quota.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
    quota: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(limit: usize) -> Self {
        Self {
            entries: HashMap::new(),
            quota: Some(limit),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn used_bytes(entries: &HashMap<String, String>) -> usize {
        entries.iter().map(|(k, v)| k.len() + v.len()).sum()
    }

    fn check_quota(&self, entries: &HashMap<String, String>, key: &str) -> Result<(), StorageError> {
        match self.quota {
            Some(limit) if Self::used_bytes(entries) > limit => Err(StorageError::QuotaExceeded {
                key: key.to_string(),
                limit,
            }),
            _ => Ok(()),
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut next = self.entries.clone();
        next.insert(key.to_string(), value.to_string());
        self.check_quota(&next, key)?;
        self.entries = next;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.entries.remove(key);
        Ok(())
    }

    // All-or-nothing: the quota is checked against the final state
    fn apply(&mut self, writes: &[KvWrite]) -> Result<(), StorageError> {
        let mut next = self.entries.clone();
        for write in writes {
            match write {
                KvWrite::Set { key, value } => {
                    next.insert(key.to_string(), value.clone());
                    self.check_quota(&next, key)?;
                }
                KvWrite::Remove { key } => {
                    next.remove(*key);
                }
            }
        }
        self.entries = next;
        Ok(())
    }
}
