//! SQLite-backed key-value store.
//!
//! Every record lives in one `kv` table keyed by `(profile, key)`, so several
//! local profiles can share a database file without seeing each other's
//! timer state.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection};

use super::{data_dir, Store};
use crate::error::PersistenceError;

/// SQLite database for engine records.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    profile: String,
}

impl SqliteStore {
    /// Open the database at `<data dir>/focuscycle.db`.
    ///
    /// # Errors
    /// Returns an error if the data directory or database cannot be opened.
    pub fn open_default(profile: &str) -> Result<Self, PersistenceError> {
        let path = data_dir()?.join("focuscycle.db");
        Self::open(&path, profile)
    }

    /// Open (or create) the database at `path`.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(path: &Path, profile: &str) -> Result<Self, PersistenceError> {
        let conn = Connection::open(path).map_err(|source| PersistenceError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::with_connection(conn, profile)
    }

    /// Open an in-memory database.
    pub fn open_memory(profile: &str) -> Result<Self, PersistenceError> {
        let conn = Connection::open_in_memory().map_err(|source| PersistenceError::OpenFailed {
            path: ":memory:".into(),
            source,
        })?;
        Self::with_connection(conn, profile)
    }

    fn with_connection(conn: Connection, profile: &str) -> Result<Self, PersistenceError> {
        migrate(&conn).map_err(|e| PersistenceError::write("kv", e))?;
        Ok(Self {
            conn: Mutex::new(conn),
            profile: profile.to_string(),
        })
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    /// Raw string lookup.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| PersistenceError::read(key, "connection lock poisoned"))?;
        let result = conn.query_row(
            "SELECT value FROM kv WHERE profile = ?1 AND key = ?2",
            params![self.profile, key],
            |row| row.get::<_, String>(0),
        );
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(PersistenceError::read(key, e)),
        }
    }

    /// Raw string upsert.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| PersistenceError::write(key, "connection lock poisoned"))?;
        conn.execute(
            "INSERT OR REPLACE INTO kv (profile, key, value) VALUES (?1, ?2, ?3)",
            params![self.profile, key, value],
        )
        .map_err(|e| PersistenceError::write(key, e))?;
        Ok(())
    }
}

fn migrate(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS kv (
            profile TEXT NOT NULL,
            key     TEXT NOT NULL,
            value   TEXT NOT NULL,
            PRIMARY KEY (profile, key)
        );",
    )
}

impl Store for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<serde_json::Value>, PersistenceError> {
        match self.kv_get(key)? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|source| PersistenceError::Corrupt {
                    key: key.to_string(),
                    source,
                }),
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &serde_json::Value) -> Result<(), PersistenceError> {
        self.kv_set(key, &value.to_string())
    }
}
