mod config;
pub mod database;
pub mod lease;
pub mod memory;

pub use config::{Config, LeaseConfig, NotificationsConfig};
pub use database::SqliteStore;
pub use lease::{Lease, LeaseHolder};
pub use memory::MemoryStore;

use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::PersistenceError;

/// Record holding user [`Settings`](crate::timer::Settings).
pub const SETTINGS_KEY: &str = "settings";
/// Record holding the persisted [`CycleState`](crate::timer::CycleState).
pub const CYCLE_STATE_KEY: &str = "cycleState";
/// Record holding the unfired reminders.
pub const REMINDERS_KEY: &str = "reminders";
/// Record holding the single-writer lease.
pub const LEASE_KEY: &str = "lease";

/// Key-value persistence for JSON documents.
///
/// An absent key is `Ok(None)`, never an error, so first runs fall back to
/// defaults.
pub trait Store: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<serde_json::Value>, PersistenceError>;
    fn set(&self, key: &str, value: &serde_json::Value) -> Result<(), PersistenceError>;
}

/// Read and decode a typed record.
pub fn load_record<T: DeserializeOwned>(
    store: &dyn Store,
    key: &str,
) -> Result<Option<T>, PersistenceError> {
    match store.get(key)? {
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|source| PersistenceError::Corrupt {
                key: key.to_string(),
                source,
            }),
        None => Ok(None),
    }
}

/// Encode and write a typed record.
pub fn save_record<T: Serialize>(
    store: &dyn Store,
    key: &str,
    record: &T,
) -> Result<(), PersistenceError> {
    let value = serde_json::to_value(record).map_err(|e| PersistenceError::write(key, e))?;
    store.set(key, &value)
}

/// Returns the data directory, creating it if needed.
///
/// `FOCUSCYCLE_DATA_DIR` wins when set. Otherwise this is
/// `~/.config/focuscycle`, or `~/.config/focuscycle-dev` when
/// `FOCUSCYCLE_ENV=dev`.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, PersistenceError> {
    let dir = match std::env::var_os("FOCUSCYCLE_DATA_DIR") {
        Some(custom) => PathBuf::from(custom),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");

            let env = std::env::var("FOCUSCYCLE_ENV").unwrap_or_else(|_| "production".to_string());

            if env == "dev" {
                base_dir.join("focuscycle-dev")
            } else {
                base_dir.join("focuscycle")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| PersistenceError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
