//! In-process store, used by tests and simulations.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use super::Store;
use crate::error::PersistenceError;

/// HashMap-backed [`Store`] with switchable failures.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, serde_json::Value>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `get` fail (or succeed again).
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `set` fail (or succeed again).
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Direct peek at a record, bypassing failure injection.
    pub fn raw(&self, key: &str) -> Option<serde_json::Value> {
        self.records.lock().ok()?.get(key).cloned()
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<serde_json::Value>, PersistenceError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(PersistenceError::read(key, "store unavailable"));
        }
        let records = self
            .records
            .lock()
            .map_err(|_| PersistenceError::read(key, "store lock poisoned"))?;
        Ok(records.get(key).cloned())
    }

    fn set(&self, key: &str, value: &serde_json::Value) -> Result<(), PersistenceError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PersistenceError::write(key, "store unavailable"));
        }
        let mut records = self
            .records
            .lock()
            .map_err(|_| PersistenceError::write(key, "store lock poisoned"))?;
        records.insert(key.to_string(), value.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
