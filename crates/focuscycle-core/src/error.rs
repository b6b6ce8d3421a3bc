//! Core error types for focuscycle-core.
//!
//! None of these are fatal: persistence failures leave the engines running
//! on in-memory state, invalid settings are rejected at the update boundary,
//! and cancelling an unknown reminder is not an error at all.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for focuscycle-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Store read/write failed
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// Rejected settings update
    #[error("Invalid settings: {0}")]
    InvalidSettings(#[from] ValidationError),

    /// Application config errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Another session owns the persisted state
    #[error("Lease error: {0}")]
    Lease(#[from] LeaseError),
}

/// Store-level failures.
///
/// The engines treat every variant as recoverable: in-memory state stays
/// authoritative and the next mutation retries the write.
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// Failed to open the backing database
    #[error("Failed to open store at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Reading a record failed
    #[error("Failed to read '{key}': {message}")]
    ReadFailed { key: String, message: String },

    /// Writing a record failed
    #[error("Failed to write '{key}': {message}")]
    WriteFailed { key: String, message: String },

    /// A stored record does not match the expected schema
    #[error("Record '{key}' is corrupt: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// Could not determine where to keep data
    #[error("Failed to access data directory: {0}")]
    DataDir(String),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Unknown dotted key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },

    /// Unknown field name
    #[error("Unknown field: {0}")]
    UnknownField(String),
}

/// Single-writer lease errors.
#[derive(Error, Debug)]
pub enum LeaseError {
    #[error("State is held by session {owner} until {expires_at}")]
    Held {
        owner: String,
        expires_at: chrono::DateTime<chrono::Utc>,
    },

    #[error("Lease lost to session {0}")]
    Lost(String),
}

impl PersistenceError {
    pub(crate) fn read(key: &str, err: impl std::fmt::Display) -> Self {
        PersistenceError::ReadFailed {
            key: key.to_string(),
            message: err.to_string(),
        }
    }

    pub(crate) fn write(key: &str, err: impl std::fmt::Display) -> Self {
        PersistenceError::WriteFailed {
            key: key.to_string(),
            message: err.to_string(),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
