//! TOML-based application configuration.
//!
//! Stores process-level preferences that are not part of the timer
//! settings document:
//! - Which local profile the engines read and write
//! - Session tick granularity
//! - Desktop notification backend toggle
//! - Single-writer lease duration
//!
//! Configuration is stored at `~/.config/focuscycle/config.toml`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::ConfigError;

/// Upper bound on the session tick interval.
pub const MAX_TICK_INTERVAL_MS: u64 = 250;
/// Upper bound on the lease lifetime (one day).
pub const MAX_LEASE_TTL_SECS: u64 = 86_400;

/// Notification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    /// Use the platform notification service. When off, side effects are
    /// dropped regardless of the timer settings.
    ///
    /// The completion tone is a terminal bell written to stderr, so it is
    /// inaudible when stderr is redirected to a file or pipe.
    #[serde(default = "default_true")]
    pub desktop: bool,
    #[serde(default = "default_app_name")]
    pub app_name: String,
}

/// Lease configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaseConfig {
    #[serde(default = "default_lease_ttl_secs")]
    pub ttl_secs: u64,
}

/// Application configuration.
///
/// Serialized to/from TOML at `<data dir>/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_profile")]
    pub profile: String,
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub lease: LeaseConfig,
}

fn default_profile() -> String {
    "default".into()
}
fn default_tick_interval_ms() -> u64 {
    MAX_TICK_INTERVAL_MS
}
fn default_true() -> bool {
    true
}
fn default_app_name() -> String {
    "focuscycle".into()
}
fn default_lease_ttl_secs() -> u64 {
    30
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            desktop: true,
            app_name: default_app_name(),
        }
    }
}

impl Default for LeaseConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_lease_ttl_secs(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            tick_interval_ms: default_tick_interval_ms(),
            notifications: NotificationsConfig::default(),
            lease: LeaseConfig::default(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if parts.peek().is_none() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => serde_json::Value::Number(
                        value
                            .parse::<u64>()
                            .map_err(|e| invalid(e.to_string()))?
                            .into(),
                    ),
                    serde_json::Value::Object(_) => return Err(unknown()),
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    fn path() -> Result<PathBuf, ConfigError> {
        let dir = data_dir().map_err(|e| ConfigError::LoadFailed {
            path: PathBuf::from("config.toml"),
            message: e.to_string(),
        })?;
        Ok(dir.join("config.toml"))
    }

    /// Load from disk or create the default file.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from an explicit path, writing defaults there if it is missing.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config = toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(_) => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key without saving.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value does not parse
    /// or validate. On error `self` is unchanged.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let next: Config = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        next.validate()?;
        *self = next;
        Ok(())
    }

    /// Set a config value by key and save.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.apply(key, value)?;
        self.save()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval_ms == 0 || self.tick_interval_ms > MAX_TICK_INTERVAL_MS {
            return Err(ConfigError::InvalidValue {
                key: "tick_interval_ms".into(),
                message: format!("must be between 1 and {MAX_TICK_INTERVAL_MS}"),
            });
        }
        if self.lease.ttl_secs == 0 || self.lease.ttl_secs > MAX_LEASE_TTL_SECS {
            return Err(ConfigError::InvalidValue {
                key: "lease.ttl_secs".into(),
                message: format!("must be between 1 and {MAX_LEASE_TTL_SECS}"),
            });
        }
        if self.profile.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "profile".into(),
                message: "must not be empty".into(),
            });
        }
        Ok(())
    }

    /// Every dotted key accepted by [`Config::get`] and [`Config::set`].
    pub const KEYS: [&'static str; 5] = [
        "profile",
        "tick_interval_ms",
        "notifications.desktop",
        "notifications.app_name",
        "lease.ttl_secs",
    ];

    pub fn tick_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.tick_interval_ms.clamp(1, MAX_TICK_INTERVAL_MS))
    }

    /// # Errors
    /// A TTL outside `1..=MAX_LEASE_TTL_SECS`, e.g. from a hand-edited file.
    pub fn lease_ttl(&self) -> Result<chrono::Duration, ConfigError> {
        let invalid = || ConfigError::InvalidValue {
            key: "lease.ttl_secs".into(),
            message: format!("must be between 1 and {MAX_LEASE_TTL_SECS}"),
        };
        if self.lease.ttl_secs == 0 || self.lease.ttl_secs > MAX_LEASE_TTL_SECS {
            return Err(invalid());
        }
        let secs = i64::try_from(self.lease.ttl_secs).map_err(|_| invalid())?;
        chrono::Duration::try_seconds(secs).ok_or_else(invalid)
    }
}
