use chrono::Duration;
use serde::{Deserialize, Serialize};

use super::state::Phase;
use crate::error::ValidationError;

/// User-configurable cycle settings.
///
/// Persisted as camelCase JSON under the `settings` record. Fields missing
/// from a stored document fall back to their defaults one by one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default = "default_work_minutes")]
    pub work_minutes: u32,
    #[serde(default = "default_short_break_minutes")]
    pub short_break_minutes: u32,
    #[serde(default = "default_long_break_minutes")]
    pub long_break_minutes: u32,
    /// Completed work sessions before a long break is inserted.
    #[serde(default = "default_rounds_to_long")]
    pub rounds_to_long: u32,
    #[serde(default = "default_true")]
    pub auto_start_next: bool,
    #[serde(default = "default_true")]
    pub sound_enabled: bool,
    #[serde(default = "default_true")]
    pub notify_enabled: bool,
}

fn default_work_minutes() -> u32 {
    25
}
fn default_short_break_minutes() -> u32 {
    5
}
fn default_long_break_minutes() -> u32 {
    15
}
fn default_rounds_to_long() -> u32 {
    4
}
fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            work_minutes: default_work_minutes(),
            short_break_minutes: default_short_break_minutes(),
            long_break_minutes: default_long_break_minutes(),
            rounds_to_long: default_rounds_to_long(),
            auto_start_next: true,
            sound_enabled: true,
            notify_enabled: true,
        }
    }
}

impl Settings {
    /// Field names accepted by [`Settings::get`] and [`Settings::with_field`].
    pub const FIELDS: [&'static str; 7] = [
        "workMinutes",
        "shortBreakMinutes",
        "longBreakMinutes",
        "roundsToLong",
        "autoStartNext",
        "soundEnabled",
        "notifyEnabled",
    ];

    /// # Errors
    /// Rejects any duration below one minute and `roundsToLong` below one.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let positive = [
            ("workMinutes", self.work_minutes),
            ("shortBreakMinutes", self.short_break_minutes),
            ("longBreakMinutes", self.long_break_minutes),
            ("roundsToLong", self.rounds_to_long),
        ];
        for (field, value) in positive {
            if value < 1 {
                return Err(ValidationError::InvalidValue {
                    field: field.to_string(),
                    message: format!("must be at least 1, got {value}"),
                });
            }
        }
        Ok(())
    }

    /// Configured length of `phase`.
    pub fn duration(&self, phase: Phase) -> Duration {
        let minutes = match phase {
            Phase::Work => self.work_minutes,
            Phase::ShortBreak => self.short_break_minutes,
            Phase::LongBreak => self.long_break_minutes,
        };
        Duration::minutes(i64::from(minutes))
    }

    /// Phase that follows a completed work session, given the round count
    /// after that session.
    pub fn break_after(&self, completed_rounds: u32) -> Phase {
        if self.rounds_to_long > 0 && completed_rounds % self.rounds_to_long == 0 {
            Phase::LongBreak
        } else {
            Phase::ShortBreak
        }
    }

    /// Read one field as a string.
    pub fn get(&self, field: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        json.get(field).map(|v| v.to_string())
    }

    /// Copy with one field replaced, parsed from text and validated.
    ///
    /// # Errors
    /// Unknown field, unparsable value, or a value that fails validation.
    pub fn with_field(&self, field: &str, value: &str) -> Result<Settings, ValidationError> {
        let invalid = |message: String| ValidationError::InvalidValue {
            field: field.to_string(),
            message,
        };

        let mut json = serde_json::to_value(self).map_err(|e| invalid(e.to_string()))?;
        let obj = json
            .as_object_mut()
            .ok_or_else(|| ValidationError::UnknownField(field.to_string()))?;
        let existing = obj
            .get(field)
            .ok_or_else(|| ValidationError::UnknownField(field.to_string()))?;

        let new_value = match existing {
            serde_json::Value::Bool(_) => serde_json::Value::Bool(
                value
                    .parse::<bool>()
                    .map_err(|_| invalid(format!("expected true or false, got '{value}'")))?,
            ),
            _ => serde_json::Value::Number(
                value
                    .parse::<u32>()
                    .map_err(|_| invalid(format!("expected a whole number, got '{value}'")))?
                    .into(),
            ),
        };
        obj.insert(field.to_string(), new_value);

        let next: Settings = serde_json::from_value(json).map_err(|e| invalid(e.to_string()))?;
        next.validate()?;
        Ok(next)
    }
}
