use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    Work,
    ShortBreak,
    LongBreak,
}

impl Phase {
    pub fn label(self) -> &'static str {
        match self {
            Phase::Work => "Focus",
            Phase::ShortBreak => "Short break",
            Phase::LongBreak => "Long break",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Work => "work",
            Phase::ShortBreak => "shortBreak",
            Phase::LongBreak => "longBreak",
        };
        f.write_str(s)
    }
}

impl FromStr for Phase {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "work" | "focus" => Ok(Phase::Work),
            "short" | "shortbreak" => Ok(Phase::ShortBreak),
            "long" | "longbreak" => Ok(Phase::LongBreak),
            _ => Err(ValidationError::InvalidValue {
                field: "phase".into(),
                message: format!("expected work, short or long, got '{s}'"),
            }),
        }
    }
}

/// Persisted cycle position.
///
/// While running, remaining time is `deadline - now`. While stopped with a
/// deadline, it is `deadline - paused_at`, which keeps a paused countdown
/// frozen no matter how long the process sleeps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleState {
    pub phase: Phase,
    #[serde(default)]
    pub is_running: bool,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_rounds: u32,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub paused_at: Option<DateTime<Utc>>,
}

impl CycleState {
    /// Fresh, unstarted state at `phase`.
    pub fn new(phase: Phase) -> Self {
        Self {
            phase,
            is_running: false,
            deadline: None,
            completed_rounds: 0,
            paused_at: None,
        }
    }

    /// Remaining time against absolute timestamps, clamped to
    /// `[0, total]`. `total` is the phase's configured duration.
    pub fn remaining_at(&self, now: DateTime<Utc>, total: Duration) -> Duration {
        let Some(deadline) = self.deadline else {
            return total;
        };
        let reference = if self.is_running {
            now
        } else {
            self.paused_at.unwrap_or(now)
        };
        (deadline - reference).clamp(Duration::zero(), total)
    }

    /// Repair documents that break the running-implies-deadline invariant.
    /// Returns true when something changed.
    pub(crate) fn normalize(&mut self) -> bool {
        if self.is_running && self.deadline.is_none() {
            self.is_running = false;
            return true;
        }
        if self.is_running && self.paused_at.is_some() {
            self.paused_at = None;
            return true;
        }
        false
    }
}

impl Default for CycleState {
    fn default() -> Self {
        Self::new(Phase::Work)
    }
}
