use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::breathing::BreathingPattern;
use crate::reminders::ReminderId;
use crate::timer::{Phase, Settings};

/// Every state change in the system produces an Event.
/// The CLI prints them; a session forwards them to its observer channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    TimerStarted {
        phase: Phase,
        remaining_ms: u64,
        deadline: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    TimerPaused {
        phase: Phase,
        remaining_ms: u64,
        at: DateTime<Utc>,
    },
    TimerReset {
        phase: Phase,
        at: DateTime<Utc>,
    },
    /// A phase ended, either naturally or through skip.
    PhaseCompleted {
        from: Phase,
        to: Phase,
        completed_rounds: u32,
        skipped: bool,
        /// Whether the next phase is already counting down.
        running: bool,
        at: DateTime<Utc>,
    },
    SettingsUpdated {
        settings: Settings,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        phase: Phase,
        running: bool,
        remaining_ms: u64,
        total_ms: u64,
        progress_pct: u8,
        completed_rounds: u32,
        at: DateTime<Utc>,
    },
    ReminderScheduled {
        id: ReminderId,
        label: String,
        fires_at: DateTime<Utc>,
    },
    ReminderFired {
        id: ReminderId,
        label: String,
        at: DateTime<Utc>,
    },
    ReminderCancelled {
        id: ReminderId,
        at: DateTime<Utc>,
    },
    BreathingStep {
        pattern: BreathingPattern,
        cue: String,
        at: DateTime<Utc>,
    },
    BreathingEnded {
        pattern: BreathingPattern,
        cancelled: bool,
        at: DateTime<Utc>,
    },
    /// Non-blocking problem the user should see, e.g. state that could not
    /// be saved and will not survive a restart.
    Warning {
        message: String,
        at: DateTime<Utc>,
    },
    /// Every change that failed to save earlier has now been written.
    PersistenceRestored {
        at: DateTime<Utc>,
    },
}

impl Event {
    pub fn warning(message: impl Into<String>, at: DateTime<Utc>) -> Self {
        Event::Warning {
            message: message.into(),
            at,
        }
    }
}
