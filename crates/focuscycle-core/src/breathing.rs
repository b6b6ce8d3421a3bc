//! Guided breathing sequences.
//!
//! A sequence is a fixed chain of timed cues armed in a [`DeferredQueue`]
//! when it starts. The owner polls it with the current time; starting a new
//! sequence or stopping replaces every pending cue, so nothing from an old
//! sequence leaks into the next one. Sequences are not persisted.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::clock::DeferredQueue;
use crate::error::ValidationError;
use crate::events::Event;

/// First cue, shown as soon as a sequence starts.
pub const PREPARE_CUE: &str = "Get ready...";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BreathingPattern {
    /// In 4 s, hold 4 s, out 6 s.
    FourFourSix,
    /// In, hold, out, hold; 4 s each.
    Square,
}

impl BreathingPattern {
    /// Cue offsets from the start, in milliseconds. `None` ends the sequence.
    fn script(self) -> &'static [(i64, Option<&'static str>)] {
        match self {
            BreathingPattern::FourFourSix => &[
                (300, Some("Breathe in for 4s...")),
                (4_300, Some("Hold for 4s...")),
                (8_300, Some("Breathe out for 6s...")),
                (14_300, Some("Done. Stay calm.")),
                (17_300, None),
            ],
            BreathingPattern::Square => &[
                (300, Some("Breathe in for 4s...")),
                (4_300, Some("Hold for 4s...")),
                (8_300, Some("Breathe out for 4s...")),
                (12_300, Some("Hold for 4s...")),
                (16_300, Some("Done. Breathe normally.")),
                (19_300, None),
            ],
        }
    }

    /// Time from start until the sequence ends.
    pub fn length(self) -> Duration {
        let last = self.script().last().map_or(0, |(ms, _)| *ms);
        Duration::milliseconds(last)
    }
}

impl fmt::Display for BreathingPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BreathingPattern::FourFourSix => "446",
            BreathingPattern::Square => "square",
        })
    }
}

impl FromStr for BreathingPattern {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "446" | "4-4-6" => Ok(BreathingPattern::FourFourSix),
            "square" | "box" => Ok(BreathingPattern::Square),
            _ => Err(ValidationError::InvalidValue {
                field: "pattern".into(),
                message: format!("expected 446 or square, got '{s}'"),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Cue {
    pattern: BreathingPattern,
    text: Option<&'static str>,
}

/// Runs at most one breathing sequence at a time.
#[derive(Debug, Default)]
pub struct BreathingGuide {
    queue: DeferredQueue<Cue>,
    active: Option<BreathingPattern>,
}

impl BreathingGuide {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start `pattern` at `now`, replacing any running sequence.
    ///
    /// Returns the events for the replaced sequence (if any) and the
    /// opening cue.
    pub fn start(&mut self, pattern: BreathingPattern, now: DateTime<Utc>) -> Vec<Event> {
        let mut events: Vec<Event> = self.stop(now).into_iter().collect();
        for &(offset_ms, text) in pattern.script() {
            self.queue
                .schedule_after(now, Duration::milliseconds(offset_ms), Cue { pattern, text });
        }
        self.active = Some(pattern);
        info!(%pattern, "breathing sequence started");
        events.push(Event::BreathingStep {
            pattern,
            cue: PREPARE_CUE.to_string(),
            at: now,
        });
        events
    }

    /// Emit every cue that is due, in order.
    pub fn poll(&mut self, now: DateTime<Utc>) -> Vec<Event> {
        let mut events = Vec::new();
        for cue in self.queue.pop_due(now) {
            match cue.text {
                Some(text) => {
                    debug!(pattern = %cue.pattern, cue = text, "breathing cue");
                    events.push(Event::BreathingStep {
                        pattern: cue.pattern,
                        cue: text.to_string(),
                        at: now,
                    });
                }
                None => {
                    self.active = None;
                    info!(pattern = %cue.pattern, "breathing sequence finished");
                    events.push(Event::BreathingEnded {
                        pattern: cue.pattern,
                        cancelled: false,
                        at: now,
                    });
                }
            }
        }
        events
    }

    /// Cancel the running sequence. `None` when nothing was running.
    pub fn stop(&mut self, now: DateTime<Utc>) -> Option<Event> {
        let pattern = self.active.take()?;
        self.queue.clear();
        info!(%pattern, "breathing sequence cancelled");
        Some(Event::BreathingEnded {
            pattern,
            cancelled: true,
            at: now,
        })
    }

    pub fn active(&self) -> Option<BreathingPattern> {
        self.active
    }

    /// When the next cue is due.
    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        self.queue.next_due()
    }
}
