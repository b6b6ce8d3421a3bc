//! Cycle engine implementation.
//!
//! The cycle engine is a wall-clock-based state machine. It does not use
//! internal threads - the caller is responsible for calling `tick()`
//! periodically. Remaining time is always derived from the stored deadline
//! and the injected clock, never accumulated from tick deltas, so throttled
//! or missed ticks cannot make the countdown drift.
//!
//! ## State Transitions
//!
//! ```text
//! Work -> ShortBreak -> Work -> ... -> Work -> LongBreak -> Work
//! ```
//!
//! A long break follows every `roundsToLong`-th completed work session.
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = CycleEngine::open(clock, store, notifier).value;
//! engine.start();
//! // In a loop:
//! engine.tick(); // value is Some(Event::PhaseCompleted) when a phase ends
//! ```

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use super::settings::Settings;
use super::state::{CycleState, Phase};
use crate::clock::Clock;
use crate::error::{PersistenceError, ValidationError};
use crate::events::Event;
use crate::notify::Notifier;
use crate::outcome::Outcome;
use crate::storage::{load_record, save_record, Store, CYCLE_STATE_KEY, SETTINGS_KEY};

/// Core cycle engine.
///
/// Owns [`Settings`] and [`CycleState`] exclusively; every mutation goes
/// through an operation here and is persisted before it returns.
pub struct CycleEngine {
    clock: Arc<dyn Clock>,
    store: Arc<dyn Store>,
    notifier: Arc<dyn Notifier>,
    settings: Settings,
    state: CycleState,
    /// Records whose last save failed and must be retried.
    state_dirty: bool,
    settings_dirty: bool,
    /// The last save attempt failed; further failures are logged quietly.
    save_failing: bool,
}

impl CycleEngine {
    /// Load settings and cycle state from `store`, falling back to defaults
    /// for anything absent or unreadable.
    ///
    /// A read failure is reported on the outcome; the engine is usable
    /// either way.
    pub fn open(
        clock: Arc<dyn Clock>,
        store: Arc<dyn Store>,
        notifier: Arc<dyn Notifier>,
    ) -> Outcome<Self> {
        let mut first_error: Option<PersistenceError> = None;

        let settings = match load_record::<Settings>(store.as_ref(), SETTINGS_KEY) {
            Ok(Some(settings)) => match settings.validate() {
                Ok(()) => settings,
                Err(e) => {
                    warn!(error = %e, "stored settings are invalid, using defaults");
                    Settings::default()
                }
            },
            Ok(None) => Settings::default(),
            Err(e) => {
                warn!(error = %e, "failed to load settings, using defaults");
                first_error.get_or_insert(e);
                Settings::default()
            }
        };

        let mut state_dirty = false;
        let state = match load_record::<CycleState>(store.as_ref(), CYCLE_STATE_KEY) {
            Ok(Some(mut state)) => {
                if state.normalize() {
                    warn!("stored cycle state was inconsistent, repaired");
                    state_dirty = true;
                }
                state
            }
            Ok(None) => CycleState::default(),
            Err(e) => {
                warn!(error = %e, "failed to load cycle state, starting fresh");
                first_error.get_or_insert(e);
                CycleState::default()
            }
        };

        debug!(
            phase = %state.phase,
            running = state.is_running,
            rounds = state.completed_rounds,
            "cycle engine opened"
        );

        let engine = Self {
            clock,
            store,
            notifier,
            settings,
            state,
            state_dirty,
            settings_dirty: false,
            save_failing: false,
        };
        match first_error {
            Some(e) => Outcome::degraded(engine, e),
            None => Outcome::ok(engine),
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// Current time on the engine's clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn state(&self) -> &CycleState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running
    }

    pub fn completed_rounds(&self) -> u32 {
        self.state.completed_rounds
    }

    /// Configured length of the current phase.
    pub fn total(&self) -> Duration {
        self.settings.duration(self.state.phase)
    }

    /// Remaining time right now.
    pub fn remaining(&self) -> Duration {
        self.remaining_at(self.clock.now())
    }

    pub fn remaining_at(&self, now: DateTime<Utc>) -> Duration {
        self.state.remaining_at(now, self.total())
    }

    /// 0 ..= 100 progress within the current phase.
    pub fn progress_pct(&self) -> u8 {
        progress_pct(self.total(), self.remaining())
    }

    /// True while a save is outstanding.
    pub fn has_unsaved_changes(&self) -> bool {
        self.state_dirty || self.settings_dirty
    }

    /// Build a full state snapshot event.
    pub fn snapshot(&self) -> Event {
        let now = self.clock.now();
        let total = self.total();
        let remaining = self.remaining_at(now);
        Event::StateSnapshot {
            phase: self.state.phase,
            running: self.state.is_running,
            remaining_ms: millis(remaining),
            total_ms: millis(total),
            progress_pct: progress_pct(total, remaining),
            completed_rounds: self.state.completed_rounds,
            at: now,
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Start or resume the countdown.
    ///
    /// A fresh phase gets its full duration; a paused one keeps exactly the
    /// time it had left. Already running is a no-op.
    pub fn start(&mut self) -> Outcome<Option<Event>> {
        if self.state.is_running {
            return Outcome::ok(None);
        }
        let now = self.clock.now();
        let remaining = self.remaining_at(now);
        let deadline = now + remaining;
        self.state.deadline = Some(deadline);
        self.state.paused_at = None;
        self.state.is_running = true;
        info!(phase = %self.state.phase, remaining_ms = millis(remaining), "timer started");
        self.commit(Some(Event::TimerStarted {
            phase: self.state.phase,
            remaining_ms: millis(remaining),
            deadline,
            at: now,
        }))
    }

    /// Freeze the countdown. Not running is a no-op.
    pub fn pause(&mut self) -> Outcome<Option<Event>> {
        if !self.state.is_running {
            return Outcome::ok(None);
        }
        let now = self.clock.now();
        let remaining = self.remaining_at(now);
        self.state.deadline = Some(now + remaining);
        self.state.paused_at = Some(now);
        self.state.is_running = false;
        info!(phase = %self.state.phase, remaining_ms = millis(remaining), "timer paused");
        self.commit(Some(Event::TimerPaused {
            phase: self.state.phase,
            remaining_ms: millis(remaining),
            at: now,
        }))
    }

    /// Stop, clear the deadline and round count, and move to `target`
    /// (Work when `None`).
    pub fn reset(&mut self, target: Option<Phase>) -> Outcome<Event> {
        let phase = target.unwrap_or(Phase::Work);
        self.state = CycleState::new(phase);
        info!(%phase, "timer reset");
        self.commit(Event::TimerReset {
            phase,
            at: self.clock.now(),
        })
    }

    /// Explicit phase override. Round count is not kept.
    pub fn switch_phase(&mut self, phase: Phase) -> Outcome<Event> {
        self.reset(Some(phase))
    }

    /// End the current phase now.
    ///
    /// Moves the deadline into the past and runs the same evaluation as a
    /// natural completion, so the transition happens before this returns.
    pub fn skip(&mut self) -> Outcome<Option<Event>> {
        let now = self.clock.now();
        self.state.deadline = Some(now - Duration::seconds(1));
        self.state.paused_at = None;
        self.evaluate(now, true)
    }

    /// Call periodically. The value is `Some(Event::PhaseCompleted)` when
    /// the running phase reached zero. Also retries a failed save.
    pub fn tick(&mut self) -> Outcome<Option<Event>> {
        let now = self.clock.now();
        self.evaluate(now, false)
    }

    /// Replace the settings.
    ///
    /// Duration changes apply from the next transition; an in-progress
    /// countdown is only bounded by the new duration through the clamp.
    ///
    /// # Errors
    /// Invalid settings are rejected and the previous ones stay in effect.
    pub fn update_settings(&mut self, settings: Settings) -> Result<Outcome<Event>, ValidationError> {
        settings.validate()?;
        self.settings = settings;
        info!(?settings, "settings updated");
        let event = Event::SettingsUpdated {
            settings,
            at: self.clock.now(),
        };
        Ok(match save_record(self.store.as_ref(), SETTINGS_KEY, &self.settings) {
            Ok(()) => {
                self.settings_dirty = false;
                Outcome::ok(event)
            }
            Err(e) => {
                warn!(error = %e, "failed to save settings, keeping them in memory");
                self.settings_dirty = true;
                self.save_failing = true;
                Outcome::degraded(event, e)
            }
        })
    }

    /// Change one setting by its persisted field name.
    pub fn set_setting(&mut self, field: &str, value: &str) -> Result<Outcome<Event>, ValidationError> {
        let next = self.settings.with_field(field, value)?;
        self.update_settings(next)
    }

    // ── Internal ─────────────────────────────────────────────────────

    /// The single completion path shared by tick and skip.
    fn evaluate(&mut self, now: DateTime<Utc>, skipped: bool) -> Outcome<Option<Event>> {
        let at_zero = self.remaining_at(now) == Duration::zero();
        if !(at_zero && (self.state.is_running || skipped)) {
            return self.flush();
        }

        let from = self.state.phase;
        let to = match from {
            Phase::Work => {
                self.state.completed_rounds = self.state.completed_rounds.saturating_add(1);
                self.settings.break_after(self.state.completed_rounds)
            }
            Phase::ShortBreak | Phase::LongBreak => Phase::Work,
        };

        self.announce(from, to);

        let running = self.settings.auto_start_next;
        self.state.phase = to;
        self.state.deadline = Some(now + self.settings.duration(to));
        self.state.is_running = running;
        self.state.paused_at = if running { None } else { Some(now) };

        info!(
            %from,
            %to,
            rounds = self.state.completed_rounds,
            skipped,
            running,
            "phase completed"
        );

        self.commit(Some(Event::PhaseCompleted {
            from,
            to,
            completed_rounds: self.state.completed_rounds,
            skipped,
            running,
            at: now,
        }))
    }

    fn announce(&self, from: Phase, to: Phase) {
        if self.settings.sound_enabled {
            self.notifier.play_tone();
        }
        if self.settings.notify_enabled {
            let title = match from {
                Phase::Work => "Focus session complete",
                Phase::ShortBreak | Phase::LongBreak => "Break is over",
            };
            let minutes = self.settings.duration(to).num_minutes();
            let body = match to {
                Phase::Work => format!("Time to focus ({minutes} min)."),
                Phase::ShortBreak => format!("Time for a short break ({minutes} min)."),
                Phase::LongBreak => format!("Time for a long break ({minutes} min)."),
            };
            self.notifier.show_notification(title, &body);
        }
    }

    /// Persist the state after a mutation.
    fn commit<T>(&mut self, value: T) -> Outcome<T> {
        self.state_dirty = true;
        self.flush().map(|_| value)
    }

    /// Write whatever is marked dirty; the first failure is reported.
    fn flush(&mut self) -> Outcome<Option<Event>> {
        let mut error = None;
        if self.settings_dirty {
            match save_record(self.store.as_ref(), SETTINGS_KEY, &self.settings) {
                Ok(()) => self.settings_dirty = false,
                Err(e) => error = Some(e),
            }
        }
        if self.state_dirty {
            match save_record(self.store.as_ref(), CYCLE_STATE_KEY, &self.state) {
                Ok(()) => self.state_dirty = false,
                Err(e) => {
                    error.get_or_insert(e);
                }
            }
        }
        match error {
            Some(e) => {
                if self.save_failing {
                    debug!(error = %e, "cycle state still unsaved");
                } else {
                    warn!(error = %e, "failed to persist cycle state, continuing in memory");
                }
                self.save_failing = true;
                Outcome::degraded(None, e)
            }
            None => {
                if self.save_failing && !self.has_unsaved_changes() {
                    info!("cycle state saved again");
                    self.save_failing = false;
                }
                Outcome::ok(None)
            }
        }
    }
}

fn millis(d: Duration) -> u64 {
    d.num_milliseconds().max(0) as u64
}

fn progress_pct(total: Duration, remaining: Duration) -> u8 {
    let total_ms = total.num_milliseconds();
    if total_ms <= 0 {
        return 0;
    }
    let elapsed = (total_ms - remaining.num_milliseconds()).max(0);
    ((elapsed as f64 / total_ms as f64) * 100.0).round().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::notify::RecordingNotifier;
    use crate::storage::MemoryStore;

    struct Rig {
        clock: Arc<ManualClock>,
        store: Arc<MemoryStore>,
        notifier: Arc<RecordingNotifier>,
    }

    impl Rig {
        fn new() -> Self {
            Self {
                clock: Arc::new(ManualClock::default()),
                store: Arc::new(MemoryStore::new()),
                notifier: Arc::new(RecordingNotifier::new()),
            }
        }

        fn engine(&self) -> CycleEngine {
            let out = CycleEngine::open(self.clock.clone(), self.store.clone(), self.notifier.clone());
            assert!(out.is_persisted());
            out.value
        }
    }

    #[test]
    fn fresh_engine_is_idle_work_with_full_duration() {
        let rig = Rig::new();
        let engine = rig.engine();
        assert_eq!(engine.phase(), Phase::Work);
        assert!(!engine.is_running());
        assert_eq!(engine.remaining(), Duration::minutes(25));
        assert_eq!(engine.progress_pct(), 0);
    }

    #[test]
    fn start_pause_resume() {
        let rig = Rig::new();
        let mut engine = rig.engine();

        assert!(engine.start().value.is_some());
        assert!(engine.is_running());
        assert!(engine.start().value.is_none());

        rig.clock.advance_mins(10);
        assert_eq!(engine.remaining(), Duration::minutes(15));
        assert_eq!(engine.progress_pct(), 40);

        assert!(engine.pause().value.is_some());
        assert!(!engine.is_running());
        assert!(engine.pause().value.is_none());

        rig.clock.advance_mins(30);
        assert_eq!(engine.remaining(), Duration::minutes(15));

        engine.start();
        rig.clock.advance_mins(5);
        assert_eq!(engine.remaining(), Duration::minutes(10));
    }

    #[test]
    fn natural_completion_moves_to_short_break() {
        let rig = Rig::new();
        let mut engine = rig.engine();
        engine.start();
        rig.clock.advance_mins(24);
        assert!(engine.tick().value.is_none());
        rig.clock.advance_mins(1);

        let event = engine.tick().value.unwrap();
        assert!(matches!(
            event,
            Event::PhaseCompleted {
                from: Phase::Work,
                to: Phase::ShortBreak,
                completed_rounds: 1,
                skipped: false,
                running: true,
                ..
            }
        ));
        assert_eq!(engine.remaining(), Duration::minutes(5));
        assert_eq!(rig.notifier.tone_count(), 1);
        assert_eq!(rig.notifier.notification_count(), 1);
        assert!(engine.tick().value.is_none());
    }

    #[test]
    fn stopped_timer_at_zero_does_not_complete_on_tick() {
        let rig = Rig::new();
        let mut engine = rig.engine();
        engine.start();
        rig.clock.advance_mins(10);
        engine.pause();
        rig.clock.advance_mins(60);
        assert!(engine.tick().value.is_none());
        assert_eq!(engine.phase(), Phase::Work);
    }

    #[test]
    fn break_completion_returns_to_work() {
        let rig = Rig::new();
        let mut engine = rig.engine();
        engine.switch_phase(Phase::ShortBreak);
        engine.start();
        rig.clock.advance_mins(5);
        let event = engine.tick().value.unwrap();
        assert!(matches!(
            event,
            Event::PhaseCompleted { from: Phase::ShortBreak, to: Phase::Work, completed_rounds: 0, .. }
        ));
        assert_eq!(rig.notifier.bodies(), vec!["Time to focus (25 min).".to_string()]);
    }

    #[test]
    fn auto_start_off_leaves_next_phase_stopped_at_full_length() {
        let rig = Rig::new();
        let mut engine = rig.engine();
        engine
            .update_settings(Settings {
                auto_start_next: false,
                ..Settings::default()
            })
            .unwrap();
        engine.start();
        rig.clock.advance_mins(25);
        engine.tick();
        assert_eq!(engine.phase(), Phase::ShortBreak);
        assert!(!engine.is_running());

        rig.clock.advance_mins(3);
        assert_eq!(engine.remaining(), Duration::minutes(5));
        engine.start();
        assert_eq!(engine.remaining(), Duration::minutes(5));
    }

    #[test]
    fn muted_side_effects_are_skipped() {
        let rig = Rig::new();
        let mut engine = rig.engine();
        engine
            .update_settings(Settings {
                sound_enabled: false,
                notify_enabled: false,
                ..Settings::default()
            })
            .unwrap();
        engine.skip();
        assert!(rig.notifier.notices().is_empty());
    }

    #[test]
    fn skip_on_fourth_round_goes_to_long_break() {
        let rig = Rig::new();
        let mut engine = rig.engine();
        engine.start();
        for _ in 0..3 {
            engine.skip(); // work -> short break
            engine.skip(); // short break -> work
        }
        assert_eq!(engine.completed_rounds(), 3);
        assert_eq!(engine.phase(), Phase::Work);

        let event = engine.skip().value.unwrap();
        assert!(matches!(
            event,
            Event::PhaseCompleted { to: Phase::LongBreak, completed_rounds: 4, skipped: true, .. }
        ));
        assert_eq!(engine.remaining(), Duration::minutes(15));
    }

    #[test]
    fn reset_clears_everything() {
        let rig = Rig::new();
        let mut engine = rig.engine();
        engine.start();
        engine.skip();
        engine.reset(None);
        assert_eq!(engine.state(), &CycleState::default());

        engine.reset(Some(Phase::LongBreak));
        assert_eq!(engine.phase(), Phase::LongBreak);
        assert_eq!(engine.remaining(), Duration::minutes(15));
    }

    #[test]
    fn invalid_settings_keep_previous() {
        let rig = Rig::new();
        let mut engine = rig.engine();
        let err = engine
            .update_settings(Settings {
                work_minutes: 0,
                ..Settings::default()
            })
            .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidValue { .. }));
        assert_eq!(engine.settings(), &Settings::default());
        assert!(rig.store.raw(SETTINGS_KEY).is_none());
    }

    #[test]
    fn shortened_duration_clamps_running_countdown() {
        let rig = Rig::new();
        let mut engine = rig.engine();
        engine.start();
        rig.clock.advance_mins(5);
        engine.set_setting("workMinutes", "10").unwrap();
        assert_eq!(engine.remaining(), Duration::minutes(10));
        assert_eq!(engine.progress_pct(), 0);
    }

    #[test]
    fn save_failure_is_reported_then_retried_on_tick() {
        let rig = Rig::new();
        let mut engine = rig.engine();
        rig.store.fail_writes(true);

        let out = engine.start();
        assert!(out.value.is_some());
        assert!(!out.is_persisted());
        assert!(engine.is_running());
        assert!(engine.has_unsaved_changes());

        rig.store.fail_writes(false);
        assert!(engine.tick().is_persisted());
        assert!(!engine.has_unsaved_changes());
        let saved: CycleState = serde_json::from_value(rig.store.raw(CYCLE_STATE_KEY).unwrap()).unwrap();
        assert!(saved.is_running);
    }

    #[test]
    fn unreadable_store_opens_with_defaults_and_reports_it() {
        let rig = Rig::new();
        {
            let mut engine = rig.engine();
            engine.set_setting("workMinutes", "50").unwrap();
            engine.start();
        }
        rig.store.fail_reads(true);

        let out = CycleEngine::open(rig.clock.clone(), rig.store.clone(), rig.notifier.clone());
        assert!(!out.is_persisted());
        assert!(matches!(
            out.persist_error,
            Some(PersistenceError::ReadFailed { ref key, .. }) if key == SETTINGS_KEY
        ));
        let engine = out.value;
        assert_eq!(engine.settings(), &Settings::default());
        assert_eq!(engine.state(), &CycleState::default());
        assert_eq!(engine.remaining(), Duration::minutes(25));
    }

    #[test]
    fn invalid_stored_settings_fall_back_without_error() {
        let rig = Rig::new();
        rig.store
            .set(SETTINGS_KEY, &serde_json::json!({"workMinutes": 0}))
            .unwrap();
        let out = CycleEngine::open(rig.clock.clone(), rig.store.clone(), rig.notifier.clone());
        assert!(out.is_persisted());
        assert_eq!(out.value.settings(), &Settings::default());
    }

    #[test]
    fn repeated_save_failures_keep_state_dirty_until_recovery() {
        let rig = Rig::new();
        let mut engine = rig.engine();
        rig.store.fail_writes(true);
        engine.start();
        for _ in 0..3 {
            rig.clock.advance_secs(1);
            assert!(!engine.tick().is_persisted());
        }
        assert!(engine.has_unsaved_changes());
        rig.store.fail_writes(false);
        assert!(engine.tick().is_persisted());
        assert!(!engine.has_unsaved_changes());
        assert!(engine.tick().is_persisted());
    }

    #[test]
    fn snapshot_returns_valid_event() {
        let rig = Rig::new();
        let engine = rig.engine();
        match engine.snapshot() {
            Event::StateSnapshot {
                phase,
                running,
                remaining_ms,
                total_ms,
                ..
            } => {
                assert_eq!(phase, Phase::Work);
                assert!(!running);
                assert_eq!(remaining_ms, 25 * 60 * 1000);
                assert_eq!(total_ms, remaining_ms);
            }
            other => panic!("Expected StateSnapshot, got {other:?}"),
        }
    }

    #[test]
    fn progress_rounds_and_floors() {
        let total = Duration::minutes(25);
        assert_eq!(progress_pct(total, total), 0);
        assert_eq!(progress_pct(total, Duration::zero()), 100);
        assert_eq!(progress_pct(total, Duration::seconds(25 * 60 - 9)), 1);
        assert_eq!(progress_pct(total, total + Duration::minutes(5)), 0);
    }
}
