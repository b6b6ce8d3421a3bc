//! Async driver that owns both engines.
//!
//! A [`Session`] lives inside a single tokio task. It ticks the cycle engine
//! and polls the reminder scheduler on a fixed interval, applies
//! [`Command`]s received between ticks, and forwards every resulting
//! [`Event`] to an observer channel. Because only this task ever touches the
//! engines, no locking is involved.
//!
//! While saves keep failing the observer gets one warning, not one per tick,
//! and a [`Event::PersistenceRestored`] once everything is written again.

use std::time::Duration as StdDuration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::breathing::{BreathingGuide, BreathingPattern};
use crate::error::{CoreError, PersistenceError, Result};
use crate::events::Event;
use crate::outcome::Outcome;
use crate::reminders::{ReminderId, ReminderScheduler};
use crate::storage::Lease;
use crate::timer::{CycleEngine, Phase};

/// User intent delivered to a running session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Pause,
    Reset(Option<Phase>),
    Skip,
    SwitchPhase(Phase),
    SetSetting { field: String, value: String },
    Remind { label: String, minutes: u32 },
    CancelReminder(ReminderId),
    CancelAllReminders,
    Breathe(BreathingPattern),
    StopBreathing,
    Snapshot,
    Shutdown,
}

pub struct Session {
    engine: CycleEngine,
    reminders: ReminderScheduler,
    breathing: BreathingGuide,
    lease: Option<Lease>,
    tick_interval: StdDuration,
    events: mpsc::UnboundedSender<Event>,
    /// Set after a failed save until both engines are clean again.
    degraded: bool,
}

impl Session {
    pub fn new(
        engine: CycleEngine,
        reminders: ReminderScheduler,
        tick_interval: StdDuration,
        events: mpsc::UnboundedSender<Event>,
    ) -> Self {
        Self {
            engine,
            reminders,
            breathing: BreathingGuide::new(),
            lease: None,
            tick_interval,
            events,
            degraded: false,
        }
    }

    /// Renew `lease` on every tick and release it on shutdown.
    pub fn with_lease(mut self, lease: Lease) -> Self {
        self.lease = Some(lease);
        self
    }

    pub fn engine(&self) -> &CycleEngine {
        &self.engine
    }

    pub fn reminders(&self) -> &ReminderScheduler {
        &self.reminders
    }

    pub fn breathing(&self) -> &BreathingGuide {
        &self.breathing
    }

    /// One evaluation pass: cycle completion, due reminders, breathing cues,
    /// then lease renewal.
    ///
    /// # Errors
    /// Only a lost lease is an error; the caller must stop writing.
    pub fn tick(&mut self) -> Result<()> {
        let out = self.engine.tick();
        self.emit_outcome(out);
        let out = self.reminders.poll();
        self.emit_many(out);
        let cues = self.breathing.poll(self.engine.now());
        for event in cues {
            self.emit(event);
        }
        self.check_restored();

        if let Some(lease) = &self.lease {
            match lease.renew() {
                Ok(()) => {}
                Err(e @ CoreError::Lease(_)) => return Err(e),
                Err(e) => warn!(error = %e, "failed to renew lease"),
            }
        }
        Ok(())
    }

    /// Apply one command. Returns `false` once the session should stop.
    pub fn apply(&mut self, command: Command) -> bool {
        debug!(?command, "applying command");
        match command {
            Command::Start => {
                let out = self.engine.start();
                self.emit_outcome(out);
            }
            Command::Pause => {
                let out = self.engine.pause();
                self.emit_outcome(out);
            }
            Command::Reset(phase) => {
                let out = self.engine.reset(phase).map(Some);
                self.emit_outcome(out);
            }
            Command::Skip => {
                let out = self.engine.skip();
                self.emit_outcome(out);
            }
            Command::SwitchPhase(phase) => {
                let out = self.engine.switch_phase(phase).map(Some);
                self.emit_outcome(out);
            }
            Command::SetSetting { field, value } => match self.engine.set_setting(&field, &value) {
                Ok(out) => self.emit_outcome(out.map(Some)),
                Err(e) => self.warn(e.to_string()),
            },
            Command::Remind { label, minutes } => {
                let (id, err) = self.reminders.schedule(label, minutes).into_parts();
                if let Some(reminder) = self.reminders.get(&id) {
                    let event = Event::ReminderScheduled {
                        id: reminder.id.clone(),
                        label: reminder.label.clone(),
                        fires_at: reminder.fires_at,
                    };
                    self.emit(event);
                }
                if let Some(e) = err {
                    self.save_failed(&e);
                }
            }
            Command::CancelReminder(id) => {
                let (removed, err) = self.reminders.cancel(&id).into_parts();
                if removed {
                    let at = self.engine.now();
                    self.emit(Event::ReminderCancelled { id, at });
                }
                if let Some(e) = err {
                    self.save_failed(&e);
                }
            }
            Command::CancelAllReminders => {
                let (_, err) = self.reminders.cancel_all().into_parts();
                if let Some(e) = err {
                    self.save_failed(&e);
                }
            }
            Command::Breathe(pattern) => {
                let events = self.breathing.start(pattern, self.engine.now());
                for event in events {
                    self.emit(event);
                }
            }
            Command::StopBreathing => {
                if let Some(event) = self.breathing.stop(self.engine.now()) {
                    self.emit(event);
                }
            }
            Command::Snapshot => {
                let snapshot = self.engine.snapshot();
                self.emit(snapshot);
            }
            Command::Shutdown => return false,
        }
        self.check_restored();
        true
    }

    /// Drive the session until a `Shutdown` command arrives, the command
    /// channel closes, or the lease is lost.
    pub async fn run(mut self, mut commands: mpsc::Receiver<Command>) -> Result<()> {
        let mut interval = tokio::time::interval(self.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(interval_ms = self.tick_interval.as_millis() as u64, "session running");

        let snapshot = self.engine.snapshot();
        self.emit(snapshot);

        let result = loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.tick() {
                        self.warn(e.to_string());
                        break Err(e);
                    }
                }
                command = commands.recv() => match command {
                    Some(command) => {
                        if !self.apply(command) {
                            break Ok(());
                        }
                    }
                    None => break Ok(()),
                },
            }
        };

        self.shutdown();
        result
    }

    /// Flush outstanding saves, disarm reminders, and release the lease.
    pub fn shutdown(mut self) {
        if let Some(event) = self.breathing.stop(self.engine.now()) {
            self.emit(event);
        }
        let (_, err) = self.reminders.flush().into_parts();
        if let Some(e) = err {
            self.save_failed(&e);
        }
        self.reminders.disarm();
        if self.engine.has_unsaved_changes() {
            let out = self.engine.tick();
            self.emit_outcome(out);
        }
        if self.engine.has_unsaved_changes() || self.reminders.has_unsaved_changes() {
            self.warn("some changes could not be saved and are lost".to_string());
        }
        if let Some(lease) = self.lease.take() {
            if let Err(e) = lease.release() {
                warn!(error = %e, "failed to release lease");
            }
        }
        info!("session stopped");
    }

    fn emit(&self, event: Event) {
        if self.events.send(event).is_err() {
            debug!("event observer gone");
        }
    }

    fn emit_outcome(&mut self, out: Outcome<Option<Event>>) {
        let (event, err) = out.into_parts();
        if let Some(event) = event {
            self.emit(event);
        }
        if let Some(e) = err {
            self.save_failed(&e);
        }
    }

    fn emit_many(&mut self, out: Outcome<Vec<Event>>) {
        let (events, err) = out.into_parts();
        for event in events {
            self.emit(event);
        }
        if let Some(e) = err {
            self.save_failed(&e);
        }
    }

    fn warn(&self, message: String) {
        let at = self.engine.now();
        self.emit(Event::warning(message, at));
    }

    fn save_failed(&mut self, err: &PersistenceError) {
        if self.degraded {
            debug!(error = %err, "save still failing");
            return;
        }
        self.degraded = true;
        self.warn(format!("{err}; changes are kept for this session only"));
    }

    fn check_restored(&mut self) {
        if self.degraded
            && !self.engine.has_unsaved_changes()
            && !self.reminders.has_unsaved_changes()
        {
            self.degraded = false;
            info!("pending changes saved");
            let at = self.engine.now();
            self.emit(Event::PersistenceRestored { at });
        }
    }
}
