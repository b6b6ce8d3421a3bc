//! One-shot reminders, independent of the work cycle.
//!
//! Each reminder is armed in a [`DeferredQueue`] and fires a single
//! notification when its time comes, then removes itself. The set is
//! persisted after every change; on `open` anything already overdue fires
//! at once and the rest is re-armed with its remaining delay.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::clock::{Clock, DeferredQueue, TimerHandle};
use crate::error::PersistenceError;
use crate::events::Event;
use crate::notify::Notifier;
use crate::outcome::Outcome;
use crate::storage::{load_record, save_record, Store, REMINDERS_KEY};

/// Title used for every reminder notification.
pub const REMINDER_TITLE: &str = "Reminder";

/// Opaque reminder identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReminderId(String);

impl ReminderId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ReminderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ReminderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ReminderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ReminderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    pub id: ReminderId,
    pub label: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub fires_at: DateTime<Utc>,
}

struct Armed {
    reminder: Reminder,
    handle: TimerHandle,
}

/// Owner of the pending reminder set.
pub struct ReminderScheduler {
    clock: Arc<dyn Clock>,
    store: Arc<dyn Store>,
    notifier: Arc<dyn Notifier>,
    reminders: HashMap<ReminderId, Armed>,
    queue: DeferredQueue<ReminderId>,
    dirty: bool,
}

impl ReminderScheduler {
    /// Load persisted reminders and reconcile them against the clock.
    ///
    /// Overdue reminders fire before this returns (their events are in the
    /// value); the others are re-armed. Nothing else may touch the set
    /// before this has run, which the constructor shape enforces.
    pub fn open(
        clock: Arc<dyn Clock>,
        store: Arc<dyn Store>,
        notifier: Arc<dyn Notifier>,
    ) -> Outcome<(Self, Vec<Event>)> {
        let (saved, load_error) = match load_record::<Vec<Reminder>>(store.as_ref(), REMINDERS_KEY) {
            Ok(saved) => (saved.unwrap_or_default(), None),
            Err(e) => {
                warn!(error = %e, "failed to load reminders, starting empty");
                (Vec::new(), Some(e))
            }
        };

        let mut scheduler = Self {
            clock,
            store,
            notifier,
            reminders: HashMap::new(),
            queue: DeferredQueue::new(),
            dirty: false,
        };
        for reminder in saved {
            scheduler.arm(reminder);
        }
        debug!(armed = scheduler.reminders.len(), "reminders restored");

        let (fired, save_error) = scheduler.poll().into_parts();
        let outcome_error = load_error.or(save_error);
        match outcome_error {
            Some(e) => Outcome::degraded((scheduler, fired), e),
            None => Outcome::ok((scheduler, fired)),
        }
    }

    /// Read the persisted set, soonest first, without arming or firing
    /// anything. For inspecting a profile another session owns.
    pub fn load_saved(store: &dyn Store) -> Result<Vec<Reminder>, PersistenceError> {
        let mut list = load_record::<Vec<Reminder>>(store, REMINDERS_KEY)?.unwrap_or_default();
        list.sort_by(|a, b| a.fires_at.cmp(&b.fires_at).then_with(|| a.id.cmp(&b.id)));
        Ok(list)
    }

    /// Arm a reminder `delay_minutes` from now. Returns its id immediately.
    pub fn schedule(&mut self, label: impl Into<String>, delay_minutes: u32) -> Outcome<ReminderId> {
        self.schedule_in(label, Duration::minutes(i64::from(delay_minutes)))
    }

    /// Arm a reminder after an arbitrary delay.
    pub fn schedule_in(&mut self, label: impl Into<String>, delay: Duration) -> Outcome<ReminderId> {
        let reminder = Reminder {
            id: ReminderId::new(),
            label: label.into(),
            fires_at: self.clock.now() + delay,
        };
        let id = reminder.id.clone();
        info!(%id, label = %reminder.label, fires_at = %reminder.fires_at, "reminder scheduled");
        self.arm(reminder);
        self.persist().map(|_| id)
    }

    /// Fire everything that is due. Cancelled reminders never fire.
    pub fn poll(&mut self) -> Outcome<Vec<Event>> {
        let now = self.clock.now();
        let mut fired = Vec::new();
        for id in self.queue.pop_due(now) {
            let Some(armed) = self.reminders.remove(&id) else {
                debug!(%id, "deferred action for a removed reminder ignored");
                continue;
            };
            let Reminder { id, label, .. } = armed.reminder;
            self.notifier.show_notification(REMINDER_TITLE, &label);
            info!(%id, %label, "reminder fired");
            fired.push(Event::ReminderFired { id, label, at: now });
        }

        if fired.is_empty() && !self.dirty {
            return Outcome::ok(fired);
        }
        self.persist().map(|_| fired)
    }

    /// Remove a reminder before it fires.
    ///
    /// An unknown or already-fired id is a no-op and returns `false`.
    pub fn cancel(&mut self, id: &ReminderId) -> Outcome<bool> {
        let Some(armed) = self.reminders.remove(id) else {
            debug!(%id, "cancel for unknown reminder ignored");
            return Outcome::ok(false);
        };
        self.queue.cancel(armed.handle);
        info!(%id, "reminder cancelled");
        self.persist().map(|_| true)
    }

    /// Remove every pending reminder. Returns how many were removed.
    pub fn cancel_all(&mut self) -> Outcome<usize> {
        let count = self.reminders.len();
        self.reminders.clear();
        self.queue.clear();
        info!(count, "all reminders cancelled");
        self.persist().map(|_| count)
    }

    /// Retry a save that failed earlier. No-op when nothing is outstanding.
    pub fn flush(&mut self) -> Outcome<()> {
        if !self.dirty {
            return Outcome::ok(());
        }
        self.persist()
    }

    /// True while a save is outstanding.
    pub fn has_unsaved_changes(&self) -> bool {
        self.dirty
    }

    /// Drop every armed action without touching the persisted set.
    ///
    /// Used on teardown: nothing fires afterwards, and the next `open`
    /// reconciles the saved reminders.
    pub fn disarm(&mut self) {
        debug!(armed = self.queue.len(), "reminders disarmed");
        self.queue.clear();
    }

    pub fn get(&self, id: &ReminderId) -> Option<&Reminder> {
        self.reminders.get(id).map(|a| &a.reminder)
    }

    /// Pending reminders, soonest first.
    pub fn pending(&self) -> Vec<&Reminder> {
        let mut list: Vec<&Reminder> = self.reminders.values().map(|a| &a.reminder).collect();
        list.sort_by(|a, b| a.fires_at.cmp(&b.fires_at).then_with(|| a.id.cmp(&b.id)));
        list
    }

    pub fn len(&self) -> usize {
        self.reminders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reminders.is_empty()
    }

    /// When the next armed reminder is due.
    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        self.queue.next_due()
    }

    fn arm(&mut self, reminder: Reminder) {
        let handle = self.queue.schedule(reminder.fires_at, reminder.id.clone());
        if let Some(previous) = self
            .reminders
            .insert(reminder.id.clone(), Armed { reminder, handle })
        {
            self.queue.cancel(previous.handle);
        }
    }

    fn persist(&mut self) -> Outcome<()> {
        let list: Vec<Reminder> = self.pending().into_iter().cloned().collect();
        match save_record(self.store.as_ref(), REMINDERS_KEY, &list) {
            Ok(()) => {
                if self.dirty {
                    info!(count = list.len(), "reminders saved again");
                }
                self.dirty = false;
                Outcome::ok(())
            }
            Err(e) => {
                if self.dirty {
                    debug!(error = %e, "reminders still unsaved");
                } else {
                    warn!(error = %e, "failed to persist reminders, continuing in memory");
                }
                self.dirty = true;
                Outcome::degraded((), e)
            }
        }
    }
}
