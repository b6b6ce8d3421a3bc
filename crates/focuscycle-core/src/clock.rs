//! Time source and cancellable deferred actions.
//!
//! Engines never read the system clock directly. They ask an injected
//! [`Clock`] for "now" and keep their one-shot work in a [`DeferredQueue`],
//! which the owner polls against that clock. Tests swap in a
//! [`ManualClock`] and move time by hand instead of sleeping.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Duration, TimeZone, Utc};

/// Current-time source.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
///
/// Stored as epoch milliseconds so it can be shared across threads
/// without a lock.
#[derive(Debug)]
pub struct ManualClock {
    epoch_ms: AtomicI64,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            epoch_ms: AtomicI64::new(start.timestamp_millis()),
        }
    }

    /// Clock starting at the given epoch milliseconds.
    pub fn at_millis(epoch_ms: i64) -> Self {
        Self {
            epoch_ms: AtomicI64::new(epoch_ms),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.epoch_ms
            .fetch_add(by.num_milliseconds(), Ordering::SeqCst);
    }

    pub fn advance_secs(&self, secs: i64) {
        self.advance(Duration::seconds(secs));
    }

    pub fn advance_mins(&self, mins: i64) {
        self.advance(Duration::minutes(mins));
    }

    /// Jump to an absolute instant (forwards or backwards).
    pub fn set(&self, to: DateTime<Utc>) {
        self.epoch_ms.store(to.timestamp_millis(), Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        // 2024-01-01T00:00:00Z keeps test timestamps readable.
        Self::at_millis(1_704_067_200_000)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        let ms = self.epoch_ms.load(Ordering::SeqCst);
        Utc.timestamp_millis_opt(ms)
            .single()
            .unwrap_or_default()
    }
}

/// Handle to a pending deferred action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

/// Ordered set of one-shot actions, each due at an absolute instant.
///
/// Cancellation removes the action outright, so a cancelled action can
/// never be returned by [`DeferredQueue::pop_due`].
#[derive(Debug)]
pub struct DeferredQueue<T> {
    next_id: u64,
    by_due: BTreeMap<(DateTime<Utc>, TimerHandle), T>,
    due_of: HashMap<TimerHandle, DateTime<Utc>>,
}

impl<T> DeferredQueue<T> {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            by_due: BTreeMap::new(),
            due_of: HashMap::new(),
        }
    }

    /// Arm `action` to become due at `at`.
    pub fn schedule(&mut self, at: DateTime<Utc>, action: T) -> TimerHandle {
        let handle = TimerHandle(self.next_id);
        self.next_id += 1;
        self.by_due.insert((at, handle), action);
        self.due_of.insert(handle, at);
        handle
    }

    /// Arm `action` to become due `delay` after `now`.
    pub fn schedule_after(&mut self, now: DateTime<Utc>, delay: Duration, action: T) -> TimerHandle {
        self.schedule(now + delay, action)
    }

    /// Disarm a pending action. Unknown or already-fired handles return `None`.
    pub fn cancel(&mut self, handle: TimerHandle) -> Option<T> {
        let at = self.due_of.remove(&handle)?;
        self.by_due.remove(&(at, handle))
    }

    /// Remove and return every action due at or before `now`, earliest first.
    pub fn pop_due(&mut self, now: DateTime<Utc>) -> Vec<T> {
        let mut due = Vec::new();
        while let Some(entry) = self.by_due.first_entry() {
            if entry.key().0 > now {
                break;
            }
            let ((_, handle), action) = entry.remove_entry();
            self.due_of.remove(&handle);
            due.push(action);
        }
        due
    }

    /// Instant of the earliest pending action.
    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        self.by_due.keys().next().map(|(at, _)| *at)
    }

    pub fn len(&self) -> usize {
        self.by_due.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_due.is_empty()
    }

    /// Disarm everything.
    pub fn clear(&mut self) {
        self.by_due.clear();
        self.due_of.clear();
    }
}

impl<T> Default for DeferredQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
