//! # focuscycle Core Library
//!
//! This library provides the core logic for the focuscycle work/break timer.
//! Every operation is available through the standalone `focuscycle` CLI,
//! which is a thin layer over this crate.
//!
//! ## Architecture
//!
//! - **Cycle engine**: A wall-clock-based state machine over the
//!   Work / ShortBreak / LongBreak cycle. The caller drives it with `tick()`;
//!   remaining time is always derived from a stored deadline.
//! - **Reminders**: One-shot labelled notifications that survive restarts.
//! - **Session**: A tokio task that ticks both engines and applies commands.
//! - **Breathing**: Short guided breathing sequences run by the session.
//! - **Storage**: SQLite key-value records per profile, TOML configuration,
//!   and a single-writer lease.
//!
//! ## Key Components
//!
//! - [`CycleEngine`]: Core cycle state machine
//! - [`ReminderScheduler`]: Pending reminder set
//! - [`Session`]: Long-running driver
//! - [`SqliteStore`]: Record persistence
//! - [`Config`]: Application configuration management

pub mod breathing;
pub mod clock;
pub mod error;
pub mod events;
pub mod notify;
pub mod outcome;
pub mod reminders;
pub mod session;
pub mod storage;
pub mod timer;

pub use breathing::{BreathingGuide, BreathingPattern};
pub use clock::{Clock, DeferredQueue, ManualClock, SystemClock, TimerHandle};
pub use error::{
    ConfigError, CoreError, LeaseError, PersistenceError, Result, ValidationError,
};
pub use events::Event;
pub use notify::{DesktopNotifier, Notice, Notifier, RecordingNotifier, SilentNotifier};
pub use outcome::Outcome;
pub use reminders::{Reminder, ReminderId, ReminderScheduler};
pub use session::{Command, Session};
pub use storage::{Config, Lease, LeaseHolder, MemoryStore, SqliteStore, Store};
pub use timer::{CycleEngine, CycleState, Phase, Settings};
