//! Shared wiring for commands: config, store, clock and notifier.

use std::error::Error;
use std::sync::Arc;

use focuscycle_core::{
    Clock, Config, CycleEngine, DesktopNotifier, Event, Lease, LeaseHolder, Notifier,
    PersistenceError, ReminderScheduler, SilentNotifier, SqliteStore, Store, SystemClock,
};
use serde::Serialize;
use tracing::debug;

pub struct Context {
    pub config: Config,
    pub clock: Arc<dyn Clock>,
    pub store: Arc<dyn Store>,
    pub notifier: Arc<dyn Notifier>,
}

impl Context {
    pub fn load() -> Result<Self, Box<dyn Error>> {
        let config = Config::load()?;
        let store = SqliteStore::open_default(&config.profile)?;
        let notifier: Arc<dyn Notifier> = if config.notifications.desktop {
            Arc::new(DesktopNotifier::new(config.notifications.app_name.clone()))
        } else {
            Arc::new(SilentNotifier)
        };
        debug!(profile = %config.profile, "context loaded");
        Ok(Self {
            config,
            clock: Arc::new(SystemClock),
            store: Arc::new(store),
            notifier,
        })
    }

    /// The `focuscycle run` session currently owning the state, if any.
    pub fn session_holder(&self) -> Result<Option<LeaseHolder>, Box<dyn Error>> {
        Ok(Lease::holder(self.store.as_ref(), self.clock.as_ref())?)
    }

    /// Mutating commands call this first; a live session owns the state.
    pub fn ensure_no_session(&self) -> Result<(), Box<dyn Error>> {
        Ok(Lease::ensure_free(self.store.as_ref(), self.clock.as_ref())?)
    }

    pub fn engine(&self) -> CycleEngine {
        let (engine, err) =
            CycleEngine::open(self.clock.clone(), self.store.clone(), self.notifier.clone())
                .into_parts();
        report(err);
        engine
    }

    /// Open the reminder set; any reminder that came due while nothing was
    /// running fires here and its event is returned.
    pub fn reminders(&self) -> (ReminderScheduler, Vec<Event>) {
        let ((scheduler, fired), err) =
            ReminderScheduler::open(self.clock.clone(), self.store.clone(), self.notifier.clone())
                .into_parts();
        report(err);
        (scheduler, fired)
    }
}

/// Print a non-fatal save or load failure.
pub fn report(err: Option<PersistenceError>) {
    if let Some(e) = err {
        eprintln!("warning: {e}; changes are kept for this run only");
    }
}

/// Print a value looked up by name, or fail listing the names that exist.
pub fn print_value(
    kind: &str,
    name: &str,
    value: Option<String>,
    known: &[&str],
) -> Result<(), Box<dyn Error>> {
    match value {
        Some(value) => {
            println!("{value}");
            Ok(())
        }
        None => Err(format!("unknown {kind}: {name} (expected one of {})", known.join(", ")).into()),
    }
}

pub fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
