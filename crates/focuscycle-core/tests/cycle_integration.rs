//! Cycle engine behaviour across process restarts, against a real SQLite
//! file.

use std::sync::Arc;

use chrono::Duration;
use focuscycle_core::storage::{save_record, CYCLE_STATE_KEY};
use focuscycle_core::{
    Clock, CycleEngine, CycleState, Event, ManualClock, Phase, RecordingNotifier, SqliteStore,
    Store,
};
use tempfile::TempDir;

struct Harness {
    _dir: TempDir,
    path: std::path::PathBuf,
    clock: Arc<ManualClock>,
    notifier: Arc<RecordingNotifier>,
}

impl Harness {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("focuscycle.db");
        Self {
            _dir: dir,
            path,
            clock: Arc::new(ManualClock::default()),
            notifier: Arc::new(RecordingNotifier::new()),
        }
    }

    fn store(&self) -> Arc<SqliteStore> {
        Arc::new(SqliteStore::open(&self.path, "default").unwrap())
    }

    /// Simulates a fresh process: new connection, new engine.
    fn reopen(&self) -> CycleEngine {
        let out = CycleEngine::open(self.clock.clone(), self.store(), self.notifier.clone());
        assert!(out.is_persisted());
        out.value
    }
}

#[test]
fn running_countdown_survives_restart() {
    let h = Harness::new();
    let mut engine = h.reopen();
    engine.start();
    h.clock.advance_mins(10);
    drop(engine);

    h.clock.advance_mins(5);
    let engine = h.reopen();
    assert!(engine.is_running());
    assert_eq!(engine.phase(), Phase::Work);
    assert_eq!(engine.remaining(), Duration::minutes(10));
}

#[test]
fn paused_countdown_does_not_drain_while_closed() {
    let h = Harness::new();
    let mut engine = h.reopen();
    engine.start();
    h.clock.advance_mins(7);
    engine.pause();
    drop(engine);

    h.clock.advance_mins(240);
    let mut engine = h.reopen();
    assert!(!engine.is_running());
    assert_eq!(engine.remaining(), Duration::minutes(18));

    engine.start();
    h.clock.advance_mins(18);
    let event = engine.tick().value;
    assert!(matches!(event, Some(Event::PhaseCompleted { from: Phase::Work, .. })));
}

#[test]
fn overdue_deadline_on_reload_transitions_exactly_once() {
    let h = Harness::new();
    let store = h.store();
    let mut state = CycleState::new(Phase::Work);
    state.is_running = true;
    state.deadline = Some(h.clock.now() - Duration::seconds(10));
    save_record(store.as_ref(), CYCLE_STATE_KEY, &state).unwrap();
    drop(store);

    let mut engine = h.reopen();
    let first = engine.tick().value;
    assert!(matches!(
        first,
        Some(Event::PhaseCompleted {
            from: Phase::Work,
            to: Phase::ShortBreak,
            completed_rounds: 1,
            skipped: false,
            ..
        })
    ));
    assert_eq!(engine.tick().value, None);
    assert_eq!(engine.remaining(), Duration::minutes(5));
    assert_eq!(h.notifier.notification_count(), 1);
    assert_eq!(h.notifier.tone_count(), 1);
}

#[test]
fn settings_persist_and_apply_from_next_phase() {
    let h = Harness::new();
    let mut engine = h.reopen();
    engine.set_setting("workMinutes", "50").unwrap();
    engine.set_setting("shortBreakMinutes", "10").unwrap();
    drop(engine);

    let mut engine = h.reopen();
    assert_eq!(engine.settings().work_minutes, 50);
    assert_eq!(engine.total(), Duration::minutes(50));
    engine.skip();
    assert_eq!(engine.phase(), Phase::ShortBreak);
    assert_eq!(engine.remaining(), Duration::minutes(10));
}

#[test]
fn corrupt_state_record_falls_back_to_defaults() {
    let h = Harness::new();
    let store = h.store();
    store
        .set(CYCLE_STATE_KEY, &serde_json::json!({"phase": "lunch"}))
        .unwrap();
    drop(store);

    let out = CycleEngine::open(h.clock.clone(), h.store(), h.notifier.clone());
    assert!(!out.is_persisted());
    let engine = out.value;
    assert_eq!(engine.phase(), Phase::Work);
    assert!(!engine.is_running());
    assert_eq!(engine.remaining(), Duration::minutes(25));
}

#[test]
fn profiles_keep_separate_cycles() {
    let h = Harness::new();
    let work = Arc::new(SqliteStore::open(&h.path, "work").unwrap());
    let home = Arc::new(SqliteStore::open(&h.path, "home").unwrap());

    let mut a = CycleEngine::open(h.clock.clone(), work, h.notifier.clone()).value;
    a.skip();
    let b = CycleEngine::open(h.clock.clone(), home, h.notifier.clone()).value;
    assert_eq!(a.phase(), Phase::ShortBreak);
    assert_eq!(b.phase(), Phase::Work);
}
