//! Basic CLI E2E tests.
//!
//! Tests invoke the built binary against a throwaway data directory and
//! verify outputs.

use std::io::Write;
use std::process::{Command, Stdio};
use std::sync::Arc;

use focuscycle_core::{
    CycleEngine, Lease, ManualClock, ReminderScheduler, SilentNotifier, SqliteStore, SystemClock,
};
use tempfile::TempDir;

/// Fresh data directory with desktop notifications turned off.
fn data_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("config.toml"),
        "profile = \"default\"\ntick_interval_ms = 50\n\n[notifications]\ndesktop = false\n",
    )
    .unwrap();
    dir
}

fn cli(dir: &TempDir) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_focuscycle"));
    cmd.env("FOCUSCYCLE_DATA_DIR", dir.path())
        .env("FOCUSCYCLE_LOG", "off");
    cmd
}

/// Run a CLI command and return (stdout, stderr, exit code).
fn run_cli(dir: &TempDir, args: &[&str]) -> (String, String, i32) {
    let output = cli(dir).args(args).output().unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);
    (stdout, stderr, code)
}

fn run_json(dir: &TempDir, args: &[&str]) -> serde_json::Value {
    let (stdout, stderr, code) = run_cli(dir, args);
    assert_eq!(code, 0, "{args:?} failed: {stderr}");
    serde_json::from_str(&stdout).unwrap()
}

fn store(dir: &TempDir) -> Arc<SqliteStore> {
    Arc::new(SqliteStore::open(&dir.path().join("focuscycle.db"), "default").unwrap())
}

/// Claim the state the way `focuscycle run` does.
fn hold_session(dir: &TempDir) -> Lease {
    Lease::acquire(store(dir), Arc::new(SystemClock), chrono::Duration::seconds(60)).unwrap()
}

/// Every JSON document printed, pretty or not.
fn json_docs(stdout: &str) -> Vec<serde_json::Value> {
    serde_json::Deserializer::from_str(stdout)
        .into_iter::<serde_json::Value>()
        .map(Result::unwrap)
        .collect()
}

#[test]
fn test_status_of_fresh_profile() {
    let dir = data_dir();
    let status = run_json(&dir, &["timer", "status"]);
    assert_eq!(status["type"], "StateSnapshot");
    assert_eq!(status["phase"], "work");
    assert_eq!(status["running"], false);
    assert_eq!(status["remaining_ms"], 25 * 60 * 1000);
}

#[test]
fn test_start_persists_between_invocations() {
    let dir = data_dir();
    let started = run_json(&dir, &["timer", "start"]);
    assert_eq!(started["type"], "TimerStarted");

    let status = run_json(&dir, &["timer", "status"]);
    assert_eq!(status["running"], true);

    let paused = run_json(&dir, &["timer", "pause"]);
    assert_eq!(paused["type"], "TimerPaused");
    let status = run_json(&dir, &["timer", "status"]);
    assert_eq!(status["running"], false);
}

#[test]
fn test_skip_advances_to_short_break() {
    let dir = data_dir();
    let skipped = run_json(&dir, &["timer", "skip"]);
    assert_eq!(skipped["type"], "PhaseCompleted");
    assert_eq!(skipped["to"], "shortBreak");
    assert_eq!(skipped["completed_rounds"], 1);

    let reset = run_json(&dir, &["timer", "reset", "--phase", "long"]);
    assert_eq!(reset["type"], "TimerReset");
    assert_eq!(reset["phase"], "longBreak");
}

#[test]
fn test_settings_set_and_reject() {
    let dir = data_dir();
    let updated = run_json(&dir, &["settings", "set", "workMinutes", "50"]);
    assert_eq!(updated["settings"]["workMinutes"], 50);

    let (stdout, _, code) = run_cli(&dir, &["settings", "get", "workMinutes"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "50");

    let (_, stderr, code) = run_cli(&dir, &["settings", "set", "workMinutes", "0"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("error:"));

    let settings = run_json(&dir, &["settings", "show"]);
    assert_eq!(settings["workMinutes"], 50);
}

#[test]
fn test_reminder_add_list_cancel() {
    let dir = data_dir();
    let scheduled = run_json(&dir, &["remind", "add", "drink water", "--minutes", "60"]);
    assert_eq!(scheduled["type"], "ReminderScheduled");
    let id = scheduled["id"].as_str().unwrap().to_string();

    let list = run_json(&dir, &["remind", "list"]);
    assert_eq!(list.as_array().map(Vec::len), Some(1));
    assert_eq!(list[0]["label"], "drink water");

    let (stdout, _, code) = run_cli(&dir, &["remind", "cancel", &id]);
    assert_eq!(code, 0);
    assert!(stdout.contains("cancelled"));

    let (stdout, _, code) = run_cli(&dir, &["remind", "cancel", &id]);
    assert_eq!(code, 0);
    assert!(stdout.contains("no pending reminder"));

    let list = run_json(&dir, &["remind", "list"]);
    assert_eq!(list.as_array().map(Vec::len), Some(0));
}

#[test]
fn test_config_get_set() {
    let dir = data_dir();
    let (stdout, _, code) = run_cli(&dir, &["config", "get", "notifications.desktop"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "false");

    let (_, _, code) = run_cli(&dir, &["config", "set", "tick_interval_ms", "100"]);
    assert_eq!(code, 0);
    let (_, _, code) = run_cli(&dir, &["config", "set", "tick_interval_ms", "1000"]);
    assert_eq!(code, 1);
    let (_, _, code) = run_cli(&dir, &["config", "get", "nope"]);
    assert_eq!(code, 1);
}

#[test]
fn test_run_session_reads_stdin() {
    let dir = data_dir();
    let mut child = cli(&dir)
        .arg("run")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"start\nremind 30 stretch\nbreathe 446\nstatus\nquit\n")
        .unwrap();
    let output = child.wait_with_output().unwrap();
    assert!(output.status.success());

    let events: Vec<serde_json::Value> = String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    let kinds: Vec<&str> = events.iter().filter_map(|e| e["type"].as_str()).collect();
    assert!(kinds.contains(&"TimerStarted"));
    assert!(kinds.contains(&"ReminderScheduled"));
    assert_eq!(kinds.first(), Some(&"StateSnapshot"));
    assert!(events
        .iter()
        .any(|e| e["type"] == "BreathingStep" && e["cue"] == "Get ready..."));
    // Quitting mid-sequence cancels it.
    assert!(events
        .iter()
        .any(|e| e["type"] == "BreathingEnded" && e["cancelled"] == true));

    // The lease is released on exit, so a second session can start.
    let status = run_json(&dir, &["timer", "status"]);
    assert_eq!(status["running"], true);
    let list = run_json(&dir, &["remind", "list"]);
    assert_eq!(list.as_array().map(Vec::len), Some(1));
}

#[test]
fn test_mutations_refused_while_session_runs() {
    let dir = data_dir();
    run_json(&dir, &["remind", "add", "stretch", "--minutes", "60"]);
    let lease = hold_session(&dir);

    for args in [
        &["timer", "start"][..],
        &["timer", "skip"],
        &["settings", "set", "workMinutes", "50"],
        &["remind", "add", "drink water"],
        &["remind", "clear"],
    ] {
        let (_, stderr, code) = run_cli(&dir, args);
        assert_eq!(code, 1, "{args:?} should be refused");
        assert!(stderr.contains("held"), "{args:?}: {stderr}");
    }

    // Reads still work and nothing was changed underneath the session.
    let status = run_json(&dir, &["timer", "status"]);
    assert_eq!(status["running"], false);
    let list = run_json(&dir, &["remind", "list"]);
    assert_eq!(list.as_array().map(Vec::len), Some(1));
    assert_eq!(list[0]["label"], "stretch");
    let settings = run_json(&dir, &["settings", "show"]);
    assert_eq!(settings["workMinutes"], 25);

    lease.release().unwrap();
    let started = run_json(&dir, &["timer", "start"]);
    assert_eq!(started["type"], "TimerStarted");
}

#[test]
fn test_status_leaves_overdue_completion_to_session() {
    let dir = data_dir();
    // A work phase whose deadline passed long ago.
    let clock = Arc::new(ManualClock::default());
    let mut engine = CycleEngine::open(clock.clone(), store(&dir), Arc::new(SilentNotifier)).value;
    assert!(engine.start().is_persisted());
    let (mut reminders, _) =
        ReminderScheduler::open(clock, store(&dir), Arc::new(SilentNotifier)).value;
    assert!(reminders.schedule("overdue", 5).is_persisted());
    reminders.disarm();

    let lease = hold_session(&dir);
    for _ in 0..2 {
        let (stdout, _, code) = run_cli(&dir, &["timer", "status"]);
        assert_eq!(code, 0);
        let docs = json_docs(&stdout);
        assert_eq!(docs.len(), 1, "status must not settle: {stdout}");
        assert_eq!(docs[0]["type"], "StateSnapshot");
        assert_eq!(docs[0]["phase"], "work");
        assert_eq!(docs[0]["remaining_ms"], 0);

        let (stdout, _, code) = run_cli(&dir, &["remind", "list"]);
        assert_eq!(code, 0);
        let docs = json_docs(&stdout);
        assert_eq!(docs.len(), 1, "list must not fire: {stdout}");
        assert_eq!(docs[0][0]["label"], "overdue");
    }

    // Once the session is gone the next command settles it exactly once.
    lease.release().unwrap();
    let (stdout, _, _) = run_cli(&dir, &["timer", "status"]);
    let docs = json_docs(&stdout);
    assert_eq!(docs[0]["type"], "PhaseCompleted");
    assert_eq!(docs[1]["phase"], "shortBreak");
    let (stdout, _, _) = run_cli(&dir, &["remind", "list"]);
    let docs = json_docs(&stdout);
    assert_eq!(docs[0]["type"], "ReminderFired");
    assert_eq!(docs[1].as_array().map(Vec::len), Some(0));
}

#[test]
fn test_brief_status_line() {
    let dir = data_dir();
    let (stdout, _, code) = run_cli(&dir, &["timer", "status", "--brief"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "Focus 25:00 remaining (stopped), 0 rounds done");
}

#[test]
fn test_help_mentions_terminal_bell() {
    let dir = data_dir();
    let (stdout, _, code) = run_cli(&dir, &["--help"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("terminal bell"));
    assert!(stdout.contains("breathe"));
}

#[test]
fn test_completions() {
    let dir = data_dir();
    let (stdout, _, code) = run_cli(&dir, &["completions", "bash"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("focuscycle"));
}
