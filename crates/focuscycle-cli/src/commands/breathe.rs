//! Foreground breathing sequence, one JSON line per cue. Ctrl-C cancels.

use std::error::Error;

use focuscycle_core::{BreathingGuide, BreathingPattern, Clock, Event, SystemClock};
use tracing::warn;

pub fn run(pattern: BreathingPattern) -> Result<(), Box<dyn Error>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(follow(pattern, &SystemClock));
    Ok(())
}

async fn follow(pattern: BreathingPattern, clock: &dyn Clock) {
    let mut guide = BreathingGuide::new();
    print_events(guide.start(pattern, clock.now()));

    while let Some(due) = guide.next_due() {
        let wait = (due - clock.now()).to_std().unwrap_or_default();
        tokio::select! {
            _ = tokio::time::sleep(wait) => print_events(guide.poll(clock.now())),
            _ = tokio::signal::ctrl_c() => {
                print_events(guide.stop(clock.now()));
                break;
            }
        }
    }
}

fn print_events(events: impl IntoIterator<Item = Event>) {
    for event in events {
        match serde_json::to_string(&event) {
            Ok(line) => println!("{line}"),
            Err(e) => warn!(error = %e, "failed to encode event"),
        }
    }
}
