use clap::Subcommand;
use focuscycle_core::{CycleEngine, Event, Outcome, Phase};

use crate::context::{print_json, report, Context};

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start the countdown for the current phase
    Start,
    /// Pause the countdown, keeping the remaining time
    Pause,
    /// Resume a paused countdown
    Resume,
    /// Stop and return to the first work phase (or the given phase)
    Reset {
        /// Phase to reset to (work, short, long)
        #[arg(long)]
        phase: Option<Phase>,
    },
    /// End the current phase now and advance
    Skip,
    /// Jump to a phase, stopped at its full length
    Switch {
        /// Target phase (work, short, long)
        phase: Phase,
    },
    /// Print current timer state as JSON
    Status {
        /// One human-readable line instead of JSON
        #[arg(long)]
        brief: bool,
    },
}

pub fn run(action: TimerAction) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = Context::load()?;
    if let TimerAction::Status { brief } = action {
        return status(&ctx, brief);
    }

    ctx.ensure_no_session()?;
    let mut engine = ctx.engine();

    // Settle anything that completed while no process was running.
    emit(engine.tick())?;

    let event = match action {
        TimerAction::Start | TimerAction::Resume => emit(engine.start())?,
        TimerAction::Pause => emit(engine.pause())?,
        TimerAction::Reset { phase } => emit(engine.reset(phase).map(Some))?,
        TimerAction::Skip => emit(engine.skip())?,
        TimerAction::Switch { phase } => emit(engine.switch_phase(phase).map(Some))?,
        TimerAction::Status { .. } => None,
    };

    if event.is_none() {
        print_json(&engine.snapshot())?;
    }
    Ok(())
}

/// Read-only while a session runs: completions belong to the session.
fn status(ctx: &Context, brief: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut engine = ctx.engine();
    if ctx.session_holder()?.is_none() {
        let (event, err) = engine.tick().into_parts();
        report(err);
        if let (Some(event), false) = (&event, brief) {
            print_json(event)?;
        }
    }

    if brief {
        println!("{}", status_line(&engine));
    } else {
        print_json(&engine.snapshot())?;
    }
    Ok(())
}

/// e.g. `Focus 12:34 remaining (running), 2 rounds done`
fn status_line(engine: &CycleEngine) -> String {
    let secs = engine.remaining().num_seconds().max(0);
    format!(
        "{} {:02}:{:02} remaining ({}), {} rounds done",
        engine.phase().label(),
        secs / 60,
        secs % 60,
        if engine.is_running() { "running" } else { "stopped" },
        engine.completed_rounds(),
    )
}

/// Print the event, if any, and surface a failed save.
fn emit(out: Outcome<Option<Event>>) -> Result<Option<Event>, Box<dyn std::error::Error>> {
    let (event, err) = out.into_parts();
    report(err);
    if let Some(event) = &event {
        print_json(event)?;
    }
    Ok(event)
}
