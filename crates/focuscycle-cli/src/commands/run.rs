//! Foreground session.
//!
//! Holds the lease, ticks both engines, and reads one command per line from
//! stdin. Every event is printed to stdout as a single JSON line.

use std::error::Error;

use focuscycle_core::{BreathingPattern, Command, Lease, Phase, ReminderId, Session};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::context::Context;

const HELP: &str = "commands: start | pause | reset [PHASE] | skip | switch PHASE | \
set FIELD VALUE | remind MINUTES LABEL | cancel ID | clear | breathe 446|square|stop | status | quit";

pub fn run() -> Result<(), Box<dyn Error>> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(run_session());
    // The stdin reader may still be parked in a blocking read.
    runtime.shutdown_background();
    result
}

async fn run_session() -> Result<(), Box<dyn Error>> {
    let ctx = Context::load()?;
    let lease = Lease::acquire(ctx.store.clone(), ctx.clock.clone(), ctx.config.lease_ttl()?)?;

    let engine = ctx.engine();
    let (reminders, fired) = ctx.reminders();

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    for event in fired {
        let _ = event_tx.send(event);
    }
    let session = Session::new(engine, reminders, ctx.config.tick_interval(), event_tx)
        .with_lease(lease);

    let printer = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{line}"),
                Err(e) => warn!(error = %e, "failed to encode event"),
            }
        }
    });

    let (command_tx, command_rx) = mpsc::channel(16);
    let input = tokio::spawn(read_commands(command_tx.clone()));
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, shutting down");
            let _ = command_tx.send(Command::Shutdown).await;
        }
    });

    eprintln!("{HELP}");
    let result = session.run(command_rx).await;

    input.abort();
    interrupt.abort();
    printer.await?;
    result?;
    Ok(())
}

async fn read_commands(tx: mpsc::Sender<Command>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "failed to read stdin");
                break;
            }
        };
        match parse_command(&line) {
            Ok(Some(command)) => {
                let stop = command == Command::Shutdown;
                if tx.send(command).await.is_err() || stop {
                    return;
                }
            }
            Ok(None) => {}
            Err(message) => eprintln!("{message}\n{HELP}"),
        }
    }
    let _ = tx.send(Command::Shutdown).await;
}

fn parse_command(line: &str) -> Result<Option<Command>, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let phase = |word: Option<&str>| -> Result<Phase, String> {
        word.ok_or_else(|| "missing phase".to_string())?
            .parse::<Phase>()
            .map_err(|e| e.to_string())
    };

    let command = match verb.to_ascii_lowercase().as_str() {
        "start" | "resume" => Command::Start,
        "pause" => Command::Pause,
        "reset" => match words.next() {
            Some(word) => Command::Reset(Some(phase(Some(word))?)),
            None => Command::Reset(None),
        },
        "skip" => Command::Skip,
        "switch" => Command::SwitchPhase(phase(words.next())?),
        "set" => {
            let field = words.next().ok_or("missing field")?.to_string();
            let value = words.next().ok_or("missing value")?.to_string();
            Command::SetSetting { field, value }
        }
        "remind" => {
            let minutes = words
                .next()
                .ok_or("missing minutes")?
                .parse::<u32>()
                .map_err(|e| format!("invalid minutes: {e}"))?;
            let label = words.collect::<Vec<_>>().join(" ");
            if label.is_empty() {
                return Err("missing label".into());
            }
            Command::Remind { label, minutes }
        }
        "cancel" => Command::CancelReminder(ReminderId::from(words.next().ok_or("missing id")?)),
        "clear" => Command::CancelAllReminders,
        "breathe" => match words.next().ok_or("missing pattern")? {
            "stop" => Command::StopBreathing,
            word => Command::Breathe(word.parse::<BreathingPattern>().map_err(|e| e.to_string())?),
        },
        "status" => Command::Snapshot,
        "quit" | "exit" => Command::Shutdown,
        other => return Err(format!("unknown command: {other}")),
    };
    Ok(Some(command))
}
