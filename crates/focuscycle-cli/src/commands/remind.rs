use clap::Subcommand;
use focuscycle_core::{Event, ReminderId, ReminderScheduler};

use crate::context::{print_json, report, Context};

#[derive(Subcommand)]
pub enum RemindAction {
    /// Schedule a one-shot reminder
    Add {
        /// Text shown when the reminder fires
        label: String,
        /// Minutes from now
        #[arg(long, default_value = "60")]
        minutes: u32,
    },
    /// List pending reminders, soonest first
    List,
    /// Cancel a reminder by id
    Cancel {
        /// Reminder id
        id: String,
    },
    /// Cancel every pending reminder
    Clear,
}

pub fn run(action: RemindAction) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = Context::load()?;
    if let RemindAction::List = action {
        // A running session fires reminders itself; only show what it saved.
        if ctx.session_holder()?.is_some() {
            return print_json(&ReminderScheduler::load_saved(ctx.store.as_ref())?);
        }
    } else {
        ctx.ensure_no_session()?;
    }

    let (mut reminders, fired) = ctx.reminders();
    for event in &fired {
        print_json(event)?;
    }

    match action {
        RemindAction::Add { label, minutes } => {
            let (id, err) = reminders.schedule(label, minutes).into_parts();
            report(err);
            if let Some(reminder) = reminders.get(&id) {
                print_json(&Event::ReminderScheduled {
                    id: reminder.id.clone(),
                    label: reminder.label.clone(),
                    fires_at: reminder.fires_at,
                })?;
            }
        }
        RemindAction::List => print_json(&reminders.pending())?,
        RemindAction::Cancel { id } => {
            let (removed, err) = reminders.cancel(&ReminderId::from(id.as_str())).into_parts();
            report(err);
            if removed {
                println!("cancelled {id}");
            } else {
                println!("no pending reminder {id}");
            }
        }
        RemindAction::Clear => {
            let (count, err) = reminders.cancel_all().into_parts();
            report(err);
            println!("cancelled {count} reminder(s)");
        }
    }

    reminders.disarm();
    Ok(())
}
