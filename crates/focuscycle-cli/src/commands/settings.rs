use clap::Subcommand;
use focuscycle_core::Settings;

use crate::context::{print_json, print_value, report, Context};

#[derive(Subcommand)]
pub enum SettingsAction {
    /// Print all settings as JSON
    Show,
    /// Get one setting
    Get {
        /// Field name (e.g. "workMinutes", "autoStartNext")
        field: String,
    },
    /// Change one setting
    Set {
        /// Field name
        field: String,
        /// New value
        value: String,
    },
    /// Restore default settings
    Reset,
}

pub fn run(action: SettingsAction) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = Context::load()?;
    if matches!(action, SettingsAction::Set { .. } | SettingsAction::Reset) {
        ctx.ensure_no_session()?;
    }
    let mut engine = ctx.engine();

    match action {
        SettingsAction::Show => print_json(engine.settings())?,
        SettingsAction::Get { field } => {
            print_value("setting", &field, engine.settings().get(&field), &Settings::FIELDS)?
        }
        SettingsAction::Set { field, value } => {
            let (event, err) = engine.set_setting(&field, &value)?.into_parts();
            report(err);
            print_json(&event)?;
        }
        SettingsAction::Reset => {
            let (event, err) = engine.update_settings(Settings::default())?.into_parts();
            report(err);
            print_json(&event)?;
        }
    }
    Ok(())
}
