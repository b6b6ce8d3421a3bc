use clap::Subcommand;
use focuscycle_core::Config;

use crate::context::{print_json, print_value};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print all config values as JSON
    Show,
    /// Get one value by dotted key (e.g. "notifications.desktop")
    Get { key: String },
    /// Change one value; it is validated before the file is written
    Set { key: String, value: String },
    /// Restore defaults
    Reset,
}

pub fn run(action: ConfigAction) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match action {
        ConfigAction::Reset => Config::default(),
        _ => Config::load()?,
    };

    match action {
        ConfigAction::Show => print_json(&config)?,
        ConfigAction::Get { key } => print_value("key", &key, config.get(&key), &Config::KEYS)?,
        ConfigAction::Set { key, value } => {
            config.set(&key, &value)?;
            print_value("key", &key, config.get(&key), &Config::KEYS)?;
        }
        ConfigAction::Reset => {
            config.save()?;
            print_json(&config)?;
        }
    }
    Ok(())
}
