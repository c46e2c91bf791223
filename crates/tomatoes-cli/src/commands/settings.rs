use clap::Subcommand;
use tomatoes_core::{update_config, SessionConfig};

use crate::app::{App, CliResult};

#[derive(Subcommand)]
pub enum SettingsAction {
    /// Show the daily goal and unit length
    Show,
    /// Change the daily goal and unit length (applies from the next launch)
    Set {
        /// Units per day
        total_units: String,
        /// Length of one unit in minutes
        duration_minutes: String,
    },
}

fn print_settings(config: &SessionConfig) -> CliResult {
    let json = serde_json::json!({
        "total_units": config.total_units,
        "unit_duration_ms": config.unit_duration_ms,
        "duration_minutes": config.unit_duration_minutes(),
    });
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

pub fn run(action: SettingsAction) -> CliResult {
    let app = App::open()?;

    match action {
        SettingsAction::Show => {
            let config = SessionConfig::load(app.db.as_ref())?;
            print_settings(&config)?;
        }
        SettingsAction::Set {
            total_units,
            duration_minutes,
        } => match update_config(app.db.as_ref(), &total_units, &duration_minutes) {
            Ok(config) => print_settings(&config)?,
            Err(e) => {
                eprintln!("Please enter valid numbers ({e})");
                std::process::exit(1);
            }
        },
    }
    Ok(())
}
