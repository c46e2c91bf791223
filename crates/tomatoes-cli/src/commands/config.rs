use clap::Subcommand;
use tomatoes_core::{Config, ConfigError};

use crate::app::CliResult;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print one preference
    Get {
        /// Dotted key: notifications.enabled, notifications.bell,
        /// background.strategy, background.poll_secs, display.slots_per_row
        key: String,
    },
    /// Change one preference and print what was stored
    Set {
        /// Dotted key, as for `get`
        key: String,
        /// New value (`alarm` or `work` for background.strategy)
        value: String,
    },
    /// Print every preference as `key = value`
    List {
        /// Print the whole document as JSON instead
        #[arg(long)]
        json: bool,
    },
    /// Print where config.toml lives
    Path,
    /// Restore the default preferences
    Reset,
}

pub fn run(action: ConfigAction) -> CliResult {
    match action {
        ConfigAction::Get { key } => println!("{}", lookup(&Config::load()?, &key)?),
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            tracing::info!(%key, %value, "preference changed");
            println!("{key} = {}", lookup(&config, &key)?);
        }
        ConfigAction::List { json: true } => {
            println!("{}", serde_json::to_string_pretty(&Config::load()?)?);
        }
        ConfigAction::List { json: false } => {
            let tree = serde_json::to_value(Config::load()?)?;
            let mut lines = Vec::new();
            flatten("", &tree, &mut lines);
            for (key, value) in lines {
                println!("{key} = {value}");
            }
        }
        ConfigAction::Path => println!("{}", Config::path()?.display()),
        ConfigAction::Reset => {
            let path = Config::path()?;
            Config::default().save_to(&path)?;
            tracing::info!("preferences reset");
            println!("defaults written to {}", path.display());
        }
    }
    Ok(())
}

fn lookup(config: &Config, key: &str) -> Result<String, ConfigError> {
    config
        .get(key)
        .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))
}

/// Dotted `(key, value)` pairs for every leaf, sorted by key.
fn flatten(prefix: &str, value: &serde_json::Value, out: &mut Vec<(String, String)>) {
    match value {
        serde_json::Value::Object(map) => {
            for (name, child) in map {
                let key = if prefix.is_empty() {
                    name.clone()
                } else {
                    format!("{prefix}.{name}")
                };
                flatten(&key, child, out);
            }
        }
        serde_json::Value::String(s) => out.push((prefix.to_string(), s.clone())),
        other => out.push((prefix.to_string(), other.to_string())),
    }
}
