use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod app;
mod commands;

#[derive(Parser)]
#[command(name = "tomatoes", version, about = "Daily tomato counter")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Timer control
    Timer {
        #[command(subcommand)]
        action: commands::timer::TimerAction,
    },
    /// Today's progress
    Progress {
        /// Print the full state snapshot as JSON
        #[arg(long)]
        json: bool,
    },
    /// Daily goal and unit length
    Settings {
        #[command(subcommand)]
        action: commands::settings::SettingsAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Background completion jobs
    Background {
        #[command(subcommand)]
        action: commands::background::BackgroundAction,
    },
}

/// Log to stderr so JSON on stdout stays machine-readable.
fn init_logging() {
    let filter =
        EnvFilter::try_from_env("TOMATOES_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() {
    init_logging();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Timer { action } => commands::timer::run(action),
        Commands::Progress { json } => commands::progress::run(json),
        Commands::Settings { action } => commands::settings::run(action),
        Commands::Config { action } => commands::config::run(action),
        Commands::Background { action } => commands::background::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
