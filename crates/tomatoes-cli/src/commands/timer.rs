use std::time::Duration;

use clap::Subcommand;
use tokio::time::MissedTickBehavior;
use tomatoes_core::{Session, TimerState};

use crate::app::{park, print_event, print_events, App, CliResult};

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start a countdown of the configured length
    Start,
    /// Print the current state as JSON
    Status,
    /// Follow the countdown in the foreground, one tick per second
    Watch,
    /// Stop the running countdown early
    Finish {
        /// Count the unit anyway
        #[arg(long, conflicts_with = "no_credit", required_unless_present = "no_credit")]
        credit: bool,
        /// Discard the unit
        #[arg(long)]
        no_credit: bool,
    },
}

pub fn run(action: TimerAction) -> CliResult {
    let app = App::open()?;

    match action {
        TimerAction::Start => app.with_session(|session, events| {
            print_events(&events)?;
            print_events(&session.start()?)?;
            Ok(())
        }),
        TimerAction::Status => app.with_session(|session, events| {
            let ticked = session.tick()?;
            for event in events.iter().chain(&ticked) {
                tracing::debug!(?event, "status");
            }
            print_event(&session.snapshot()?)?;
            Ok(())
        }),
        TimerAction::Watch => watch(&app),
        TimerAction::Finish { credit, .. } => app.with_session(|session, events| {
            print_events(&events)?;
            let events = session.cancel_early(credit)?;
            if events.is_empty() {
                eprintln!("no countdown running");
            }
            print_events(&events)?;
            Ok(())
        }),
    }
}

fn watch(app: &App) -> CliResult {
    let (mut session, events) = app.launch()?;
    print_events(&events)?;

    if session.state() == TimerState::Running {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let followed = runtime.block_on(follow(&mut session));
        park(&mut session)?;
        followed?;
    }
    print_event(&session.snapshot()?)?;
    Ok(())
}

/// Tick until the countdown ends; Ctrl-C hands it to the background.
async fn follow(session: &mut Session) -> CliResult {
    let mut interval = tokio::time::interval(Duration::from_secs(1));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                print_events(&session.tick()?)?;
                if session.state() != TimerState::Running {
                    return Ok(());
                }
            }
            res = &mut ctrl_c => {
                res?;
                print_events(&session.suspend()?)?;
                return Ok(());
            }
        }
    }
}
