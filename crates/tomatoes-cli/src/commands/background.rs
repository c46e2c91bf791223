use std::sync::Arc;
use std::time::Duration;

use clap::Subcommand;
use tokio::time::MissedTickBehavior;
use tomatoes_core::scheduler::{self, run_due, PendingJob};
use tomatoes_core::{BackgroundScheduler, BackgroundStrategy, SchedulerError};

use crate::app::{print_events, App, CliResult};

#[derive(Subcommand)]
pub enum BackgroundAction {
    /// Fire every job whose completion instant has passed
    RunDue,
    /// Keep firing due jobs until interrupted
    Worker {
        /// Seconds between checks (defaults to background.poll_secs)
        #[arg(long)]
        poll_secs: Option<u64>,
    },
    /// List pending jobs of both backends as JSON
    Pending,
}

/// Both backends, so jobs armed before a strategy switch still fire.
fn backends(app: &App) -> Result<Vec<Arc<dyn BackgroundScheduler>>, SchedulerError> {
    [BackgroundStrategy::Alarm, BackgroundStrategy::Work]
        .into_iter()
        .map(|strategy| scheduler::open(strategy, app.db.clone()))
        .collect()
}

fn fire_due(app: &App, backends: &[Arc<dyn BackgroundScheduler>]) -> CliResult {
    for backend in backends {
        let events = run_due(
            backend.as_ref(),
            app.db.as_ref(),
            app.notifier.as_ref(),
            app.clock.as_ref(),
        )?;
        print_events(&events)?;
    }
    Ok(())
}

pub fn run(action: BackgroundAction) -> CliResult {
    let app = App::open()?;
    let backends = backends(&app)?;

    match action {
        BackgroundAction::RunDue => fire_due(&app, &backends)?,
        BackgroundAction::Worker { poll_secs } => {
            let poll_secs = poll_secs.unwrap_or(app.config.background.poll_secs).max(1);
            tracing::info!(poll_secs, "background worker started");
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            runtime.block_on(work(&app, &backends, Duration::from_secs(poll_secs)))?;
            tracing::info!("background worker stopped");
        }
        BackgroundAction::Pending => {
            let mut pending: Vec<PendingJob> = Vec::new();
            for backend in &backends {
                pending.extend(backend.pending()?);
            }
            pending.sort_by_key(|job| job.due_at_ms);
            println!("{}", serde_json::to_string_pretty(&pending)?);
        }
    }
    Ok(())
}

async fn work(
    app: &App,
    backends: &[Arc<dyn BackgroundScheduler>],
    period: Duration,
) -> CliResult {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = interval.tick() => fire_due(app, backends)?,
            res = &mut ctrl_c => return Ok(res?),
        }
    }
}
