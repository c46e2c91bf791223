//! Wiring shared by every command: the store, the config and the
//! collaborators a [`Session`] needs.

use std::sync::Arc;

use tomatoes_core::notify::{self, Notifier};
use tomatoes_core::scheduler;
use tomatoes_core::{
    BackgroundScheduler, Config, CoreError, Database, Event, Session, SystemClock,
};

pub type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

pub struct App {
    pub db: Arc<Database>,
    pub config: Config,
    pub notifier: Arc<dyn Notifier>,
    pub clock: Arc<SystemClock>,
}

impl App {
    pub fn open() -> Result<Self, CoreError> {
        let db = Arc::new(Database::open()?);
        let config = Config::load_or_default();
        let notifier = notify::from_config(&config.notifications);
        Ok(Self {
            db,
            config,
            notifier,
            clock: Arc::new(SystemClock),
        })
    }

    /// The backend selected in `background.strategy`.
    pub fn scheduler(&self) -> Result<Arc<dyn BackgroundScheduler>, CoreError> {
        Ok(scheduler::open(
            self.config.background.strategy,
            self.db.clone(),
        )?)
    }

    pub fn launch(&self) -> Result<(Session, Vec<Event>), CoreError> {
        Session::launch(
            self.db.clone(),
            self.clock.clone(),
            self.scheduler()?,
            self.notifier.clone(),
        )
    }

    /// Launch a session, run `body`, and hand a still-running countdown to
    /// the background before returning.
    pub fn with_session<T, F>(&self, body: F) -> CliResult<T>
    where
        F: FnOnce(&mut Session, Vec<Event>) -> CliResult<T>,
    {
        let (mut session, events) = self.launch()?;
        let out = body(&mut session, events)?;
        park(&mut session)?;
        Ok(out)
    }
}

/// Suspend a running countdown, logging what was armed.
pub fn park(session: &mut Session) -> Result<(), CoreError> {
    for event in session.suspend()? {
        tracing::debug!(?event, "suspended");
    }
    Ok(())
}

pub fn print_event(event: &Event) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string(event)?);
    Ok(())
}

pub fn print_events(events: &[Event]) -> Result<(), serde_json::Error> {
    events.iter().try_for_each(print_event)
}
