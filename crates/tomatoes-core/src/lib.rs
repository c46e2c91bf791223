//! # Tomatoes Core Library
//!
//! This library provides the core logic for Tomatoes, a daily "tomato"
//! (Pomodoro) counter. All operations are available through the `tomatoes`
//! CLI, which is a thin layer over this crate.
//!
//! ## Architecture
//!
//! - **Timer Engine**: A wall-clock-based state machine that requires the caller
//!   to periodically invoke `tick()` for progress updates
//! - **Storage**: A key-value counter store (SQLite or in-memory) with atomic
//!   multi-key transactions, plus TOML-based application configuration
//! - **Rollover**: Daily reset of the completed-unit counter
//! - **Completion**: The one idempotent routine that credits a finished unit
//! - **Scheduler**: Wake-alarm and deferred-work backends that finish a
//!   countdown after the foreground process is gone
//!
//! ## Key Components
//!
//! - [`Session`]: Foreground flow from launch to suspend
//! - [`TimerEngine`]: Core timer state machine
//! - [`CounterStore`]: Persistence seam, with [`Database`] and [`MemoryStore`]
//! - [`BackgroundScheduler`]: Background completion seam

pub mod clock;
pub mod completion;
pub mod error;
pub mod events;
pub mod notify;
pub mod progress;
pub mod rollover;
pub mod scheduler;
pub mod session;
pub mod settings;
pub mod storage;
pub mod timer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use completion::Settlement;
pub use error::{ConfigError, CoreError, SchedulerError, StoreError};
pub use events::{CancelReason, Event};
pub use notify::Notifier;
pub use progress::{progress_slots, render_slots, Slot};
pub use rollover::{apply_rollover, check_rollover, RolloverOutcome};
pub use scheduler::{
    AlarmScheduler, BackgroundRequest, BackgroundScheduler, BackgroundStrategy, JobId,
    WorkScheduler,
};
pub use session::Session;
pub use settings::{update_config, SessionConfig};
pub use storage::{Config, CounterStore, Database, Key, MemoryStore};
pub use timer::{format_remaining, TimerEngine, TimerHandle, TimerState};
