use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::progress::Slot;
use crate::timer::TimerState;

/// Why a running countdown stopped without completing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    /// The user finished early.
    EarlyFinish,
    /// A new countdown was started on top of it.
    Superseded,
    /// The foreground handed it to the background scheduler.
    Suspended,
    /// Another context credited or discarded it first.
    SettledElsewhere,
}

/// Every state change in the system produces an Event.
/// The CLI prints them as JSON lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    TimerStarted {
        duration_ms: u64,
        start_timestamp_ms: i64,
        at: DateTime<Utc>,
    },
    TimerResumed {
        remaining_ms: u64,
        at: DateTime<Utc>,
    },
    TimerTick {
        remaining_ms: u64,
        display: String,
        at: DateTime<Utc>,
    },
    TimerCompleted {
        at: DateTime<Utc>,
    },
    TimerCancelled {
        reason: CancelReason,
        at: DateTime<Utc>,
    },
    UnitCredited {
        completed_units: u32,
        total_units: u32,
        at: DateTime<Utc>,
    },
    RolloverApplied {
        day_of_year: u32,
        at: DateTime<Utc>,
    },
    BackgroundArmed {
        job_id: String,
        due_at_ms: i64,
        at: DateTime<Utc>,
    },
    BackgroundCancelled {
        job_id: String,
        at: DateTime<Utc>,
    },
    /// A background job ran the completion handler.
    BackgroundFired {
        job_id: String,
        credited: bool,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        state: TimerState,
        remaining_ms: u64,
        display: String,
        completed_units: u32,
        total_units: u32,
        unit_duration_ms: u64,
        slots: Vec<Slot>,
        background_job_id: Option<String>,
        at: DateTime<Utc>,
    },
}
