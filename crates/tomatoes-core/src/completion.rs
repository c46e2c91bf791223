//! Crediting a finished countdown.
//!
//! Natural completion, early finish and background jobs all end up here.
//! The persisted start marker is what makes this safe to run twice: the
//! transaction that credits also removes the marker, so whoever comes second
//! finds nothing to settle.

use serde::Serialize;

use crate::error::StoreError;
use crate::notify::Notifier;
use crate::scheduler::JobId;
use crate::settings::SessionConfig;
use crate::storage::{update, CounterStore, Key};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Settlement {
    /// One unit credited.
    Credited { completed_units: u32, total_units: u32 },
    /// The daily goal was already met; nothing added.
    GoalReached { completed_units: u32, total_units: u32 },
    /// Finished early without credit.
    Discarded { completed_units: u32 },
    /// Another context already settled this countdown.
    AlreadySettled,
}

impl Settlement {
    pub fn is_credited(&self) -> bool {
        matches!(self, Settlement::Credited { .. })
    }

    /// False only when someone else got there first.
    pub fn settled_here(&self) -> bool {
        !matches!(self, Settlement::AlreadySettled)
    }

    pub fn completed_units(&self) -> Option<u32> {
        match *self {
            Settlement::Credited {
                completed_units, ..
            }
            | Settlement::GoalReached {
                completed_units, ..
            }
            | Settlement::Discarded { completed_units } => Some(completed_units),
            Settlement::AlreadySettled => None,
        }
    }
}

/// A background job asking to settle: it must still be the persisted
/// pending job, and the countdown it belongs to must be due at `now_ms`.
struct JobGuard {
    job: String,
    now_ms: i64,
}

/// Clear the in-flight state and optionally credit one unit, clamped to the
/// goal. `goal` of `None` re-reads `total_units` from the store.
fn settle(
    store: &dyn CounterStore,
    credit: bool,
    goal: Option<u32>,
    guard: Option<JobGuard>,
) -> Result<Settlement, StoreError> {
    update(store, |batch| {
        let Some(start_timestamp_ms) = batch.get::<i64>(Key::StartTimestampMs)? else {
            return Ok(Settlement::AlreadySettled);
        };
        if let Some(guard) = &guard {
            if batch.get_raw(Key::BackgroundJobId) != Some(guard.job.as_str()) {
                return Ok(Settlement::AlreadySettled);
            }
            let duration_ms = SessionConfig::read(batch)?.unit_duration_ms;
            let due_at_ms =
                start_timestamp_ms.saturating_add(duration_ms.min(i64::MAX as u64) as i64);
            if due_at_ms > guard.now_ms {
                tracing::warn!(
                    job = %guard.job,
                    due_at_ms,
                    now_ms = guard.now_ms,
                    "refusing to settle a countdown that is not due"
                );
                return Ok(Settlement::AlreadySettled);
            }
        }

        let total_units = match goal {
            Some(total) => total,
            None => SessionConfig::read(batch)?.total_units,
        };
        let completed_units: u32 = batch.get(Key::CompletedUnits)?.unwrap_or(0);

        batch.remove(Key::StartTimestampMs);
        batch.remove(Key::BackgroundJobId);

        if !credit {
            return Ok(Settlement::Discarded { completed_units });
        }
        if completed_units < total_units {
            batch.set(Key::CompletedUnits, completed_units + 1);
            Ok(Settlement::Credited {
                completed_units: completed_units + 1,
                total_units,
            })
        } else {
            Ok(Settlement::GoalReached {
                completed_units,
                total_units,
            })
        }
    })
}

fn notify(notifier: &dyn Notifier, settlement: Settlement) -> Settlement {
    if let Some(completed_units) = settlement.completed_units() {
        notifier.unit_finished(completed_units);
    }
    settlement
}

/// The foreground countdown reached zero.
pub fn complete_in_foreground(
    store: &dyn CounterStore,
    notifier: &dyn Notifier,
    goal: u32,
) -> Result<Settlement, StoreError> {
    let settlement = settle(store, true, Some(goal), None)?;
    Ok(notify(notifier, settlement))
}

/// A background job fired at `now_ms`. Nothing in memory is trusted; the
/// goal and unit length come from the store.
pub fn complete_in_background(
    store: &dyn CounterStore,
    notifier: &dyn Notifier,
    job: &JobId,
    now_ms: i64,
) -> Result<Settlement, StoreError> {
    let guard = JobGuard {
        job: job.to_string(),
        now_ms,
    };
    let settlement = settle(store, true, None, Some(guard))?;
    Ok(notify(notifier, settlement))
}

/// The user stopped the countdown early, with or without credit. No sound.
pub fn finish_early(
    store: &dyn CounterStore,
    with_credit: bool,
    goal: u32,
) -> Result<Settlement, StoreError> {
    settle(store, with_credit, Some(goal), None)
}
