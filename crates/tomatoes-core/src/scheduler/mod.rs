//! Background completion scheduling.
//!
//! When the foreground goes away mid-countdown, a job is armed so the unit
//! still gets credited. Two interchangeable backends exist:
//! - [`AlarmScheduler`]: a one-shot wake trigger at an absolute instant,
//!   keyed by an integer request code
//! - [`WorkScheduler`]: a deferred work item with an initial delay, keyed by
//!   a UUID
//!
//! Both keep their pending jobs in SQLite next to the counter store. A
//! separate context (`tomatoes background run-due` or the worker loop) calls
//! [`run_due`], which shares nothing with the foreground but the store.
//! Jobs that are missed entirely are never retried.

mod alarm;
mod work;

pub use alarm::{AlarmScheduler, ALARM_REQUEST_CODE};
pub use work::WorkScheduler;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clock::Clock;
use crate::completion::{self, Settlement};
use crate::error::{CoreError, SchedulerError};
use crate::events::Event;
use crate::notify::Notifier;
use crate::storage::{CounterStore, Database};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundStrategy {
    /// Wake-alarm at the absolute completion instant.
    #[default]
    Alarm,
    /// Deferred work with an initial delay.
    Work,
}

impl fmt::Display for BackgroundStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackgroundStrategy::Alarm => f.write_str("alarm"),
            BackgroundStrategy::Work => f.write_str("work"),
        }
    }
}

/// Opaque handle of a pending background job, persisted as
/// `alarm:<request code>` or `work:<uuid>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum JobId {
    Alarm(i32),
    Work(Uuid),
}

impl JobId {
    pub fn strategy(&self) -> BackgroundStrategy {
        match self {
            JobId::Alarm(_) => BackgroundStrategy::Alarm,
            JobId::Work(_) => BackgroundStrategy::Work,
        }
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobId::Alarm(code) => write!(f, "alarm:{code}"),
            JobId::Work(id) => write!(f, "work:{id}"),
        }
    }
}

impl FromStr for JobId {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SchedulerError::InvalidJobId(s.to_string());
        let (kind, rest) = s.split_once(':').ok_or_else(invalid)?;
        match kind {
            "alarm" => rest.parse().map(JobId::Alarm).map_err(|_| invalid()),
            "work" => Uuid::parse_str(rest).map(JobId::Work).map_err(|_| invalid()),
            _ => Err(invalid()),
        }
    }
}

/// What to arm: the countdown that started at `start_timestamp_ms` and lasts
/// `duration_ms`, as seen at `now_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackgroundRequest {
    pub start_timestamp_ms: i64,
    pub duration_ms: u64,
    pub now_ms: i64,
}

impl BackgroundRequest {
    /// Absolute completion instant.
    pub fn due_at_ms(&self) -> i64 {
        self.start_timestamp_ms
            .saturating_add(self.duration_ms.min(i64::MAX as u64) as i64)
    }

    /// Time left until completion, zero if already past.
    pub fn delay_ms(&self) -> u64 {
        self.due_at_ms().saturating_sub(self.now_ms).max(0) as u64
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingJob {
    #[serde(serialize_with = "serialize_display")]
    pub job_id: JobId,
    pub due_at_ms: i64,
}

fn serialize_display<S: serde::Serializer>(job: &JobId, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(job)
}

pub trait BackgroundScheduler: Send + Sync {
    fn strategy(&self) -> BackgroundStrategy;

    /// Arm a job for `request`.
    fn schedule(&self, request: &BackgroundRequest) -> Result<JobId, SchedulerError>;

    /// Remove a pending job. Returns true if it was still pending, which
    /// also makes the caller its only runner. Cancelling twice is harmless.
    fn cancel(&self, job: &JobId) -> Result<bool, SchedulerError>;

    /// Claim a job for running, but only while its completion instant is at
    /// or before `now_ms`. A slot re-armed for a later countdown is left
    /// alone and reported as not claimed.
    fn cancel_due(&self, job: &JobId, now_ms: i64) -> Result<bool, SchedulerError>;

    fn pending(&self) -> Result<Vec<PendingJob>, SchedulerError>;

    /// Pending jobs whose completion instant is at or before `now_ms`.
    fn due(&self, now_ms: i64) -> Result<Vec<JobId>, SchedulerError> {
        Ok(self
            .pending()?
            .into_iter()
            .filter(|job| job.due_at_ms <= now_ms)
            .map(|job| job.job_id)
            .collect())
    }
}

/// Build the backend for `strategy` over a shared database.
pub fn open(
    strategy: BackgroundStrategy,
    db: Arc<Database>,
) -> Result<Arc<dyn BackgroundScheduler>, SchedulerError> {
    Ok(match strategy {
        BackgroundStrategy::Alarm => Arc::new(AlarmScheduler::new(db)?),
        BackgroundStrategy::Work => Arc::new(WorkScheduler::new(db)?),
    })
}

/// Fire every due job of `scheduler`.
///
/// Each job is claimed with [`BackgroundScheduler::cancel_due`] first, so two
/// runners never fire the same job and a slot re-armed in the meantime is not
/// taken. The completion handler re-derives everything from the store and
/// refuses jobs that are no longer the persisted pending one.
pub fn run_due(
    scheduler: &dyn BackgroundScheduler,
    store: &dyn CounterStore,
    notifier: &dyn Notifier,
    clock: &dyn Clock,
) -> Result<Vec<Event>, CoreError> {
    let now_ms = clock.now_ms();
    let mut events = Vec::new();
    for job in scheduler.due(now_ms)? {
        if !scheduler.cancel_due(&job, now_ms)? {
            tracing::debug!(%job, "job claimed by another runner or re-armed");
            continue;
        }
        let settlement = completion::complete_in_background(store, notifier, &job, now_ms)?;
        let at = clock.now().with_timezone(&Utc);
        tracing::info!(%job, ?settlement, "background job fired");
        events.push(Event::BackgroundFired {
            job_id: job.to_string(),
            credited: settlement.is_credited(),
            at,
        });
        if let Settlement::Credited {
            completed_units,
            total_units,
        } = settlement
        {
            events.push(Event::UnitCredited {
                completed_units,
                total_units,
                at,
            });
        }
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_ids_parse_back() {
        let alarm: JobId = "alarm:0".parse().unwrap();
        assert_eq!(alarm, JobId::Alarm(0));
        assert_eq!(alarm.to_string(), "alarm:0");

        let id = Uuid::new_v4();
        let work: JobId = format!("work:{id}").parse().unwrap();
        assert_eq!(work, JobId::Work(id));
        assert_eq!(work.strategy(), BackgroundStrategy::Work);
    }

    #[test]
    fn malformed_job_ids_are_rejected() {
        for raw in ["", "alarm", "alarm:x", "work:not-a-uuid", "cron:1"] {
            assert!(raw.parse::<JobId>().is_err(), "{raw}");
        }
    }

    #[test]
    fn request_timing() {
        let request = BackgroundRequest {
            start_timestamp_ms: 1_000,
            duration_ms: 1_500_000,
            now_ms: 1_001_000,
        };
        assert_eq!(request.due_at_ms(), 1_501_000);
        assert_eq!(request.delay_ms(), 500_000);

        let late = BackgroundRequest {
            now_ms: 2_000_000,
            ..request
        };
        assert_eq!(late.delay_ms(), 0);
    }
}
