//! Foreground session.
//!
//! Launch loads persisted state, applies the daily rollover and picks up a
//! countdown that was in flight when the previous process went away. After
//! that the front end forwards user intents (`start`, `cancel_early`) and
//! calls `tick` about once a second. `suspend` hands a running countdown to
//! the background scheduler before the process exits.

use std::sync::Arc;

use chrono::Utc;

use crate::clock::Clock;
use crate::completion::{self, Settlement};
use crate::error::{CoreError, SchedulerError};
use crate::events::{CancelReason, Event};
use crate::notify::Notifier;
use crate::progress::{progress_slots, Slot};
use crate::rollover::apply_rollover;
use crate::scheduler::{BackgroundRequest, BackgroundScheduler, JobId};
use crate::settings::SessionConfig;
use crate::storage::{update, CounterStore, Key, PersistedState};
use crate::timer::{format_remaining, TimerEngine, TimerSignal, TimerState};

pub struct Session {
    store: Arc<dyn CounterStore>,
    clock: Arc<dyn Clock>,
    scheduler: Arc<dyn BackgroundScheduler>,
    notifier: Arc<dyn Notifier>,
    /// Read once at launch.
    config: SessionConfig,
    engine: TimerEngine,
    completed_units: u32,
}

impl Session {
    /// Load state, apply the rollover and restore an interrupted countdown.
    ///
    /// Returns the session plus the events produced along the way.
    pub fn launch(
        store: Arc<dyn CounterStore>,
        clock: Arc<dyn Clock>,
        scheduler: Arc<dyn BackgroundScheduler>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<(Self, Vec<Event>), CoreError> {
        let config = SessionConfig::load(store.as_ref())?;
        let mut session = Self {
            store,
            clock,
            scheduler,
            notifier,
            config,
            engine: TimerEngine::new(),
            completed_units: 0,
        };

        let mut events = Vec::new();
        let now = session.clock.now();
        let rollover = apply_rollover(session.store.as_ref(), &now)?;
        if rollover.reset {
            events.push(Event::RolloverApplied {
                day_of_year: rollover.last_reset_day,
                at: session.at(),
            });
        }

        events.extend(session.restore()?);
        session.completed_units = PersistedState::load(session.store.as_ref())?.completed_units;
        tracing::debug!(
            completed_units = session.completed_units,
            state = ?session.engine.state(),
            "session launched"
        );
        Ok((session, events))
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn config(&self) -> SessionConfig {
        self.config
    }

    pub fn state(&self) -> TimerState {
        self.engine.state()
    }

    pub fn completed_units(&self) -> u32 {
        self.completed_units
    }

    pub fn remaining_ms(&self) -> u64 {
        if self.engine.is_running() {
            self.engine.remaining_at(self.clock.now_ms())
        } else {
            self.config.unit_duration_ms
        }
    }

    pub fn progress(&self) -> Vec<Slot> {
        progress_slots(self.completed_units, self.config.total_units)
    }

    /// Build a full state snapshot event.
    pub fn snapshot(&self) -> Result<Event, CoreError> {
        let remaining_ms = self.remaining_ms();
        let background_job_id = self.store.get(Key::BackgroundJobId)?;
        Ok(Event::StateSnapshot {
            state: self.engine.state(),
            remaining_ms,
            display: format_remaining(remaining_ms),
            completed_units: self.completed_units,
            total_units: self.config.total_units,
            unit_duration_ms: self.config.unit_duration_ms,
            slots: self.progress(),
            background_job_id,
            at: self.at(),
        })
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Start a fresh countdown of the configured length. A running countdown
    /// is cancelled first.
    pub fn start(&mut self) -> Result<Vec<Event>, CoreError> {
        let mut events = Vec::new();
        if let Some(handle) = self.engine.handle() {
            self.engine.cancel(handle);
            events.push(Event::TimerCancelled {
                reason: CancelReason::Superseded,
                at: self.at(),
            });
        }
        events.extend(self.cancel_pending_job()?);

        let now_ms = self.clock.now_ms();
        let duration_ms = self.config.unit_duration_ms;
        self.engine.start(duration_ms, now_ms);
        update(self.store.as_ref(), |batch| {
            batch.set(Key::StartTimestampMs, now_ms);
            Ok(())
        })?;

        events.push(Event::TimerStarted {
            duration_ms,
            start_timestamp_ms: now_ms,
            at: self.at(),
        });
        Ok(events)
    }

    /// Advance the countdown; on completion, credit the unit.
    pub fn tick(&mut self) -> Result<Vec<Event>, CoreError> {
        match self.engine.tick(self.clock.now_ms()) {
            None => Ok(Vec::new()),
            Some(TimerSignal::Tick { remaining_ms, .. }) => Ok(vec![Event::TimerTick {
                remaining_ms,
                display: format_remaining(remaining_ms),
                at: self.at(),
            }]),
            Some(TimerSignal::Completed { .. }) => {
                let mut events = vec![Event::TimerCompleted { at: self.at() }];
                let settlement = completion::complete_in_foreground(
                    self.store.as_ref(),
                    self.notifier.as_ref(),
                    self.config.total_units,
                )?;
                events.extend(self.record(settlement)?);
                Ok(events)
            }
        }
    }

    /// Stop the running countdown before it completes. Does nothing when no
    /// countdown is running.
    pub fn cancel_early(&mut self, with_credit: bool) -> Result<Vec<Event>, CoreError> {
        let Some(handle) = self.engine.handle() else {
            return Ok(Vec::new());
        };
        self.engine.cancel(handle);
        let mut events = vec![Event::TimerCancelled {
            reason: CancelReason::EarlyFinish,
            at: self.at(),
        }];
        events.extend(self.cancel_pending_job()?);

        let settlement =
            completion::finish_early(self.store.as_ref(), with_credit, self.config.total_units)?;
        events.extend(self.record(settlement)?);
        Ok(events)
    }

    /// Hand a running countdown to the background scheduler and tear down
    /// the in-memory one. The start marker stays in place for the handler.
    ///
    /// A missing marker means another context already settled the
    /// countdown; nothing is armed then.
    pub fn suspend(&mut self) -> Result<Vec<Event>, CoreError> {
        let Some(handle) = self.engine.handle() else {
            return Ok(Vec::new());
        };
        let now_ms = self.clock.now_ms();
        let mut events = self.cancel_pending_job()?;
        self.engine.cancel(handle);

        let Some(start_timestamp_ms) =
            PersistedState::load(self.store.as_ref())?.start_timestamp_ms
        else {
            events.push(self.settled_elsewhere());
            return Ok(events);
        };
        let request = BackgroundRequest {
            start_timestamp_ms,
            duration_ms: self.config.unit_duration_ms,
            now_ms,
        };

        let job = self.scheduler.schedule(&request)?;
        let job_id = job.to_string();
        // Only attach the job to the countdown it was armed for.
        let (attached, in_use) = update(self.store.as_ref(), |batch| {
            let in_use = batch.get_raw(Key::BackgroundJobId) == Some(job_id.as_str());
            if batch.get::<i64>(Key::StartTimestampMs)? != Some(start_timestamp_ms) {
                return Ok((false, in_use));
            }
            batch.set(Key::BackgroundJobId, &job_id);
            Ok((true, in_use))
        })?;
        if !attached {
            // A newer countdown may have re-armed the same alarm slot.
            if !in_use {
                self.scheduler.cancel(&job)?;
            }
            events.push(self.settled_elsewhere());
            return Ok(events);
        }

        tracing::info!(%job, due_at_ms = request.due_at_ms(), "countdown handed to background");
        events.push(Event::TimerCancelled {
            reason: CancelReason::Suspended,
            at: self.at(),
        });
        events.push(Event::BackgroundArmed {
            job_id,
            due_at_ms: request.due_at_ms(),
            at: self.at(),
        });
        Ok(events)
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn at(&self) -> chrono::DateTime<Utc> {
        self.clock.now().with_timezone(&Utc)
    }

    fn settled_elsewhere(&self) -> Event {
        tracing::info!("countdown was settled elsewhere; nothing to hand off");
        Event::TimerCancelled {
            reason: CancelReason::SettledElsewhere,
            at: self.at(),
        }
    }

    /// Pick up a countdown whose start marker survived the last process.
    fn restore(&mut self) -> Result<Vec<Event>, CoreError> {
        if PersistedState::load(self.store.as_ref())?
            .start_timestamp_ms
            .is_none()
        {
            return Ok(Vec::new());
        }

        // Whatever happens next, the foreground owns this countdown again.
        let mut events = self.cancel_pending_job()?;

        // A job that fired before the cancel may have settled it meanwhile.
        let Some(start_timestamp_ms) =
            PersistedState::load(self.store.as_ref())?.start_timestamp_ms
        else {
            tracing::debug!("countdown settled by the background before restore");
            return Ok(events);
        };

        let duration = self.config.unit_duration_ms;
        let now_ms = self.clock.now_ms();
        let elapsed = now_ms.saturating_sub(start_timestamp_ms);
        let remaining = (duration.min(i64::MAX as u64) as i64).saturating_sub(elapsed);

        if remaining > 0 {
            let remaining_ms = (remaining as u64).min(duration);
            self.engine.resume(remaining_ms, now_ms);
            events.push(Event::TimerResumed {
                remaining_ms,
                at: self.at(),
            });
        } else {
            // The completion instant passed while nobody was watching.
            events.push(Event::TimerCompleted { at: self.at() });
            let settlement = completion::complete_in_foreground(
                self.store.as_ref(),
                self.notifier.as_ref(),
                self.config.total_units,
            )?;
            events.extend(self.record(settlement)?);
        }
        Ok(events)
    }

    /// Cancel and forget the persisted background job, if any.
    fn cancel_pending_job(&self) -> Result<Vec<Event>, CoreError> {
        let Some(raw) = self.store.get(Key::BackgroundJobId)? else {
            return Ok(Vec::new());
        };

        match raw.parse::<JobId>() {
            Ok(job) => match self.scheduler.cancel(&job) {
                Ok(was_pending) => {
                    tracing::debug!(%job, was_pending, "background job cancelled");
                }
                // The completion guard refuses a job that is no longer the
                // persisted one, so forgetting it is enough.
                Err(SchedulerError::ForeignJob { job, strategy }) => {
                    tracing::warn!(%job, %strategy, "cannot cancel job from the other backend");
                }
                Err(e) => return Err(e.into()),
            },
            Err(e) => tracing::warn!("dropping unreadable background job id: {e}"),
        }

        update(self.store.as_ref(), |batch| {
            batch.remove(Key::BackgroundJobId);
            Ok(())
        })?;
        Ok(vec![Event::BackgroundCancelled {
            job_id: raw,
            at: self.at(),
        }])
    }

    /// Track the settled count and turn the outcome into events.
    fn record(&mut self, settlement: Settlement) -> Result<Vec<Event>, CoreError> {
        self.completed_units = match settlement.completed_units() {
            Some(completed_units) => completed_units,
            None => PersistedState::load(self.store.as_ref())?.completed_units,
        };
        Ok(match settlement {
            Settlement::Credited {
                completed_units,
                total_units,
            } => {
                tracing::info!(completed_units, total_units, "unit credited");
                vec![Event::UnitCredited {
                    completed_units,
                    total_units,
                    at: self.at(),
                }]
            }
            Settlement::AlreadySettled => {
                tracing::debug!("countdown was already settled elsewhere");
                Vec::new()
            }
            _ => Vec::new(),
        })
    }
}
