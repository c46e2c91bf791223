//! Timer engine implementation.
//!
//! The timer engine is a wall-clock-based state machine. It does not use
//! internal threads - the caller passes "now" in and is responsible for
//! calling `tick()` periodically (once a second is plenty).
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running -> (Completed | Cancelled)
//! ```
//!
//! A finished engine can be started again. Starting or resuming while a
//! countdown is running cancels that countdown first; its handle goes stale
//! and it never completes.
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = TimerEngine::new();
//! let handle = engine.start(25 * 60 * 1000, clock.now_ms());
//! // In a loop:
//! engine.tick(clock.now_ms()); // Some(TimerSignal::Completed { .. }) exactly once
//! ```

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    Idle,
    Running,
    Completed,
    Cancelled,
}

/// Identifies one countdown. Handles of superseded countdowns are stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimerHandle(u64);

/// Output of [`TimerEngine::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerSignal {
    /// Another whole second elapsed since start/resume.
    Tick { handle: TimerHandle, remaining_ms: u64 },
    /// Remaining time reached zero. Emitted once per countdown.
    Completed { handle: TimerHandle },
}

/// Core timer engine.
///
/// Operates on wall-clock deltas -- no internal thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerEngine {
    state: TimerState,
    generation: u64,
    /// Epoch milliseconds at which the running countdown hits zero.
    deadline_ms: Option<i64>,
    /// Remaining time as of the last start/resume/tick.
    remaining_ms: u64,
    /// Remaining whole seconds (rounded up) at the last emitted tick.
    #[serde(default)]
    last_tick_secs: Option<u64>,
}

impl Default for TimerEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerEngine {
    pub fn new() -> Self {
        Self {
            state: TimerState::Idle,
            generation: 0,
            deadline_ms: None,
            remaining_ms: 0,
            last_tick_secs: None,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == TimerState::Running
    }

    /// Handle of the running countdown, if any.
    pub fn handle(&self) -> Option<TimerHandle> {
        self.is_running().then_some(TimerHandle(self.generation))
    }

    pub fn deadline_ms(&self) -> Option<i64> {
        self.deadline_ms
    }

    /// Remaining time at `now_ms` without advancing the engine.
    pub fn remaining_at(&self, now_ms: i64) -> u64 {
        match (self.state, self.deadline_ms) {
            (TimerState::Running, Some(deadline)) => deadline.saturating_sub(now_ms).max(0) as u64,
            _ => self.remaining_ms,
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Begin a fresh countdown of `duration_ms`.
    pub fn start(&mut self, duration_ms: u64, now_ms: i64) -> TimerHandle {
        let handle = self.arm(duration_ms, now_ms);
        tracing::debug!(?handle, duration_ms, "countdown started");
        handle
    }

    /// Continue a countdown from an arbitrary remaining duration, e.g. one
    /// whose start time survived a process restart.
    pub fn resume(&mut self, remaining_ms: u64, now_ms: i64) -> TimerHandle {
        let handle = self.arm(remaining_ms, now_ms);
        tracing::debug!(?handle, remaining_ms, "countdown resumed");
        handle
    }

    /// Stop ticking and suppress completion. Returns false for stale handles
    /// and countdowns that already ended.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        if self.handle() != Some(handle) {
            return false;
        }
        self.state = TimerState::Cancelled;
        self.deadline_ms = None;
        self.last_tick_secs = None;
        tracing::debug!(?handle, remaining_ms = self.remaining_ms, "countdown cancelled");
        true
    }

    /// Advance to `now_ms`.
    pub fn tick(&mut self, now_ms: i64) -> Option<TimerSignal> {
        if !self.is_running() {
            return None;
        }
        let handle = TimerHandle(self.generation);
        self.remaining_ms = self.remaining_at(now_ms);

        if self.remaining_ms == 0 {
            self.state = TimerState::Completed;
            self.deadline_ms = None;
            self.last_tick_secs = None;
            tracing::debug!(?handle, "countdown completed");
            return Some(TimerSignal::Completed { handle });
        }

        let secs = self.remaining_ms.div_ceil(1000);
        if self.last_tick_secs == Some(secs) {
            return None;
        }
        self.last_tick_secs = Some(secs);
        Some(TimerSignal::Tick {
            handle,
            remaining_ms: self.remaining_ms,
        })
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn arm(&mut self, duration_ms: u64, now_ms: i64) -> TimerHandle {
        if let Some(previous) = self.handle() {
            self.cancel(previous);
        }
        self.generation += 1;
        self.state = TimerState::Running;
        self.remaining_ms = duration_ms;
        self.deadline_ms = Some(now_ms.saturating_add(duration_ms.min(i64::MAX as u64) as i64));
        self.last_tick_secs = Some(duration_ms.div_ceil(1000));
        TimerHandle(self.generation)
    }
}

/// Format milliseconds as `MM:SS`, flooring to whole seconds.
pub fn format_remaining(ms: u64) -> String {
    let secs = ms / 1000;
    format!("{:02}:{:02}", secs / 60, secs % 60)
}
