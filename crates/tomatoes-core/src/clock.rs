//! Injectable time source.
//!
//! The timer engine and the rollover check never read the system clock
//! directly; they take "now" from a [`Clock`] so tests can move time by hand.

use std::sync::Mutex;

use chrono::{DateTime, Duration, FixedOffset, Local};

pub trait Clock: Send + Sync {
    /// Current instant, in the offset that defines the user's calendar day.
    fn now(&self) -> DateTime<FixedOffset>;

    fn now_ms(&self) -> i64 {
        self.now().timestamp_millis()
    }
}

/// Wall clock in the local time zone.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<FixedOffset>>,
}

impl ManualClock {
    pub fn new(at: DateTime<FixedOffset>) -> Self {
        Self { now: Mutex::new(at) }
    }

    pub fn advance_ms(&self, ms: i64) {
        if let Ok(mut now) = self.now.lock() {
            *now += Duration::milliseconds(ms);
        }
    }

    pub fn set(&self, at: DateTime<FixedOffset>) {
        if let Ok(mut now) = self.now.lock() {
            *now = at;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<FixedOffset> {
        match self.now.lock() {
            Ok(now) => *now,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}
