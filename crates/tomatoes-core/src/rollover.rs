//! Daily reset of the completed-unit counter.

use chrono::{DateTime, Datelike, FixedOffset};
use serde::Serialize;

use crate::error::StoreError;
use crate::storage::{read_day, update, CounterStore, Key};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RolloverOutcome {
    pub completed_units: u32,
    pub last_reset_day: u32,
    /// True when the counter was reset by this check.
    pub reset: bool,
}

/// Compare the day-of-year of `now` against the last reset day.
///
/// An unset `last_reset_day` always differs, so the first launch resets once.
pub fn check_rollover(
    now: &DateTime<FixedOffset>,
    last_reset_day: Option<u32>,
    completed_units: u32,
) -> RolloverOutcome {
    let today = now.ordinal();
    if last_reset_day == Some(today) {
        RolloverOutcome {
            completed_units,
            last_reset_day: today,
            reset: false,
        }
    } else {
        RolloverOutcome {
            completed_units: 0,
            last_reset_day: today,
            reset: true,
        }
    }
}

/// Run [`check_rollover`] against the store in one transaction.
pub fn apply_rollover(
    store: &dyn CounterStore,
    now: &DateTime<FixedOffset>,
) -> Result<RolloverOutcome, StoreError> {
    let outcome = update(store, |batch| {
        let completed = batch.get(Key::CompletedUnits)?.unwrap_or(0);
        let outcome = check_rollover(now, read_day(batch)?, completed);
        if outcome.reset {
            batch.set(Key::CompletedUnits, outcome.completed_units);
            batch.set(Key::LastResetDay, outcome.last_reset_day);
        }
        Ok(outcome)
    })?;

    if outcome.reset {
        tracing::info!(day = outcome.last_reset_day, "daily progress reset");
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn at(rfc3339: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(rfc3339).unwrap()
    }

    #[test]
    fn new_day_resets() {
        let now = at("2026-02-11T08:00:00+00:00");
        let outcome = check_rollover(&now, Some(41), 7);
        assert_eq!(outcome.completed_units, 0);
        assert_eq!(outcome.last_reset_day, 42);
        assert!(outcome.reset);
    }

    #[test]
    fn same_day_is_noop() {
        let now = at("2026-02-11T23:59:59+00:00");
        let outcome = check_rollover(&now, Some(42), 7);
        assert_eq!(outcome.completed_units, 7);
        assert!(!outcome.reset);
    }

    #[test]
    fn unset_day_always_resets() {
        let now = at("2026-01-01T00:00:00+00:00");
        let outcome = check_rollover(&now, None, 0);
        assert!(outcome.reset);
        assert_eq!(outcome.last_reset_day, 1);
    }

    #[test]
    fn day_follows_the_clock_offset() {
        // 23:30 UTC on Feb 10 is already Feb 11 in UTC+3.
        let now = at("2026-02-11T02:30:00+03:00");
        assert_eq!(check_rollover(&now, Some(41), 3).last_reset_day, 42);
    }

    #[test]
    fn apply_persists_once_per_day() {
        let store = MemoryStore::with_entries([
            (Key::CompletedUnits, 5u32),
            (Key::LastResetDay, 41),
        ]);
        let now = at("2026-02-11T08:00:00+00:00");

        let first = apply_rollover(&store, &now).unwrap();
        assert!(first.reset);
        assert_eq!(store.get(Key::CompletedUnits).unwrap().as_deref(), Some("0"));
        assert_eq!(store.get(Key::LastResetDay).unwrap().as_deref(), Some("42"));

        store
            .transact(&mut |batch| {
                batch.set(Key::CompletedUnits, 2);
                Ok(())
            })
            .unwrap();
        let second = apply_rollover(&store, &now).unwrap();
        assert!(!second.reset);
        assert_eq!(second.completed_units, 2);
    }
}
