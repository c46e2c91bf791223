//! Integration tests for the foreground session lifecycle.

use std::sync::Arc;

use chrono::DateTime;
use tomatoes_core::notify::Recording;
use tomatoes_core::{
    AlarmScheduler, BackgroundScheduler, CancelReason, Clock, CounterStore, Database, Event, Key,
    ManualClock, Session, TimerState,
};

const UNIT_MS: i64 = 1_500_000;

struct Harness {
    db: Arc<Database>,
    clock: Arc<ManualClock>,
    alarms: Arc<AlarmScheduler>,
    sound: Arc<Recording>,
}

impl Harness {
    fn new() -> Self {
        let db = Arc::new(Database::open_memory().unwrap());
        let start = DateTime::parse_from_rfc3339("2026-03-02T09:00:00+01:00").unwrap();
        Self {
            alarms: Arc::new(AlarmScheduler::new(db.clone()).unwrap()),
            db,
            clock: Arc::new(ManualClock::new(start)),
            sound: Arc::new(Recording::default()),
        }
    }

    fn launch(&self) -> (Session, Vec<Event>) {
        Session::launch(
            self.db.clone(),
            self.clock.clone(),
            self.alarms.clone(),
            self.sound.clone(),
        )
        .unwrap()
    }

    fn seed(&self, key: Key, value: impl ToString) {
        self.db.kv_set(key.as_str(), &value.to_string()).unwrap();
    }

    fn value(&self, key: Key) -> Option<String> {
        self.db.get(key).unwrap()
    }
}

fn count(events: &[Event], pred: impl Fn(&Event) -> bool) -> usize {
    events.iter().filter(|e| pred(e)).count()
}

#[test]
fn first_launch_resets_once() {
    let h = Harness::new();
    let (_, events) = h.launch();
    assert!(matches!(events[..], [Event::RolloverApplied { day_of_year: 61, .. }]));

    let (session, events) = h.launch();
    assert!(events.is_empty());
    assert_eq!(session.completed_units(), 0);
    assert_eq!(h.value(Key::LastResetDay).as_deref(), Some("61"));
}

#[test]
fn new_day_resets_progress() {
    let h = Harness::new();
    h.seed(Key::CompletedUnits, 9);
    h.seed(Key::LastResetDay, 60);
    let (session, _) = h.launch();
    assert_eq!(session.completed_units(), 0);
    assert_eq!(h.value(Key::CompletedUnits).as_deref(), Some("0"));
}

#[test]
fn natural_completion_credits_exactly_once() {
    let h = Harness::new();
    h.seed(Key::TotalUnits, 12);
    h.seed(Key::UnitDurationMs, UNIT_MS);
    let (mut session, _) = h.launch();

    session.start().unwrap();
    assert!(h.value(Key::StartTimestampMs).is_some());

    let mut events = Vec::new();
    for _ in 0..1_510 {
        h.clock.advance_ms(1_000);
        events.extend(session.tick().unwrap());
    }

    assert_eq!(count(&events, |e| matches!(e, Event::TimerCompleted { .. })), 1);
    assert_eq!(count(&events, |e| matches!(e, Event::TimerTick { .. })), 1_499);
    assert_eq!(session.completed_units(), 1);
    assert_eq!(session.state(), TimerState::Completed);
    assert_eq!(h.value(Key::CompletedUnits).as_deref(), Some("1"));
    assert!(h.value(Key::StartTimestampMs).is_none());
    assert_eq!(h.sound.count(), 1);
}

#[test]
fn completion_at_goal_does_not_overflow() {
    let h = Harness::new();
    h.seed(Key::TotalUnits, 2);
    h.seed(Key::CompletedUnits, 2);
    h.seed(Key::LastResetDay, 61);
    let (mut session, _) = h.launch();

    session.start().unwrap();
    h.clock.advance_ms(UNIT_MS);
    let events = session.tick().unwrap();
    assert_eq!(count(&events, |e| matches!(e, Event::UnitCredited { .. })), 0);
    assert_eq!(session.completed_units(), 2);
    assert_eq!(h.value(Key::CompletedUnits).as_deref(), Some("2"));
}

#[test]
fn early_finish_with_credit_leaves_no_background_job() {
    let h = Harness::new();
    let (mut session, _) = h.launch();
    session.start().unwrap();
    session.suspend().unwrap();
    assert_eq!(h.alarms.pending().unwrap().len(), 1);

    // Come back ten minutes in and finish with credit.
    h.clock.advance_ms(600_000);
    let (mut session, events) = h.launch();
    assert_eq!(count(&events, |e| matches!(e, Event::BackgroundCancelled { .. })), 1);
    assert_eq!(session.state(), TimerState::Running);

    let events = session.cancel_early(true).unwrap();
    assert!(matches!(
        events[0],
        Event::TimerCancelled {
            reason: CancelReason::EarlyFinish,
            ..
        }
    ));
    assert_eq!(session.completed_units(), 1);
    assert_ne!(session.state(), TimerState::Running);
    assert!(h.alarms.pending().unwrap().is_empty());
    assert!(h.value(Key::BackgroundJobId).is_none());
    assert!(h.value(Key::StartTimestampMs).is_none());
    // Early finishes are silent.
    assert_eq!(h.sound.count(), 0);
}

#[test]
fn early_finish_without_credit_keeps_count() {
    let h = Harness::new();
    h.seed(Key::CompletedUnits, 4);
    h.seed(Key::LastResetDay, 61);
    let (mut session, _) = h.launch();
    session.start().unwrap();
    h.clock.advance_ms(60_000);

    let events = session.cancel_early(false).unwrap();
    assert_eq!(count(&events, |e| matches!(e, Event::UnitCredited { .. })), 0);
    assert_eq!(session.completed_units(), 4);
    assert_eq!(h.value(Key::CompletedUnits).as_deref(), Some("4"));
    assert!(h.value(Key::StartTimestampMs).is_none());

    // Nothing running: a second early finish is a no-op.
    assert!(session.cancel_early(true).unwrap().is_empty());
}

#[test]
fn restart_mid_countdown_resumes_and_cancels_alarm() {
    let h = Harness::new();
    h.seed(Key::UnitDurationMs, UNIT_MS);
    let now = h.clock.now_ms();
    h.seed(Key::StartTimestampMs, now - 1_000_000);
    let job = h
        .alarms
        .schedule(&tomatoes_core::BackgroundRequest {
            start_timestamp_ms: now - 1_000_000,
            duration_ms: UNIT_MS as u64,
            now_ms: now - 400_000,
        })
        .unwrap();
    h.seed(Key::BackgroundJobId, &job);

    let (session, events) = h.launch();
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::TimerResumed { remaining_ms: 500_000, .. })));
    assert_eq!(session.state(), TimerState::Running);
    assert_eq!(session.remaining_ms(), 500_000);
    assert!(h.alarms.pending().unwrap().is_empty());
    assert!(h.value(Key::BackgroundJobId).is_none());
    assert!(h.value(Key::StartTimestampMs).is_some());
}

#[test]
fn starting_twice_supersedes_the_first_countdown() {
    let h = Harness::new();
    let (mut session, _) = h.launch();
    session.start().unwrap();
    h.clock.advance_ms(UNIT_MS / 2);
    let events = session.start().unwrap();
    assert!(matches!(
        events[0],
        Event::TimerCancelled {
            reason: CancelReason::Superseded,
            ..
        }
    ));

    let mut completions = 0;
    for _ in 0..(UNIT_MS / 1_000 + 10) {
        h.clock.advance_ms(1_000);
        completions += count(&session.tick().unwrap(), |e| {
            matches!(e, Event::TimerCompleted { .. })
        });
    }
    assert_eq!(completions, 1);
    assert_eq!(session.completed_units(), 1);
}

#[test]
fn settings_apply_from_next_launch() {
    let h = Harness::new();
    let (session, _) = h.launch();
    assert_eq!(session.config().total_units, 12);

    tomatoes_core::update_config(h.db.as_ref(), "4", "50").unwrap();
    assert_eq!(session.config().total_units, 12);
    assert_eq!(session.progress().len(), 12);

    let (session, _) = h.launch();
    assert_eq!(session.config().total_units, 4);
    assert_eq!(session.config().unit_duration_ms, 3_000_000);
}

#[test]
fn snapshot_reports_progress() {
    let h = Harness::new();
    h.seed(Key::CompletedUnits, 3);
    h.seed(Key::LastResetDay, 61);
    h.seed(Key::TotalUnits, 4);
    let (session, _) = h.launch();

    match session.snapshot().unwrap() {
        Event::StateSnapshot {
            state,
            display,
            completed_units,
            slots,
            background_job_id,
            ..
        } => {
            assert_eq!(state, TimerState::Idle);
            assert_eq!(display, "25:00");
            assert_eq!(completed_units, 3);
            assert_eq!(slots.len(), 4);
            assert!(background_job_id.is_none());
        }
        other => panic!("Expected StateSnapshot, got {other:?}"),
    }
}
