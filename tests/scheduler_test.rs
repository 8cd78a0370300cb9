//! Scheduler and wake policy integration tests

use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use waqt::models::{prayer, NormalizedSnapshot, SnapshotValue};
use waqt::scheduler::policy::start_of_local_day;
use waqt::scheduler::{Scheduler, WakePolicy, WakeState};

fn utc(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

fn snapshot_with_midnight(midnight: DateTime<Utc>) -> NormalizedSnapshot {
    let mut snapshot = NormalizedSnapshot::new("test", midnight.date_naive());
    snapshot.insert(prayer::MIDNIGHT, SnapshotValue::Instant(midnight));
    snapshot
}

#[test]
fn test_dual_rule_midnight_passed() {
    let snapshot = snapshot_with_midnight(utc("2024-01-15T23:30:00Z"));
    let wake = WakePolicy::CalculatedMidnight
        .next_wake(Some(&snapshot), utc("2024-01-15T23:50:00Z"), &chrono_tz::UTC)
        .unwrap();

    assert_eq!(wake, utc("2024-01-16T23:31:00Z"));
}

#[test]
fn test_dual_rule_midnight_after_civil_midnight() {
    // M falls after civil midnight; wake at the start of tomorrow
    let snapshot = snapshot_with_midnight(utc("2024-06-16T00:40:00Z"));
    let wake = WakePolicy::CalculatedMidnight
        .next_wake(Some(&snapshot), utc("2024-06-15T22:00:00Z"), &chrono_tz::UTC)
        .unwrap();

    assert_eq!(wake, utc("2024-06-16T00:00:00Z"));
}

#[test]
fn test_dual_rule_local_timezone() {
    // Dublin summer time: local midnight is 23:00 UTC
    let wake = WakePolicy::CalculatedMidnight
        .next_wake(None, utc("2024-06-15T12:00:00Z"), &chrono_tz::Europe::Dublin)
        .unwrap();

    assert_eq!(wake, utc("2024-06-15T23:00:00Z"));
}

#[test]
fn test_jitter_within_window() {
    let policy = WakePolicy::after_midnight();
    let now = utc("2024-01-15T10:00:00Z");

    for _ in 0..50 {
        let wake = policy.next_wake(None, now, &chrono_tz::UTC).unwrap();
        assert!(wake >= utc("2024-01-16T00:00:00Z"));
        assert!(wake <= utc("2024-01-16T01:00:00Z"));
    }
}

#[test]
fn test_interval() {
    let now = utc("2024-01-15T10:00:00Z");
    let wake = WakePolicy::Interval { secs: 30 }
        .next_wake(None, now, &chrono_tz::UTC)
        .unwrap();
    assert_eq!(wake, now + Duration::seconds(30));
}

#[test]
fn test_start_of_day_when_midnight_is_skipped() {
    // Santiago springs forward at 00:00 on 2024-09-08
    let date = NaiveDate::from_ymd_opt(2024, 9, 8).unwrap();
    let start = start_of_local_day(date, &chrono_tz::America::Santiago).unwrap();
    assert_eq!(start, utc("2024-09-08T04:00:00Z"));
}

#[test]
fn test_policy_serde() {
    let policy: WakePolicy = serde_json::from_str(r#"{"policy":"after_midnight_jitter"}"#).unwrap();
    assert_eq!(policy, WakePolicy::after_midnight());

    let policy: WakePolicy = serde_json::from_str(r#"{"policy":"interval","secs":10}"#).unwrap();
    assert_eq!(policy, WakePolicy::Interval { secs: 10 });
}

#[tokio::test]
async fn test_rescheduled_wake_fires_once() {
    let scheduler = Scheduler::new("test");
    let fired = Arc::new(AtomicUsize::new(0));

    for delay in [50, 80, 120] {
        let fired = Arc::clone(&fired);
        scheduler.schedule_at(Utc::now() + Duration::milliseconds(delay), move || async move {
            fired.fetch_add(1, Ordering::SeqCst);
        });
    }
    assert_eq!(scheduler.state(), WakeState::Pending);

    tokio::time::sleep(std::time::Duration::from_millis(400)).await;

    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert_eq!(scheduler.state(), WakeState::Idle);
}

#[tokio::test]
async fn test_cancelled_wake_never_fires() {
    let scheduler = Scheduler::new("test");
    let fired = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&fired);
    let handle = scheduler.schedule_at(Utc::now() + Duration::milliseconds(50), move || async move {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    assert!(scheduler.cancel(&handle));
    assert!(!scheduler.cancel(&handle));

    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    assert_eq!(fired.load(Ordering::SeqCst), 0);
    assert_eq!(scheduler.state(), WakeState::Cancelled);
}
