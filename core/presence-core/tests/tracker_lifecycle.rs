//! Integration coverage for event handling, persistence, restart, and reports.

use chrono::{DateTime, TimeZone, Utc};
use presence_core::{
    FixedClock, IdentityTracker, PresenceTracker, ReferenceZone, ReportOutcome, StateStore,
    StaticDirectory, Transition,
};
use presence_protocol::{PresenceEvent, PresenceStatus, ReportKind};
use tempfile::tempdir;

const ALICE: u64 = 1001;
const BOB: u64 = 1002;

fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 19, h, m, s).unwrap()
}

fn directory() -> StaticDirectory {
    StaticDirectory::new([("alice", ALICE), ("bob", BOB)])
}

fn start(state_path: &std::path::Path, names: &[&str]) -> PresenceTracker {
    PresenceTracker::new(
        StateStore::new(state_path),
        IdentityTracker::resolve_all(names.iter().copied(), &directory()),
        ReferenceZone::parse("+03:00").unwrap(),
        Box::new(FixedClock::new(at(0, 0, 0))),
    )
}

fn event(id: u64, status: PresenceStatus, at: DateTime<Utc>) -> PresenceEvent {
    PresenceEvent {
        identity_id: id,
        status,
        observed_at: Some(at.to_rfc3339()),
    }
}

#[test]
fn test_single_session_scenario() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("sessions.json");
    let tracker = start(&path, &["alice", "bob"]);

    tracker
        .handle_event(&event(ALICE, PresenceStatus::Online, at(9, 0, 0)))
        .unwrap();
    let closed = tracker
        .handle_event(&event(ALICE, PresenceStatus::Offline, at(9, 5, 30)))
        .unwrap();
    assert!(matches!(closed, Some(Transition::Closed { .. })));

    let state = StateStore::new(&path).load();
    let sessions = &state.sessions[&ALICE]["19.10.2026"];
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].start, at(9, 0, 0));
    assert_eq!(sessions[0].end, at(9, 5, 30));
    assert_eq!(sessions[0].duration, 330.0);

    let identity_report = tracker.report(Some("@alice")).unwrap();
    assert_eq!(identity_report.kind(), ReportKind::Identity);
    assert!(identity_report.text().contains("✅ Day total: 330 sec"));

    let aggregate = tracker.report(None).unwrap();
    assert_eq!(aggregate.kind(), ReportKind::Aggregate);
    assert!(aggregate.text().contains("👤 @alice: 330 sec"));
    assert!(aggregate.text().contains("👤 @bob: 0 sec"));
}

#[test]
fn test_missing_state_file_gives_no_data() {
    let temp = tempdir().unwrap();
    let tracker = start(&temp.path().join("absent.json"), &["alice"]);

    assert!(tracker.snapshot().sessions.is_empty());
    assert!(tracker.snapshot().history.is_empty());
    assert_eq!(tracker.report(None).unwrap(), ReportOutcome::NoData);
}

#[test]
fn test_unresolved_name_report_is_not_found() {
    let temp = tempdir().unwrap();
    let tracker = start(&temp.path().join("sessions.json"), &["alice", "carol"]);

    assert_eq!(tracker.tracked_count(), 1);
    let outcome = tracker.report(Some("carol")).unwrap();
    assert_eq!(outcome.kind(), ReportKind::NotFound);
}

#[test]
fn test_restart_inherits_sessions_but_not_open_period() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("sessions.json");

    {
        let tracker = start(&path, &["alice"]);
        tracker
            .handle_event(&event(ALICE, PresenceStatus::Online, at(9, 0, 0)))
            .unwrap();
        tracker
            .handle_event(&event(ALICE, PresenceStatus::Offline, at(9, 1, 0)))
            .unwrap();
        // left open when the process goes away
        tracker
            .handle_event(&event(ALICE, PresenceStatus::Online, at(10, 0, 0)))
            .unwrap();
        assert!(tracker.is_active(ALICE));
    }

    let tracker = start(&path, &["alice"]);
    assert!(!tracker.is_active(ALICE));
    assert_eq!(tracker.snapshot().session_count(ALICE), 1);
    // the unsaved online entry from the previous run is not on disk
    assert_eq!(tracker.snapshot().history.len(), 2);

    let ignored = tracker
        .handle_event(&event(ALICE, PresenceStatus::Offline, at(10, 30, 0)))
        .unwrap();
    assert_eq!(ignored, Some(Transition::Ignored));
    assert_eq!(tracker.snapshot().session_count(ALICE), 1);
}

#[test]
fn test_report_reflects_durable_state_only() {
    let temp = tempdir().unwrap();
    let tracker = start(&temp.path().join("sessions.json"), &["alice"]);

    tracker
        .handle_event(&event(ALICE, PresenceStatus::Online, at(9, 0, 0)))
        .unwrap();
    // the online entry is in memory but has not been persisted yet
    assert_eq!(tracker.report(None).unwrap(), ReportOutcome::NoData);
}

#[test]
fn test_events_for_other_identities_have_no_effect() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("sessions.json");
    let tracker = start(&path, &["alice"]);

    assert_eq!(
        tracker
            .handle_event(&event(BOB, PresenceStatus::Online, at(9, 0, 0)))
            .unwrap(),
        None
    );
    assert_eq!(
        tracker
            .handle_event(&event(BOB, PresenceStatus::Offline, at(9, 5, 0)))
            .unwrap(),
        None
    );
    assert!(tracker.snapshot().history.is_empty());
    assert!(!path.exists());
}

#[test]
fn test_many_sessions_same_day_stay_chronological() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("sessions.json");
    let tracker = start(&path, &["alice"]);

    for hour in [9, 11, 13] {
        tracker
            .handle_event(&event(ALICE, PresenceStatus::Online, at(hour, 0, 0)))
            .unwrap();
        tracker
            .handle_event(&event(ALICE, PresenceStatus::Offline, at(hour, 10, 0)))
            .unwrap();
    }

    let state = StateStore::new(&path).load();
    let starts: Vec<_> = state.sessions[&ALICE]["19.10.2026"]
        .iter()
        .map(|s| s.start)
        .collect();
    assert_eq!(starts, vec![at(9, 0, 0), at(11, 0, 0), at(13, 0, 0)]);

    let text = tracker.report(Some("alice")).unwrap().text();
    assert!(text.contains("3. 16:00:00 - 16:10:00 (600 sec)"));
    assert!(text.contains("✅ Day total: 1800 sec"));
}
