//! Job status state machine tests

use ccw_rif::status::{JobStage, JobStatusEvent, JobStatusListener, JobStatusReporter};
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

/// Clock that advances one second per reading
fn ticking_clock() -> impl Fn() -> DateTime<Utc> + Send + Sync + 'static {
    let start = Utc.with_ymd_and_hms(2024, 1, 15, 6, 0, 0).unwrap();
    let ticks = AtomicI64::new(0);
    move || start + Duration::seconds(ticks.fetch_add(1, Ordering::SeqCst))
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<JobStatusEvent>>,
}

impl JobStatusListener for Recorder {
    fn job_status_changed(&self, event: &JobStatusEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

#[test]
fn test_full_cycle_keeps_invariants() {
    let recorder = Arc::new(Recorder::default());
    let reporter = JobStatusReporter::new()
        .with_clock(ticking_clock())
        .with_listener(recorder.clone());

    let steps = [
        (JobStage::NothingToDo, None),
        (JobStage::CheckingBucketForManifest, None),
        (JobStage::AwaitingManifestDataFiles, Some("m1")),
        (JobStage::ProcessingManifestDataFiles, Some("m1")),
        (JobStage::CompletedManifest, Some("m1")),
        (JobStage::CheckingBucketForManifest, None),
        (JobStage::NothingToDo, None),
    ];
    let mut events = Vec::new();
    for (stage, key) in steps {
        let event = reporter.report(stage, key).unwrap();
        event.validate().unwrap();
        assert_eq!(event.job_stage, stage);
        assert_eq!(event.current_manifest_key.as_deref(), key);
        events.push(event);
    }

    for event in &events[..4] {
        assert!(event.last_completed_manifest_key.is_none());
        assert!(event.last_completed_timestamp.is_none());
    }
    let completed_at = events[4].current_timestamp;
    for event in &events[4..] {
        assert_eq!(event.last_completed_manifest_key.as_deref(), Some("m1"));
        assert_eq!(event.last_completed_timestamp, Some(completed_at));
    }
    assert_eq!(events[0].nothing_to_do_since, Some(events[0].current_timestamp));
    assert_eq!(events[6].nothing_to_do_since, Some(events[6].current_timestamp));
    assert!(events[1..6].iter().all(|e| e.nothing_to_do_since.is_none()));

    assert_eq!(*recorder.events.lock().unwrap(), events);
    assert_eq!(reporter.current(), events.last().cloned());
}

#[test]
fn test_nothing_to_do_streak_keeps_first_timestamp() {
    let reporter = JobStatusReporter::new().with_clock(ticking_clock());

    let first = reporter.report(JobStage::NothingToDo, None).unwrap();
    let second = reporter.report(JobStage::NothingToDo, None).unwrap();
    let third = reporter.report(JobStage::NothingToDo, None).unwrap();

    assert!(third.current_timestamp > first.current_timestamp);
    assert_eq!(second.nothing_to_do_since, first.nothing_to_do_since);
    assert_eq!(third.nothing_to_do_since, first.nothing_to_do_since);

    reporter.report(JobStage::CheckingBucketForManifest, None).unwrap();
    let fresh = reporter.report(JobStage::NothingToDo, None).unwrap();
    assert_eq!(fresh.nothing_to_do_since, Some(fresh.current_timestamp));
}

#[test]
fn test_rejected_report_leaves_state_unchanged() {
    let reporter = JobStatusReporter::new();
    let checking = reporter.report(JobStage::CheckingBucketForManifest, None).unwrap();

    assert!(reporter.report(JobStage::CompletedManifest, Some("m1")).is_err());
    assert!(reporter.report(JobStage::AwaitingManifestDataFiles, None).is_err());
    assert_eq!(reporter.current(), Some(checking));
}

#[test]
fn test_failed_manifest_returns_to_checking() {
    let reporter = JobStatusReporter::new();
    reporter.report(JobStage::CheckingBucketForManifest, None).unwrap();
    reporter
        .report(JobStage::ProcessingManifestDataFiles, Some("m1"))
        .unwrap();

    let next = reporter.report(JobStage::CheckingBucketForManifest, None).unwrap();
    assert!(next.last_completed_manifest_key.is_none());
}

#[tokio::test]
async fn test_subscribers_see_latest_event() {
    let reporter = JobStatusReporter::new();
    let mut receiver = reporter.subscribe();
    assert!(receiver.borrow().is_none());

    reporter.report(JobStage::CheckingBucketForManifest, None).unwrap();
    receiver.changed().await.unwrap();
    assert_eq!(
        receiver.borrow_and_update().as_ref().map(|e| e.job_stage),
        Some(JobStage::CheckingBucketForManifest)
    );
}
