mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use chrono::Duration;
use common::*;
use gleaner_core::{JobStatus, RunStatus, StopReason};
use gleaner_scheduler::is_due;

#[tokio::test]
async fn unauthenticated_source_fails_run_but_keeps_job_active() {
    let sources = Arc::new(FakeSources {
        authenticated: false,
        ..FakeSources::new()
    });
    let h = harness(sources, None, None);
    let job = h.service.create(daily_at_seven("digest")).unwrap();

    let run = h.service.run_now(&job.id).await.unwrap().unwrap();

    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.error_message.as_deref().unwrap().contains("authentication"));
    let stored = h.service.get(&job.id).unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Active);
    assert_eq!(stored.last_run, Some(t0()));

    let history = h.service.list_runs_for_job(&job.id, 10).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0], run);
}

#[tokio::test]
async fn successful_run_collects_and_exports() {
    let exporter = Arc::new(RecordingExporter::default());
    let h = harness(Arc::new(FakeSources::new()), Some(exporter.clone()), None);
    let mut new = daily_at_seven("digest");
    new.export_formats = vec!["JSON".into(), "json".into()];
    let job = h.service.create(new).unwrap();

    let run = h.service.run_now(&job.id).await.unwrap().unwrap();

    assert_eq!(run.status, RunStatus::Success);
    assert_eq!(run.items_collected, 3);
    assert_eq!(run.stop_reason, Some(StopReason::Completed));
    assert_eq!(run.exported_artifacts, ["/exports/digest_3.json"]);
    assert_eq!(*exporter.calls.lock().unwrap(), ["json"]);
    assert!(run.error_message.is_none());
    assert!(run.finished_at.is_some());
    assert!(!run.log_lines.is_empty());
}

#[tokio::test]
async fn export_failure_degrades_to_partial() {
    let exporter = Arc::new(RecordingExporter {
        failing: vec!["csv".into()],
        ..Default::default()
    });
    let h = harness(Arc::new(FakeSources::new()), Some(exporter), None);
    let mut new = daily_at_seven("digest");
    new.export_formats = vec!["csv".into(), "json".into()];
    let job = h.service.create(new).unwrap();

    let run = h.service.run_now(&job.id).await.unwrap().unwrap();

    assert_eq!(run.status, RunStatus::Partial);
    assert_eq!(run.exported_artifacts, ["/exports/digest_3.json"]);
    assert!(run.error_message.is_none());
    assert!(run.log_lines.iter().any(|l| l.message.contains("export csv failed")));
}

#[tokio::test]
async fn notifier_result_sets_notification_flag() {
    let notifier = Arc::new(FakeNotifier::answering(true));
    let h = harness(Arc::new(FakeSources::new()), None, Some(notifier.clone()));
    let mut new = daily_at_seven("digest");
    new.notification_targets = vec!["ops@example.com".into()];
    let job = h.service.create(new).unwrap();

    let run = h.service.run_now(&job.id).await.unwrap().unwrap();

    assert_eq!(run.status, RunStatus::Success);
    assert!(run.notification_sent);
    assert_eq!(notifier.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn declined_notification_is_partial() {
    let notifier = Arc::new(FakeNotifier::answering(false));
    let h = harness(Arc::new(FakeSources::new()), None, Some(notifier));
    let mut new = daily_at_seven("digest");
    new.notification_targets = vec!["ops@example.com".into()];
    let job = h.service.create(new).unwrap();

    let run = h.service.run_now(&job.id).await.unwrap().unwrap();

    assert_eq!(run.status, RunStatus::Partial);
    assert!(!run.notification_sent);
}

#[tokio::test]
async fn dry_run_never_notifies() {
    let notifier = Arc::new(FakeNotifier::answering(true));
    let h = harness(Arc::new(FakeSources::new()), None, Some(notifier.clone()));
    let mut new = daily_at_seven("digest");
    new.notification_targets = vec!["ops@example.com".into()];
    new.dry_run = true;
    let job = h.service.create(new).unwrap();

    let run = h.service.run_now(&job.id).await.unwrap().unwrap();

    assert_eq!(run.status, RunStatus::Success);
    assert!(!run.notification_sent);
    assert_eq!(notifier.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn block_signal_fails_run() {
    let sources = Arc::new(FakeSources {
        blocked: true,
        ..FakeSources::new()
    });
    let h = harness(sources, None, None);
    let job = h.service.create(daily_at_seven("digest")).unwrap();

    let run = h.service.run_now(&job.id).await.unwrap().unwrap();

    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.stop_reason, Some(StopReason::Blocked));
    assert!(run.error_message.unwrap().contains("blocked"));
}

#[tokio::test]
async fn once_job_completes_after_successful_run() {
    let h = harness(Arc::new(FakeSources::new()), None, None);
    let job = h.service.create(once_at("one-off", t0())).unwrap();

    let run = h.service.run_now(&job.id).await.unwrap().unwrap();

    assert_eq!(run.status, RunStatus::Success);
    let stored = h.service.get(&job.id).unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Completed);
    assert!(h.service.list_active().unwrap().is_empty());
}

#[tokio::test]
async fn failed_once_job_stays_active_but_never_refires() {
    let sources = Arc::new(FakeSources {
        authenticated: false,
        ..FakeSources::new()
    });
    let h = harness(sources, None, None);
    let job = h.service.create(once_at("one-off", t0())).unwrap();

    h.service.run_now(&job.id).await.unwrap().unwrap();

    let stored = h.service.get(&job.id).unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Active);
    assert!(!is_due(&stored.schedule, stored.last_run, t0() + Duration::days(30)));
}

#[tokio::test]
async fn manual_run_ignores_status() {
    let sources = Arc::new(FakeSources::new());
    let h = harness(sources.clone(), None, None);
    let job = h.service.create(daily_at_seven("digest")).unwrap();
    assert!(h.service.pause(&job.id).unwrap());

    let run = h.service.run_now(&job.id).await.unwrap().unwrap();

    assert_eq!(run.status, RunStatus::Success);
    assert_eq!(sources.opened.load(Ordering::SeqCst), 1);
    assert_eq!(
        h.service.get(&job.id).unwrap().unwrap().status,
        JobStatus::Paused
    );
}

#[tokio::test]
async fn manual_run_refuses_overlap() {
    let h = harness(Arc::new(FakeSources::new()), None, None);
    let job = h.service.create(daily_at_seven("digest")).unwrap();
    let _held = h.runner.running().try_acquire(&job.id).unwrap();

    let err = h.service.run_now(&job.id).await.unwrap_err();

    assert!(matches!(
        err,
        gleaner_scheduler::SchedulerError::AlreadyRunning { .. }
    ));
    assert!(h.service.list_all_runs(10).unwrap().is_empty());
}

#[tokio::test]
async fn manual_run_of_unknown_job_is_none() {
    let h = harness(Arc::new(FakeSources::new()), None, None);
    let missing = gleaner_core::JobId::from("nope");
    assert!(h.service.run_now(&missing).await.unwrap().is_none());
}

#[tokio::test]
async fn run_uses_clock_for_timestamps() {
    let h = harness(Arc::new(FakeSources::new()), None, None);
    let job = h.service.create(daily_at_seven("digest")).unwrap();
    h.clock.advance(Duration::hours(2));

    let run = h.service.run_now(&job.id).await.unwrap().unwrap();

    assert_eq!(run.started_at, t0() + Duration::hours(2));
    assert_eq!(
        h.ledger.get_job(&job.id).unwrap().unwrap().last_run,
        Some(t0() + Duration::hours(2))
    );
}

#[tokio::test]
async fn transient_fetch_error_alone_is_partial() {
    let sources = Arc::new(FakeSources {
        transient_page: Some(0),
        ..FakeSources::new()
    });
    let h = harness(sources, None, None);
    let job = h.service.create(daily_at_seven("digest")).unwrap();

    let run = h.service.run_now(&job.id).await.unwrap().unwrap();

    assert_eq!(run.status, RunStatus::Partial);
    assert_eq!(run.stop_reason, Some(StopReason::Completed));
    assert_eq!(run.items_collected, 2);
    assert!(run.error_message.is_none());
    assert!(run
        .log_lines
        .iter()
        .any(|l| l.message.contains("soft error") && l.message.contains("feed hiccup")));
}

#[tokio::test]
async fn manual_run_survives_a_panicking_source() {
    let sources = Arc::new(FakeSources {
        panic_on_open: true,
        ..FakeSources::new()
    });
    let h = harness(sources, None, None);
    let job = h.service.create(daily_at_seven("digest")).unwrap();

    let run = h.service.run_now(&job.id).await.unwrap().unwrap();

    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.error_message.as_deref().unwrap().starts_with("execution panicked"));
    assert_eq!(h.service.list_runs_for_job(&job.id, 10).unwrap()[0], run);
    assert!(!h.runner.running().is_running(&job.id));
}
