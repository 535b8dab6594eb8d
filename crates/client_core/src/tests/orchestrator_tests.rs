use super::*;
use crate::test_support::{
    orchestrator, scenario_record, settle_background, RecordingSheet, ScriptedStore, SheetOutcome,
    StoreOutcome,
};
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn quick_store_acknowledgement_is_confirmed_success() {
    let store = ScriptedStore::new(Duration::from_millis(50), StoreOutcome::Accept);
    let sheet = RecordingSheet::new(SheetOutcome::Accept);

    let verdict = orchestrator(&store, &sheet).submit(scenario_record()).await;

    assert_eq!(
        verdict,
        Verdict::Success {
            delivery: Delivery::Confirmed
        }
    );
    assert_eq!(store.calls(), 1);
    assert_eq!(
        store.collections.lock().await.as_slice(),
        ["registrations".to_string()]
    );
    settle_background().await;
    assert_eq!(sheet.rows.lock().await.as_slice(), [scenario_record()]);
}

#[tokio::test(start_paused = true)]
async fn store_error_before_timeout_is_failure() {
    let store = ScriptedStore::new(Duration::from_millis(50), StoreOutcome::PermissionDenied);
    let sheet = RecordingSheet::new(SheetOutcome::Accept);

    let verdict = orchestrator(&store, &sheet).submit(scenario_record()).await;

    match verdict {
        Verdict::Failure { reason } => assert!(reason.contains("insufficient permissions")),
        other => panic!("expected failure, got {other:?}"),
    }
    settle_background().await;
    assert_eq!(sheet.calls().await, 1);
}

#[tokio::test(start_paused = true)]
async fn slow_store_yields_optimistic_success_at_timeout() {
    let store = ScriptedStore::new(Duration::from_millis(6000), StoreOutcome::Accept);
    let sheet = RecordingSheet::new(SheetOutcome::Accept);
    let started = Instant::now();

    let verdict = orchestrator(&store, &sheet).submit(scenario_record()).await;

    let waited = started.elapsed();
    assert_eq!(
        verdict,
        Verdict::Success {
            delivery: Delivery::Pending
        }
    );
    assert!(waited >= DEFAULT_STORE_TIMEOUT);
    assert!(waited < DEFAULT_STORE_TIMEOUT + Duration::from_millis(100));
    assert!(!store.has_settled());

    // The write was not cancelled.
    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert!(store.has_settled());
    assert_eq!(store.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn late_store_failure_is_still_success_for_the_caller() {
    let store = ScriptedStore::new(Duration::from_millis(6000), StoreOutcome::PermissionDenied);
    let sheet = RecordingSheet::new(SheetOutcome::Reject);

    let verdict = orchestrator(&store, &sheet).submit(scenario_record()).await;

    assert!(verdict.is_success());
    tokio::time::sleep(Duration::from_millis(3000)).await;
    assert!(store.has_settled());
    assert_eq!(sheet.calls().await, 1);
}

#[tokio::test(start_paused = true)]
async fn spreadsheet_failure_never_changes_the_verdict() {
    let store = ScriptedStore::new(Duration::from_millis(50), StoreOutcome::Accept);
    let sheet = RecordingSheet::new(SheetOutcome::Reject);

    let verdict = orchestrator(&store, &sheet).submit(scenario_record()).await;

    assert!(verdict.is_success());
    settle_background().await;
    assert_eq!(sheet.calls().await, 1);
}

#[tokio::test(start_paused = true)]
async fn hanging_spreadsheet_does_not_block_submission() {
    let store = ScriptedStore::new(Duration::from_millis(50), StoreOutcome::Accept);
    let sheet = RecordingSheet::new(SheetOutcome::Hang);
    let started = Instant::now();

    let verdict = orchestrator(&store, &sheet).submit(scenario_record()).await;

    assert!(verdict.is_success());
    assert!(started.elapsed() < Duration::from_millis(100));
    assert_eq!(sheet.calls().await, 1);
}

#[tokio::test(start_paused = true)]
async fn spreadsheet_is_invoked_once_per_submission() {
    let store = ScriptedStore::new(Duration::from_millis(10), StoreOutcome::Accept);
    let sheet = RecordingSheet::new(SheetOutcome::Accept);
    let orchestrator = orchestrator(&store, &sheet);

    orchestrator.submit(scenario_record()).await;
    orchestrator.submit(scenario_record()).await;
    settle_background().await;

    assert_eq!(store.calls(), 2);
    assert_eq!(sheet.calls().await, 2);
}

#[tokio::test(start_paused = true)]
async fn configurable_timeout_bounds_the_wait() {
    let store = ScriptedStore::new(Duration::from_millis(600), StoreOutcome::PermissionDenied);
    let sheet = RecordingSheet::new(SheetOutcome::Accept);
    let orchestrator =
        orchestrator(&store, &sheet).with_store_timeout(Duration::from_millis(500));
    assert_eq!(orchestrator.store_timeout(), Duration::from_millis(500));

    let verdict = orchestrator.submit(scenario_record()).await;

    assert_eq!(
        verdict,
        Verdict::Success {
            delivery: Delivery::Pending
        }
    );
}
