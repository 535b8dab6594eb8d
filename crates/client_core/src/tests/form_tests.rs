use super::*;
use crate::{
    orchestrator::Delivery,
    test_support::{
        orchestrator, settle_background, RecordingSheet, ScriptedStore, SheetOutcome,
        StoreOutcome,
    },
};
use std::time::Duration;
use tokio::time::Instant;

fn filled_form() -> RegistrationForm {
    let mut form = RegistrationForm::new();
    form.set_field(Field::Name, "A");
    form.set_field(Field::MobileNumber, "123");
    form.set_field(Field::Email, "a@x.com");
    form.set_field(Field::Locality, "L");
    form.set_field(Field::Pincode, "1");
    form
}

#[test]
fn toggling_keeps_selection_order_and_flags_empty_selection() {
    let mut form = filled_form();
    form.toggle_interest(Interest::ItMilan, true);
    form.toggle_interest(Interest::BalaBharathi, true);
    form.toggle_interest(Interest::ItMilan, true);

    assert_eq!(form.values().interests, ["it-milan", "bala-bharathi"]);
    assert!(form.is_selected(Interest::BalaBharathi));
    assert!(!form.interests_error());

    form.toggle_interest(Interest::ItMilan, false);
    form.toggle_interest(Interest::BalaBharathi, false);
    assert!(form.values().interests.is_empty());
    assert!(form.interests_error());

    form.toggle_interest(Interest::Yuva, true);
    assert!(!form.interests_error());
}

#[test]
fn missing_required_field_blocks_submission() {
    let mut form = filled_form();
    form.set_field(Field::Email, "   ");
    form.toggle_interest(Interest::Yuva, true);

    assert_eq!(form.begin_submit(), SubmitGate::MissingField(Field::Email));
    assert_eq!(form.state(), FormState::Idle);
    assert_eq!(form.message(), Some("Please fill in Email Address."));
}

#[test]
fn optional_fields_may_stay_blank() {
    let mut form = filled_form();
    form.toggle_interest(Interest::Yuva, true);

    assert!(!Field::Apartment.is_required());
    assert!(Field::Pincode.is_required());
    match form.begin_submit() {
        SubmitGate::Ready(record) => {
            assert_eq!(record.apartment, "");
            assert_eq!(record.age, "");
            assert_eq!(record.notes, "");
        }
        other => panic!("expected ready, got {other:?}"),
    }
    assert_eq!(form.state(), FormState::Submitting);
}

#[test]
fn second_submit_while_in_flight_is_busy() {
    let mut form = filled_form();
    form.toggle_interest(Interest::Yuva, true);

    assert!(matches!(form.begin_submit(), SubmitGate::Ready(_)));
    assert_eq!(form.begin_submit(), SubmitGate::Busy);
}

#[test]
fn verdict_outside_submission_is_ignored() {
    let mut form = filled_form();
    form.finish_submit(&Verdict::Success {
        delivery: Delivery::Confirmed,
    });

    assert_eq!(form.state(), FormState::Idle);
    assert_eq!(form.field(Field::Name), "A");
}

#[tokio::test(start_paused = true)]
async fn empty_interests_never_reach_either_sink() {
    let store = ScriptedStore::new(Duration::from_millis(50), StoreOutcome::Accept);
    let sheet = RecordingSheet::new(SheetOutcome::Accept);
    let mut form = filled_form();

    let state = form.submit(&orchestrator(&store, &sheet)).await;
    settle_background().await;

    assert_eq!(state, FormState::Idle);
    assert!(form.interests_error());
    assert_eq!(
        form.message(),
        Some("Please select at least one Area of Interest.")
    );
    assert_eq!(store.calls(), 0);
    assert_eq!(sheet.calls().await, 0);
}

#[tokio::test(start_paused = true)]
async fn success_clears_every_field() {
    let store = ScriptedStore::new(Duration::from_millis(50), StoreOutcome::Accept);
    let sheet = RecordingSheet::new(SheetOutcome::Accept);
    let mut form = filled_form();
    form.set_field(Field::Notes, "weekends only");
    form.toggle_interest(Interest::Yuva, true);

    let state = form.submit(&orchestrator(&store, &sheet)).await;

    assert_eq!(state, FormState::Success);
    assert_eq!(form.message(), Some(SUCCESS_MESSAGE));
    assert_eq!(form.values(), &RegistrationRecord::default());
    assert!(!form.interests_error());

    form.reset_after_success();
    assert_eq!(form.state(), FormState::Idle);
    assert_eq!(form.message(), None);
}

#[tokio::test(start_paused = true)]
async fn failure_keeps_values_for_retry() {
    let store = ScriptedStore::new(Duration::from_millis(50), StoreOutcome::PermissionDenied);
    let sheet = RecordingSheet::new(SheetOutcome::Accept);
    let mut form = filled_form();
    form.toggle_interest(Interest::SevikaSamithi, true);
    let before = form.values().clone();

    let state = form.submit(&orchestrator(&store, &sheet)).await;

    assert_eq!(state, FormState::Failure);
    assert_eq!(form.message(), Some(FAILURE_MESSAGE));
    assert_eq!(form.values(), &before);

    // Failure only resets through a new submission.
    form.reset_after_success();
    assert_eq!(form.state(), FormState::Failure);
    assert!(matches!(form.begin_submit(), SubmitGate::Ready(_)));
}

#[tokio::test(start_paused = true)]
async fn slow_store_resets_form_after_timeout() {
    let store = ScriptedStore::new(Duration::from_millis(6000), StoreOutcome::Accept);
    let sheet = RecordingSheet::new(SheetOutcome::Reject);
    let mut form = filled_form();
    form.toggle_interest(Interest::KishoraBharathi, true);
    let started = Instant::now();

    let state = form.submit(&orchestrator(&store, &sheet)).await;

    assert_eq!(state, FormState::Success);
    assert!(started.elapsed() < Duration::from_millis(4100));
    assert_eq!(form.values(), &RegistrationRecord::default());
}
