//! Service-level tests for admission, allocation, cancellation, queries and
//! event state actions, run against the in-memory collaborators.

#![allow(clippy::expect_used, clippy::unwrap_used)] // Test code can use unwrap/expect

use rsvp_core::environment::Clock;
use rsvp_core::lifecycle::EventStateAction;
use rsvp_core::{
    ConflictReason, Decision, EventId, EventState, RegistrationError, RequestId, RequestStatus,
    UserId,
};
use rsvp_testing::{EventBuilder, RegistrationHarness, init_test_tracing};

const EVENT: EventId = EventId::new(1);
const INITIATOR: UserId = UserId::new(1);

fn harness_for(builder: EventBuilder) -> RegistrationHarness {
    init_test_tracing();
    RegistrationHarness::with_events([builder.build()])
}

fn moderated(limit: u32) -> RegistrationHarness {
    harness_for(EventBuilder::new(1).limit(limit).moderated(true))
}

// ============================================================================
// Admission
// ============================================================================

#[tokio::test]
async fn moderated_event_admits_as_pending() {
    let harness = moderated(5);

    let request = harness.service.submit(UserId::new(2), EVENT).await.unwrap();

    assert_eq!(request.status, RequestStatus::Pending);
    assert_eq!(request.event_id, EVENT);
    assert_eq!(request.requester_id, UserId::new(2));
    assert_eq!(request.created, harness.clock.now());
}

#[tokio::test]
async fn unmoderated_event_auto_confirms() {
    let harness = harness_for(EventBuilder::new(1).limit(5).moderated(false));

    let request = harness.service.submit(UserId::new(2), EVENT).await.unwrap();

    assert_eq!(request.status, RequestStatus::Confirmed);
    assert_eq!(harness.confirmed_count(EVENT).await, 1);
}

#[tokio::test]
async fn unlimited_event_auto_confirms_even_when_moderated() {
    let harness = moderated(0);

    for requester in 2..12 {
        let request = harness
            .service
            .submit(UserId::new(requester), EVENT)
            .await
            .unwrap();
        assert_eq!(request.status, RequestStatus::Confirmed);
    }
    assert_eq!(harness.confirmed_count(EVENT).await, 10);
}

#[tokio::test]
async fn submit_to_missing_event_is_not_found() {
    let harness = moderated(5);

    let result = harness.service.submit(UserId::new(2), EventId::new(99)).await;

    assert!(matches!(result, Err(RegistrationError::NotFound(_))));
}

#[tokio::test]
async fn submit_to_unpublished_event_conflicts() {
    let harness = harness_for(EventBuilder::new(1).limit(5).state(EventState::Pending));

    let result = harness.service.submit(UserId::new(2), EVENT).await;

    assert_eq!(result, Err(ConflictReason::EventNotPublished.into()));
    assert!(harness.ledger.all().await.is_empty());
}

#[tokio::test]
async fn initiator_cannot_join_own_event() {
    let harness = moderated(5);

    let result = harness.service.submit(INITIATOR, EVENT).await;

    assert_eq!(result, Err(ConflictReason::InitiatorOwnEvent.into()));
}

#[tokio::test]
async fn no_double_admission() {
    let harness = moderated(5);
    harness.service.submit(UserId::new(2), EVENT).await.unwrap();

    let second = harness.service.submit(UserId::new(2), EVENT).await;

    assert_eq!(second, Err(ConflictReason::DuplicateRequest.into()));
    assert_eq!(harness.ledger.all().await.len(), 1);
}

#[tokio::test]
async fn rejected_requester_cannot_request_again() {
    let harness = moderated(5);
    harness.seed(EVENT, 2, RequestStatus::Rejected).await;

    let result = harness.service.submit(UserId::new(2), EVENT).await;

    assert_eq!(result, Err(ConflictReason::DuplicateRequest.into()));
}

#[tokio::test]
async fn canceled_requester_may_request_again() {
    let harness = moderated(5);
    let first = harness.service.submit(UserId::new(2), EVENT).await.unwrap();
    harness.service.cancel(UserId::new(2), first.id).await.unwrap();

    let second = harness.service.submit(UserId::new(2), EVENT).await.unwrap();

    assert_ne!(first.id, second.id);
    assert_eq!(second.status, RequestStatus::Pending);
}

#[tokio::test]
async fn full_event_refuses_new_requests() {
    let harness = moderated(2);
    harness.seed(EVENT, 2, RequestStatus::Confirmed).await;
    harness.seed(EVENT, 3, RequestStatus::Confirmed).await;

    let result = harness.service.submit(UserId::new(4), EVENT).await;

    assert_eq!(result, Err(ConflictReason::LimitReached.into()));
}

#[tokio::test]
async fn pending_requests_do_not_take_capacity_at_admission() {
    let harness = moderated(1);
    harness.service.submit(UserId::new(2), EVENT).await.unwrap();

    let request = harness.service.submit(UserId::new(3), EVENT).await.unwrap();

    assert_eq!(request.status, RequestStatus::Pending);
}

// ============================================================================
// Allocation
// ============================================================================

#[tokio::test]
async fn confirm_within_capacity() {
    let harness = moderated(3);
    let ids = harness.seed_pending(EVENT, [2, 3]).await;

    let result = harness
        .service
        .resolve(INITIATOR, EVENT, ids.clone(), Decision::Confirm)
        .await
        .unwrap();

    assert_eq!(
        result.confirmed.iter().map(|r| r.id).collect::<Vec<_>>(),
        ids
    );
    assert!(result.rejected.is_empty());
    assert!(
        result
            .confirmed
            .iter()
            .all(|r| r.status == RequestStatus::Confirmed)
    );
    assert_eq!(harness.confirmed_count(EVENT).await, 2);
}

#[tokio::test]
async fn reject_batch_ignores_capacity() {
    let harness = moderated(1);
    harness.seed(EVENT, 9, RequestStatus::Confirmed).await;
    let ids = harness.seed_pending(EVENT, [2, 3]).await;

    let result = harness
        .service
        .resolve(INITIATOR, EVENT, ids.clone(), Decision::Reject)
        .await
        .unwrap();

    assert!(result.confirmed.is_empty());
    assert_eq!(result.rejected.len(), 2);
    for id in ids {
        assert_eq!(harness.status_of(id).await, Some(RequestStatus::Rejected));
    }
}

#[tokio::test]
async fn cascade_rejects_every_other_pending_request() {
    let harness = moderated(2);
    harness.seed(EVENT, 9, RequestStatus::Confirmed).await;
    let ids = harness.seed_pending(EVENT, [2, 3, 4]).await;
    let (r1, r2, r3) = (ids[0], ids[1], ids[2]);

    let result = harness
        .service
        .resolve(INITIATOR, EVENT, vec![r1], Decision::Confirm)
        .await
        .unwrap();

    assert_eq!(result.confirmed.iter().map(|r| r.id).collect::<Vec<_>>(), vec![r1]);
    let mut rejected: Vec<RequestId> = result.rejected.iter().map(|r| r.id).collect();
    rejected.sort();
    assert_eq!(rejected, vec![r2, r3]);

    assert_eq!(harness.status_of(r1).await, Some(RequestStatus::Confirmed));
    assert_eq!(harness.status_of(r2).await, Some(RequestStatus::Rejected));
    assert_eq!(harness.status_of(r3).await, Some(RequestStatus::Rejected));
    assert_eq!(harness.confirmed_count(EVENT).await, 2);
}

#[tokio::test]
async fn cascade_leaves_other_events_alone() {
    init_test_tracing();
    let harness = RegistrationHarness::with_events([
        EventBuilder::new(1).limit(1).build(),
        EventBuilder::new(2).limit(1).build(),
    ]);
    let ids = harness.seed_pending(EVENT, [2, 3]).await;
    let other = harness.seed_pending(EventId::new(2), [4]).await;

    harness
        .service
        .resolve(INITIATOR, EVENT, vec![ids[0]], Decision::Confirm)
        .await
        .unwrap();

    assert_eq!(harness.status_of(ids[1]).await, Some(RequestStatus::Rejected));
    assert_eq!(harness.status_of(other[0]).await, Some(RequestStatus::Pending));
}

#[tokio::test]
async fn caller_order_breaks_ties() {
    let harness = moderated(1);
    let ids = harness.seed_pending(EVENT, [2, 3, 4]).await;
    let (r1, r2, r3) = (ids[0], ids[1], ids[2]);

    let result = harness
        .service
        .resolve(INITIATOR, EVENT, vec![r3, r1, r2], Decision::Confirm)
        .await
        .unwrap();

    assert_eq!(result.confirmed.iter().map(|r| r.id).collect::<Vec<_>>(), vec![r3]);
    assert_eq!(
        result.rejected.iter().map(|r| r.id).collect::<Vec<_>>(),
        vec![r1, r2]
    );
}

#[tokio::test]
async fn batch_with_non_pending_member_changes_nothing() {
    let harness = moderated(5);
    let pending = harness.seed_pending(EVENT, [2, 3]).await;
    let rejected = harness.seed(EVENT, 4, RequestStatus::Rejected).await;
    let before = harness.ledger.all().await;

    let result = harness
        .service
        .resolve(
            INITIATOR,
            EVENT,
            vec![pending[0], rejected.id, pending[1]],
            Decision::Confirm,
        )
        .await;

    assert_eq!(
        result,
        Err(ConflictReason::RequestNotPending(rejected.id, RequestStatus::Rejected).into())
    );
    assert_eq!(harness.ledger.all().await, before);
}

#[tokio::test]
async fn confirm_on_full_event_conflicts() {
    let harness = moderated(1);
    harness.seed(EVENT, 9, RequestStatus::Confirmed).await;
    let ids = harness.seed_pending(EVENT, [2]).await;

    let result = harness
        .service
        .resolve(INITIATOR, EVENT, ids.clone(), Decision::Confirm)
        .await;

    assert_eq!(result, Err(ConflictReason::LimitReached.into()));
    assert_eq!(harness.status_of(ids[0]).await, Some(RequestStatus::Pending));
}

#[tokio::test]
async fn unmoderated_event_cannot_be_resolved() {
    let harness = harness_for(EventBuilder::new(1).limit(5).moderated(false));
    let request = harness.service.submit(UserId::new(2), EVENT).await.unwrap();

    let result = harness
        .service
        .resolve(INITIATOR, EVENT, vec![request.id], Decision::Confirm)
        .await;

    assert_eq!(result, Err(ConflictReason::ModerationNotApplicable.into()));
}

#[tokio::test]
async fn unlimited_event_cannot_be_resolved() {
    let harness = moderated(0);
    let ids = harness.seed_pending(EVENT, [2]).await;

    let result = harness
        .service
        .resolve(INITIATOR, EVENT, ids, Decision::Reject)
        .await;

    assert_eq!(result, Err(ConflictReason::ModerationNotApplicable.into()));
}

#[tokio::test]
async fn only_the_initiator_may_resolve() {
    let harness = moderated(5);
    let ids = harness.seed_pending(EVENT, [2]).await;

    let result = harness
        .service
        .resolve(UserId::new(7), EVENT, ids, Decision::Confirm)
        .await;

    assert!(matches!(result, Err(RegistrationError::NotFound(_))));
}

#[tokio::test]
async fn unknown_or_foreign_request_ids_are_not_found() {
    init_test_tracing();
    let harness = RegistrationHarness::with_events([
        EventBuilder::new(1).limit(5).build(),
        EventBuilder::new(2).limit(5).build(),
    ]);
    let ours = harness.seed_pending(EVENT, [2]).await;
    let foreign = harness.seed_pending(EventId::new(2), [3]).await;

    let none_match = harness
        .service
        .resolve(INITIATOR, EVENT, foreign.clone(), Decision::Confirm)
        .await;
    assert!(matches!(none_match, Err(RegistrationError::NotFound(_))));

    let partial = harness
        .service
        .resolve(
            INITIATOR,
            EVENT,
            vec![ours[0], RequestId::new(404)],
            Decision::Confirm,
        )
        .await;
    assert!(matches!(partial, Err(RegistrationError::NotFound(_))));
    assert_eq!(harness.status_of(ours[0]).await, Some(RequestStatus::Pending));
}

#[tokio::test]
async fn malformed_batches_are_validation_errors() {
    let harness = moderated(5);
    let ids = harness.seed_pending(EVENT, [2]).await;

    let empty = harness
        .service
        .resolve(INITIATOR, EVENT, Vec::new(), Decision::Confirm)
        .await;
    assert!(matches!(empty, Err(RegistrationError::Validation(_))));

    let repeated = harness
        .service
        .resolve(INITIATOR, EVENT, vec![ids[0], ids[0]], Decision::Confirm)
        .await;
    assert!(matches!(repeated, Err(RegistrationError::Validation(_))));
}

#[tokio::test]
async fn failed_commit_surfaces_storage_error_and_writes_nothing() {
    let harness = moderated(2);
    let ids = harness.seed_pending(EVENT, [2, 3]).await;
    harness.ledger.fail_commits(true);

    let result = harness
        .service
        .resolve(INITIATOR, EVENT, ids.clone(), Decision::Confirm)
        .await;

    assert!(matches!(result, Err(RegistrationError::Storage(_))));
    for id in ids {
        assert_eq!(harness.status_of(id).await, Some(RequestStatus::Pending));
    }
}

// ============================================================================
// Cancellation
// ============================================================================

#[tokio::test]
async fn cancellation_frees_capacity() {
    let harness = harness_for(EventBuilder::new(1).limit(1).moderated(false));
    let first = harness.service.submit(UserId::new(2), EVENT).await.unwrap();
    assert_eq!(
        harness.service.submit(UserId::new(3), EVENT).await,
        Err(ConflictReason::LimitReached.into())
    );

    let canceled = harness.service.cancel(UserId::new(2), first.id).await.unwrap();
    assert_eq!(canceled.status, RequestStatus::Canceled);

    let replacement = harness.service.submit(UserId::new(3), EVENT).await.unwrap();
    assert_eq!(replacement.status, RequestStatus::Confirmed);
    assert_eq!(harness.confirmed_count(EVENT).await, 1);
}

#[tokio::test]
async fn cancel_works_from_any_status_and_is_idempotent() {
    let harness = moderated(5);
    let rejected = harness.seed(EVENT, 2, RequestStatus::Rejected).await;

    let once = harness.service.cancel(UserId::new(2), rejected.id).await.unwrap();
    let twice = harness.service.cancel(UserId::new(2), rejected.id).await.unwrap();

    assert_eq!(once.status, RequestStatus::Canceled);
    assert_eq!(once, twice);
}

#[tokio::test]
async fn cancel_requires_ownership() {
    let harness = moderated(5);
    let request = harness.service.submit(UserId::new(2), EVENT).await.unwrap();

    let foreign = harness.service.cancel(UserId::new(3), request.id).await;
    let missing = harness.service.cancel(UserId::new(2), RequestId::new(404)).await;

    assert!(matches!(foreign, Err(RegistrationError::NotFound(_))));
    assert!(matches!(missing, Err(RegistrationError::NotFound(_))));
    assert_eq!(harness.status_of(request.id).await, Some(RequestStatus::Pending));
}

#[tokio::test]
async fn canceled_request_cannot_be_resolved() {
    let harness = moderated(5);
    let request = harness.service.submit(UserId::new(2), EVENT).await.unwrap();
    harness.service.cancel(UserId::new(2), request.id).await.unwrap();

    let result = harness
        .service
        .resolve(INITIATOR, EVENT, vec![request.id], Decision::Confirm)
        .await;

    assert_eq!(
        result,
        Err(ConflictReason::RequestNotPending(request.id, RequestStatus::Canceled).into())
    );
}

// ============================================================================
// Queries
// ============================================================================

#[tokio::test]
async fn listing_requests() {
    init_test_tracing();
    let harness = RegistrationHarness::with_events([
        EventBuilder::new(1).limit(5).build(),
        EventBuilder::new(2).limit(5).initiator(5).moderated(false).build(),
    ]);
    let a = harness.service.submit(UserId::new(2), EVENT).await.unwrap();
    let b = harness.service.submit(UserId::new(2), EventId::new(2)).await.unwrap();
    let c = harness.service.submit(UserId::new(3), EVENT).await.unwrap();

    let mine = harness.service.list_user_requests(UserId::new(2)).await.unwrap();
    assert_eq!(mine, vec![a.clone(), b]);

    let event_requests = harness
        .service
        .list_event_requests(INITIATOR, EVENT)
        .await
        .unwrap();
    assert_eq!(event_requests, vec![a, c]);

    let not_theirs = harness.service.list_event_requests(UserId::new(5), EVENT).await;
    assert!(matches!(not_theirs, Err(RegistrationError::NotFound(_))));
}

#[tokio::test]
async fn confirmed_counts_per_event() {
    init_test_tracing();
    let harness = RegistrationHarness::with_events([
        EventBuilder::new(1).limit(5).moderated(false).build(),
        EventBuilder::new(2).limit(5).build(),
    ]);
    harness.service.submit(UserId::new(2), EVENT).await.unwrap();
    harness.service.submit(UserId::new(3), EVENT).await.unwrap();
    harness.service.submit(UserId::new(2), EventId::new(2)).await.unwrap();

    let counts = harness
        .service
        .confirmed_counts(vec![EVENT, EventId::new(2), EventId::new(3)])
        .await
        .unwrap();

    assert_eq!(counts.get(&EVENT), Some(&2));
    assert_eq!(counts.get(&EventId::new(2)), None);
    assert!(harness.service.confirmed_counts(Vec::new()).await.unwrap().is_empty());
}

// ============================================================================
// Event state actions
// ============================================================================

#[tokio::test]
async fn admin_publishes_event_and_it_opens_for_requests() {
    let harness = harness_for(EventBuilder::new(1).limit(5).state(EventState::Pending));

    let published = harness
        .service
        .apply_admin_action(EVENT, EventStateAction::PublishEvent)
        .await
        .unwrap();

    assert_eq!(published.state, EventState::Published);
    assert_eq!(published.published_on, Some(harness.clock.now()));
    assert_eq!(harness.directory.get(EVENT).await, Some(published));
    assert!(harness.service.submit(UserId::new(2), EVENT).await.is_ok());
}

#[tokio::test]
async fn admin_conflicts() {
    let harness = moderated(5);

    assert_eq!(
        harness
            .service
            .apply_admin_action(EVENT, EventStateAction::PublishEvent)
            .await,
        Err(ConflictReason::AlreadyPublished.into())
    );
    assert_eq!(
        harness
            .service
            .apply_admin_action(EVENT, EventStateAction::RejectEvent)
            .await,
        Err(ConflictReason::CannotRejectPublished.into())
    );
    assert!(matches!(
        harness
            .service
            .apply_admin_action(EventId::new(99), EventStateAction::PublishEvent)
            .await,
        Err(RegistrationError::NotFound(_))
    ));
}

#[tokio::test]
async fn initiator_actions_follow_ownership_and_state() {
    let harness = harness_for(EventBuilder::new(1).limit(5).state(EventState::Pending));

    let withdrawn = harness
        .service
        .apply_initiator_action(INITIATOR, EVENT, EventStateAction::CancelReview)
        .await
        .unwrap();
    assert_eq!(withdrawn.state, EventState::Canceled);

    let wrong_actor = harness
        .service
        .apply_initiator_action(INITIATOR, EVENT, EventStateAction::PublishEvent)
        .await;
    assert!(matches!(wrong_actor, Err(RegistrationError::Validation(_))));

    let stranger = harness
        .service
        .apply_initiator_action(UserId::new(9), EVENT, EventStateAction::SendToReview)
        .await;
    assert!(matches!(stranger, Err(RegistrationError::NotFound(_))));

    let back = harness
        .service
        .apply_initiator_action(INITIATOR, EVENT, EventStateAction::SendToReview)
        .await
        .unwrap();
    assert_eq!(back.state, EventState::Pending);

    harness
        .service
        .apply_admin_action(EVENT, EventStateAction::PublishEvent)
        .await
        .unwrap();
    assert_eq!(
        harness
            .service
            .apply_initiator_action(INITIATOR, EVENT, EventStateAction::CancelReview)
            .await,
        Err(ConflictReason::PublishedEventLocked.into())
    );
}
