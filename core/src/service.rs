//! Registration service - the imperative shell around the pure policies.
//!
//! Every operation that reads the confirmed count and writes something that
//! depends on it follows the same shape:
//!
//! 1. Look up the event through the [`EventDirectory`]
//! 2. Open the event's unit of work with [`RequestLedger::begin`]
//! 3. Read the snapshot the policy needs
//! 4. Run [`admission`] or [`allocation`]
//! 5. Write, then commit
//!
//! Returning early with `?` drops the transaction, which discards anything
//! written through it.

use crate::admission::{self, AdmissionSnapshot};
use crate::allocation;
use crate::environment::Clock;
use crate::error::{RegistrationError, Result};
use crate::ledger::{EventDirectory, RequestLedger};
use crate::lifecycle::{self, Actor, EventStateAction};
use crate::types::{
    Decision, Event, EventId, EventState, NewParticipationRequest, ParticipationRequest,
    RequestId, RequestStatus, StatusUpdateResult, UserId,
};
use std::collections::HashMap;
use std::sync::Arc;

/// Entry point for participation request operations.
///
/// Cheap to clone; all collaborators are shared.
#[derive(Clone)]
pub struct RegistrationService {
    directory: Arc<dyn EventDirectory>,
    ledger: Arc<dyn RequestLedger>,
    clock: Arc<dyn Clock>,
}

impl RegistrationService {
    /// Creates a new `RegistrationService`
    #[must_use]
    pub fn new(
        directory: Arc<dyn EventDirectory>,
        ledger: Arc<dyn RequestLedger>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            directory,
            ledger,
            clock,
        }
    }

    /// Ask to join an event.
    ///
    /// The request starts `CONFIRMED` for unmoderated or unlimited events and
    /// `PENDING` otherwise.
    ///
    /// # Errors
    ///
    /// - [`RegistrationError::NotFound`] if the event does not exist
    /// - [`RegistrationError::Conflict`] for the first admission rule that fails
    /// - [`RegistrationError::Storage`] if the ledger fails
    pub async fn submit(
        &self,
        requester_id: UserId,
        event_id: EventId,
    ) -> Result<ParticipationRequest> {
        let result = self.try_submit(requester_id, event_id).await;
        record_outcome("submit", &result);
        result
    }

    async fn try_submit(
        &self,
        requester_id: UserId,
        event_id: EventId,
    ) -> Result<ParticipationRequest> {
        let event = self
            .directory
            .find_by_id(event_id)
            .await?
            .ok_or_else(|| RegistrationError::event_not_found(event_id))?;

        let mut tx = self.ledger.begin(event_id).await?;

        let snapshot = AdmissionSnapshot {
            already_requested: tx.exists_non_canceled(requester_id).await?,
            confirmed: tx.count_confirmed().await?,
        };
        let status = admission::admit(&event, requester_id, snapshot)?;

        let request = tx
            .insert(NewParticipationRequest {
                event_id,
                requester_id,
                created: self.clock.now(),
                status,
            })
            .await?;
        tx.commit().await?;

        metrics::counter!("registration.requests.submitted", "status" => status.as_str())
            .increment(1);
        tracing::info!(
            request_id = %request.id,
            event_id = %event_id,
            requester_id = %requester_id,
            status = %status,
            confirmed_before = snapshot.confirmed,
            "Participation request admitted"
        );

        Ok(request)
    }

    /// Confirm or reject a batch of pending requests for an organizer's event.
    ///
    /// Confirmations fill the remaining slots in `request_ids` order. If the
    /// batch fills the event, every other pending request is rejected too.
    /// Nothing is written unless the whole batch is valid.
    ///
    /// # Errors
    ///
    /// - [`RegistrationError::Validation`] for an empty or repeating batch
    /// - [`RegistrationError::NotFound`] if the event is not the initiator's,
    ///   or a request is missing
    /// - [`RegistrationError::Conflict`] if the event is not moderated, a
    ///   request is not pending, or the event is already full
    /// - [`RegistrationError::Storage`] if the ledger fails
    pub async fn resolve(
        &self,
        initiator_id: UserId,
        event_id: EventId,
        request_ids: Vec<RequestId>,
        decision: Decision,
    ) -> Result<StatusUpdateResult> {
        let result = self
            .try_resolve(initiator_id, event_id, request_ids, decision)
            .await;
        record_outcome("resolve", &result);
        result
    }

    async fn try_resolve(
        &self,
        initiator_id: UserId,
        event_id: EventId,
        request_ids: Vec<RequestId>,
        decision: Decision,
    ) -> Result<StatusUpdateResult> {
        allocation::validate_batch(&request_ids)?;

        let event = self
            .directory
            .find_by_id_and_initiator(event_id, initiator_id)
            .await?
            .ok_or_else(|| RegistrationError::event_not_found(event_id))?;
        allocation::ensure_moderated(&event)?;

        let mut tx = self.ledger.begin(event_id).await?;

        let found = tx.find_by_ids_and_event(request_ids.clone()).await?;
        let confirmed = tx.count_confirmed().await?;
        let mut allocation =
            allocation::allocate(&event, &request_ids, found, confirmed, decision)?;

        let cascaded = if allocation.capacity_exhausted() {
            let pending = tx.find_pending().await?;
            allocation.cascade(pending)
        } else {
            0
        };

        tx.save_all(allocation.changed()).await?;
        tx.commit().await?;

        let confirmed_now = allocation.confirmed().len();
        let rejected_now = allocation.rejected().len();
        metrics::counter!(
            "registration.requests.resolved",
            "status" => RequestStatus::Confirmed.as_str()
        )
        .increment(confirmed_now as u64);
        metrics::counter!(
            "registration.requests.resolved",
            "status" => RequestStatus::Rejected.as_str()
        )
        .increment(rejected_now as u64);
        if cascaded > 0 {
            metrics::counter!("registration.requests.cascade_rejected").increment(cascaded as u64);
        }
        tracing::info!(
            event_id = %event_id,
            decision = %decision,
            batch = request_ids.len(),
            confirmed = confirmed_now,
            rejected = rejected_now,
            cascaded,
            "Participation requests resolved"
        );

        Ok(allocation.into_result())
    }

    /// Withdraw a request.
    ///
    /// Works from any status; canceling a confirmed request frees its slot.
    /// Canceling twice returns the canceled request unchanged.
    ///
    /// # Errors
    ///
    /// - [`RegistrationError::NotFound`] if the request does not exist or
    ///   belongs to someone else
    /// - [`RegistrationError::Storage`] if the ledger fails
    pub async fn cancel(
        &self,
        requester_id: UserId,
        request_id: RequestId,
    ) -> Result<ParticipationRequest> {
        let result = self.try_cancel(requester_id, request_id).await;
        record_outcome("cancel", &result);
        result
    }

    async fn try_cancel(
        &self,
        requester_id: UserId,
        request_id: RequestId,
    ) -> Result<ParticipationRequest> {
        let request = self
            .ledger
            .find_by_id(request_id)
            .await?
            .filter(|request| request.requester_id == requester_id)
            .ok_or_else(|| RegistrationError::request_not_found(request_id))?;

        // Re-read under the event lock so a concurrent resolve cannot
        // overwrite the cancellation.
        let mut tx = self.ledger.begin(request.event_id).await?;
        let mut current = tx
            .find_by_id(request_id)
            .await?
            .ok_or_else(|| RegistrationError::request_not_found(request_id))?;

        let previous = current.status;
        if previous == RequestStatus::Canceled {
            return Ok(current);
        }

        current.status = RequestStatus::Canceled;
        tx.save_all(vec![current.clone()]).await?;
        tx.commit().await?;

        metrics::counter!("registration.requests.canceled", "previous" => previous.as_str())
            .increment(1);
        tracing::info!(
            request_id = %request_id,
            event_id = %current.event_id,
            requester_id = %requester_id,
            previous = %previous,
            freed_slot = previous == RequestStatus::Confirmed,
            "Participation request canceled"
        );

        Ok(current)
    }

    /// Every request a user has made, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::Storage`] if the ledger fails.
    pub async fn list_user_requests(
        &self,
        requester_id: UserId,
    ) -> Result<Vec<ParticipationRequest>> {
        Ok(self.ledger.find_by_requester(requester_id).await?)
    }

    /// Every request for an event, as seen by its organizer.
    ///
    /// # Errors
    ///
    /// - [`RegistrationError::NotFound`] if the event is not the initiator's
    /// - [`RegistrationError::Storage`] if a collaborator fails
    pub async fn list_event_requests(
        &self,
        initiator_id: UserId,
        event_id: EventId,
    ) -> Result<Vec<ParticipationRequest>> {
        self.directory
            .find_by_id_and_initiator(event_id, initiator_id)
            .await?
            .ok_or_else(|| RegistrationError::event_not_found(event_id))?;

        Ok(self.ledger.find_by_event(event_id).await?)
    }

    /// Live confirmed counts for a set of events.
    ///
    /// Events without confirmed requests are absent from the map.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::Storage`] if the ledger fails.
    pub async fn confirmed_counts(&self, event_ids: Vec<EventId>) -> Result<HashMap<EventId, u64>> {
        if event_ids.is_empty() {
            return Ok(HashMap::new());
        }
        Ok(self.ledger.count_confirmed_by_events(event_ids).await?)
    }

    /// Apply an administrator's review decision to an event.
    ///
    /// # Errors
    ///
    /// - [`RegistrationError::NotFound`] if the event does not exist
    /// - [`RegistrationError::Validation`] for an initiator-only action
    /// - [`RegistrationError::Conflict`] if the transition is illegal
    /// - [`RegistrationError::Storage`] if the directory fails
    pub async fn apply_admin_action(
        &self,
        event_id: EventId,
        action: EventStateAction,
    ) -> Result<Event> {
        let result = async {
            let event = self
                .directory
                .find_by_id(event_id)
                .await?
                .ok_or_else(|| RegistrationError::event_not_found(event_id))?;
            self.apply_action(event, action, Actor::Admin).await
        }
        .await;
        record_outcome("admin_action", &result);
        result
    }

    /// Apply an organizer's change to their own event.
    ///
    /// # Errors
    ///
    /// - [`RegistrationError::NotFound`] if the event is not the initiator's
    /// - [`RegistrationError::Validation`] for an admin-only action
    /// - [`RegistrationError::Conflict`] if the event is already published
    /// - [`RegistrationError::Storage`] if the directory fails
    pub async fn apply_initiator_action(
        &self,
        initiator_id: UserId,
        event_id: EventId,
        action: EventStateAction,
    ) -> Result<Event> {
        let result = async {
            let event = self
                .directory
                .find_by_id_and_initiator(event_id, initiator_id)
                .await?
                .ok_or_else(|| RegistrationError::event_not_found(event_id))?;
            self.apply_action(event, action, Actor::Initiator).await
        }
        .await;
        record_outcome("initiator_action", &result);
        result
    }

    async fn apply_action(
        &self,
        mut event: Event,
        action: EventStateAction,
        actor: Actor,
    ) -> Result<Event> {
        let previous = event.state;
        let next = lifecycle::transition(previous, action, actor)?;

        event.state = next;
        if next == EventState::Published {
            event.published_on = Some(self.clock.now());
        }
        self.directory.save(event.clone()).await?;

        tracing::info!(
            event_id = %event.id,
            action = %action,
            from = %previous,
            to = %next,
            "Event state changed"
        );

        Ok(event)
    }
}

/// Count and log refused operations.
///
/// Business refusals are routine and logged at debug; storage failures are
/// errors.
fn record_outcome<T>(operation: &'static str, result: &Result<T>) {
    let Err(error) = result else {
        return;
    };

    metrics::counter!(
        "registration.failures",
        "operation" => operation,
        "kind" => error.kind()
    )
    .increment(1);

    if matches!(error, RegistrationError::Storage(_)) {
        tracing::error!(operation, error = %error, "Registration operation failed");
    } else {
        tracing::debug!(operation, error = %error, "Registration operation refused");
    }
}
