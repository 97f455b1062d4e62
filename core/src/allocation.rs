//! Capacity allocation engine.
//!
//! Applies an organizer's bulk decision to a batch of `PENDING` requests.
//!
//! ```text
//! REJECT:  every batch member -> REJECTED
//!
//! CONFIRM: remaining = limit - confirmed        (read inside the unit of work)
//!          remaining <= 0        -> "limit reached", nothing touched
//!          for r in batch (caller order):
//!              remaining > 0     -> CONFIRMED, remaining -= 1
//!              otherwise         -> REJECTED
//!          remaining == 0        -> cascade: every other PENDING -> REJECTED
//! ```
//!
//! Caller order is the tie-break: earlier positions win the remaining slots
//! even when a later position was created first. Callers that want
//! first-come-first-served must sort the batch by id themselves.
//!
//! Validation is all-or-nothing. A missing id or a member in any status other
//! than `PENDING` fails the whole batch before anything is mutated.

use crate::error::{ConflictReason, RegistrationError};
use crate::types::{
    Decision, Event, ParticipationRequest, RequestId, RequestStatus, StatusUpdateResult,
};
use std::collections::{HashMap, HashSet};

/// Fail unless the event actually moderates its requests.
///
/// # Errors
///
/// Returns [`ConflictReason::ModerationNotApplicable`] for unmoderated or
/// unlimited events; their requests are confirmed at admission.
pub const fn ensure_moderated(event: &Event) -> Result<(), ConflictReason> {
    if event.is_moderated() {
        Ok(())
    } else {
        Err(ConflictReason::ModerationNotApplicable)
    }
}

/// Reject empty batches and batches naming the same request twice.
///
/// # Errors
///
/// Returns [`RegistrationError::Validation`] describing the problem.
pub fn validate_batch(request_ids: &[RequestId]) -> Result<(), RegistrationError> {
    if request_ids.is_empty() {
        return Err(RegistrationError::Validation(
            "requestIds must not be empty".to_string(),
        ));
    }

    let mut seen = HashSet::with_capacity(request_ids.len());
    for id in request_ids {
        if !seen.insert(*id) {
            return Err(RegistrationError::Validation(format!(
                "request {id} appears more than once in the batch"
            )));
        }
    }

    Ok(())
}

/// Result of applying a decision, before it is persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Allocation {
    batch: HashSet<RequestId>,
    confirmed: Vec<ParticipationRequest>,
    rejected: Vec<ParticipationRequest>,
    exhausted: bool,
}

impl Allocation {
    /// Whether this batch used up the last slot, so outstanding requests
    /// must be cascade-rejected.
    #[must_use]
    pub const fn capacity_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Requests confirmed by this allocation
    #[must_use]
    pub fn confirmed(&self) -> &[ParticipationRequest] {
        &self.confirmed
    }

    /// Requests rejected by this allocation, cascade included
    #[must_use]
    pub fn rejected(&self) -> &[ParticipationRequest] {
        &self.rejected
    }

    /// Reject every pending request outside the batch.
    ///
    /// `pending` is the event's pending set as seen inside the same unit of
    /// work. Batch members still show up there because nothing has been
    /// saved yet; they are skipped. Does nothing unless capacity ran out.
    ///
    /// Returns the number of cascade-rejected requests.
    pub fn cascade(&mut self, pending: Vec<ParticipationRequest>) -> usize {
        if !self.exhausted {
            return 0;
        }

        let before = self.rejected.len();
        for mut request in pending {
            if self.batch.contains(&request.id) || request.status != RequestStatus::Pending {
                continue;
            }
            request.status = RequestStatus::Rejected;
            self.rejected.push(request);
        }
        self.rejected.len() - before
    }

    /// Every request whose status this allocation changed.
    #[must_use]
    pub fn changed(&self) -> Vec<ParticipationRequest> {
        self.confirmed
            .iter()
            .chain(self.rejected.iter())
            .cloned()
            .collect()
    }

    /// Split into the caller-facing result.
    #[must_use]
    pub fn into_result(self) -> StatusUpdateResult {
        StatusUpdateResult {
            confirmed: self.confirmed,
            rejected: self.rejected,
        }
    }
}

/// Apply `decision` to the batch named by `request_ids`.
///
/// `found` holds whatever the ledger returned for those ids within this
/// event, in any order and any status. `confirmed` is the event's confirmed
/// count read in the same unit of work.
///
/// # Errors
///
/// - [`ConflictReason::ModerationNotApplicable`] if the event auto-confirms
/// - [`RegistrationError::NotFound`] if nothing matched, or any id is missing
/// - [`ConflictReason::RequestNotPending`] if any member left `PENDING`
/// - [`ConflictReason::LimitReached`] when confirming into a full event
pub fn allocate(
    event: &Event,
    request_ids: &[RequestId],
    found: Vec<ParticipationRequest>,
    confirmed: u64,
    decision: Decision,
) -> Result<Allocation, RegistrationError> {
    ensure_moderated(event)?;

    let mut by_id: HashMap<RequestId, ParticipationRequest> = found
        .into_iter()
        .filter(|request| request.event_id == event.id)
        .map(|request| (request.id, request))
        .collect();

    if by_id.is_empty() {
        return Err(RegistrationError::NotFound(format!(
            "No participation requests of event {} match the batch",
            event.id
        )));
    }

    let mut batch = Vec::with_capacity(request_ids.len());
    for id in request_ids {
        let Some(request) = by_id.remove(id) else {
            return Err(RegistrationError::request_not_found(*id));
        };
        if request.status != RequestStatus::Pending {
            return Err(ConflictReason::RequestNotPending(request.id, request.status).into());
        }
        batch.push(request);
    }

    let mut allocation = Allocation {
        batch: batch.iter().map(|request| request.id).collect(),
        confirmed: Vec::new(),
        rejected: Vec::new(),
        exhausted: false,
    };

    match decision {
        Decision::Reject => {
            for mut request in batch {
                request.status = RequestStatus::Rejected;
                allocation.rejected.push(request);
            }
        }
        Decision::Confirm => {
            let limit = u64::from(event.participant_limit);
            let mut remaining = limit.saturating_sub(confirmed);
            if remaining == 0 {
                return Err(ConflictReason::LimitReached.into());
            }

            for mut request in batch {
                if remaining > 0 {
                    request.status = RequestStatus::Confirmed;
                    allocation.confirmed.push(request);
                    remaining -= 1;
                } else {
                    request.status = RequestStatus::Rejected;
                    allocation.rejected.push(request);
                }
            }

            allocation.exhausted = remaining == 0;
        }
    }

    Ok(allocation)
}
