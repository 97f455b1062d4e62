//! Request admission policy.
//!
//! Decides whether a user may ask to join an event and what status the new
//! request starts in. The checks run in a fixed order and the first failure
//! wins:
//!
//! ```text
//! 1. event is PUBLISHED            else "event not published"
//! 2. requester is not the initiator else "initiator cannot request own event"
//! 3. no live request already        else "duplicate request"
//! 4. limit > 0 => confirmed < limit else "limit reached"
//! ```
//!
//! The snapshot passed in must be read inside the event's unit of work, or
//! two admissions can both see the last free slot.

use crate::error::ConflictReason;
use crate::types::{Event, EventState, RequestStatus, UserId};

/// What the ledger says about the event at admission time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AdmissionSnapshot {
    /// Requester already holds a non-canceled request
    pub already_requested: bool,
    /// Confirmed requests for the event
    pub confirmed: u64,
}

/// Status a freshly admitted request starts in.
///
/// Unmoderated and unlimited events confirm immediately.
#[must_use]
pub const fn initial_status(event: &Event) -> RequestStatus {
    if event.is_moderated() {
        RequestStatus::Pending
    } else {
        RequestStatus::Confirmed
    }
}

/// Run the admission checks and return the initial status.
///
/// # Errors
///
/// Returns the first [`ConflictReason`] that applies.
pub fn admit(
    event: &Event,
    requester_id: UserId,
    snapshot: AdmissionSnapshot,
) -> Result<RequestStatus, ConflictReason> {
    if event.state != EventState::Published {
        return Err(ConflictReason::EventNotPublished);
    }

    if event.initiator_id == requester_id {
        return Err(ConflictReason::InitiatorOwnEvent);
    }

    if snapshot.already_requested {
        return Err(ConflictReason::DuplicateRequest);
    }

    if !event.is_unlimited() && snapshot.confirmed >= u64::from(event.participant_limit) {
        return Err(ConflictReason::LimitReached);
    }

    Ok(initial_status(event))
}
