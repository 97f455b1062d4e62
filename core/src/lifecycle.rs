//! Event state actions.
//!
//! Administrators publish or reject events under review; initiators send
//! their events back to review or withdraw them. The wire strings map onto a
//! closed enum and every (state, action) pair is handled explicitly.
//!
//! ```text
//!                 PUBLISH_EVENT (admin)
//!   PENDING ──────────────────────────────> PUBLISHED
//!     │ ▲
//!     │ │ SEND_TO_REVIEW (initiator)
//!     ▼ │
//!   CANCELED <── REJECT_EVENT (admin) / CANCEL_REVIEW (initiator)
//! ```

use crate::error::{ConflictReason, RegistrationError};
use crate::types::EventState;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Who is allowed to perform an action.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Actor {
    /// Platform administrator reviewing events
    Admin,
    /// Organizer who owns the event
    Initiator,
}

/// A requested change to an event's lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventStateAction {
    /// Admin: make a pending event public
    PublishEvent,
    /// Admin: turn down an event under review
    RejectEvent,
    /// Initiator: put the event (back) under review
    SendToReview,
    /// Initiator: withdraw the event
    CancelReview,
}

impl EventStateAction {
    /// Wire representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PublishEvent => "PUBLISH_EVENT",
            Self::RejectEvent => "REJECT_EVENT",
            Self::SendToReview => "SEND_TO_REVIEW",
            Self::CancelReview => "CANCEL_REVIEW",
        }
    }

    /// Which actor may issue this action
    #[must_use]
    pub const fn actor(&self) -> Actor {
        match self {
            Self::PublishEvent | Self::RejectEvent => Actor::Admin,
            Self::SendToReview | Self::CancelReview => Actor::Initiator,
        }
    }
}

impl FromStr for EventStateAction {
    type Err = RegistrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PUBLISH_EVENT" => Ok(Self::PublishEvent),
            "REJECT_EVENT" => Ok(Self::RejectEvent),
            "SEND_TO_REVIEW" => Ok(Self::SendToReview),
            "CANCEL_REVIEW" => Ok(Self::CancelReview),
            other => Err(RegistrationError::Validation(format!(
                "Invalid state action: {other}"
            ))),
        }
    }
}

impl fmt::Display for EventStateAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compute the state an action leads to.
///
/// # Errors
///
/// - [`RegistrationError::Validation`] if `actor` may not issue `action`
/// - [`RegistrationError::Conflict`] if `action` is illegal from `current`
pub fn transition(
    current: EventState,
    action: EventStateAction,
    actor: Actor,
) -> Result<EventState, RegistrationError> {
    if action.actor() != actor {
        return Err(RegistrationError::Validation(format!(
            "{action} is not available to {actor:?}"
        )));
    }

    let next = match (action, current) {
        (EventStateAction::PublishEvent, EventState::Pending) => EventState::Published,
        (EventStateAction::PublishEvent, EventState::Published) => {
            return Err(ConflictReason::AlreadyPublished.into());
        }
        (EventStateAction::PublishEvent, EventState::Canceled) => {
            return Err(ConflictReason::CannotPublishCanceled.into());
        }

        (EventStateAction::RejectEvent, EventState::Published) => {
            return Err(ConflictReason::CannotRejectPublished.into());
        }
        (EventStateAction::RejectEvent, EventState::Pending | EventState::Canceled) => {
            EventState::Canceled
        }

        (
            EventStateAction::SendToReview | EventStateAction::CancelReview,
            EventState::Published,
        ) => {
            return Err(ConflictReason::PublishedEventLocked.into());
        }
        (EventStateAction::SendToReview, EventState::Pending | EventState::Canceled) => {
            EventState::Pending
        }
        (EventStateAction::CancelReview, EventState::Pending | EventState::Canceled) => {
            EventState::Canceled
        }
    };

    Ok(next)
}
