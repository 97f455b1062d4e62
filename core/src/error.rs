//! Error types for the registration engine.
//!
//! Every failure the engine surfaces is one of three business categories
//! (not found, conflict, validation) or a storage failure from one of the
//! injected collaborators. None of them are retried internally.

use crate::types::{EventId, RequestId, RequestStatus};
use thiserror::Error;

/// Result type alias using the registration error type.
pub type Result<T> = std::result::Result<T, RegistrationError>;

/// Business rule that rejected an operation.
///
/// The `Display` strings are stable and may be shown to API clients.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConflictReason {
    /// Requests are only admitted against published events
    #[error("event not published")]
    EventNotPublished,

    /// The organizer tried to join their own event
    #[error("initiator cannot request own event")]
    InitiatorOwnEvent,

    /// The requester already holds a live request for this event
    #[error("duplicate request")]
    DuplicateRequest,

    /// No capacity left
    #[error("limit reached")]
    LimitReached,

    /// The event auto-confirms, so there is nothing to moderate
    #[error("moderation not applicable")]
    ModerationNotApplicable,

    /// A batch member has already left `PENDING`
    #[error("request not pending: request {0} is {1}")]
    RequestNotPending(RequestId, RequestStatus),

    /// `PUBLISH_EVENT` on a published event
    #[error("already published")]
    AlreadyPublished,

    /// `PUBLISH_EVENT` on a canceled event
    #[error("cannot publish canceled event")]
    CannotPublishCanceled,

    /// `REJECT_EVENT` on a published event
    #[error("cannot reject published event")]
    CannotRejectPublished,

    /// Initiator edits are closed once an event is published
    #[error("only pending or canceled events can be changed")]
    PublishedEventLocked,
}

/// Errors raised by storage collaborators.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Database connection or query failed.
    #[error("Database error: {0}")]
    Database(String),

    /// A stored value could not be decoded into a domain type.
    #[error("Corrupt record: {0}")]
    Corrupt(String),

    /// The event row disappeared between lookup and lock.
    #[error("Event {0} vanished before it could be locked")]
    EventMissing(EventId),
}

/// Main error type for registration operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    /// Referenced event or request is absent (or not visible to the caller).
    #[error("Not found: {0}")]
    NotFound(String),

    /// A business rule was violated.
    #[error("Conflict: {0}")]
    Conflict(#[from] ConflictReason),

    /// The input itself is malformed.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A storage collaborator failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl RegistrationError {
    /// Short label for logs and metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Validation(_) => "validation",
            Self::Storage(_) => "storage",
        }
    }

    pub(crate) fn event_not_found(event_id: EventId) -> Self {
        Self::NotFound(format!("Event with id={event_id} was not found"))
    }

    pub(crate) fn request_not_found(request_id: RequestId) -> Self {
        Self::NotFound(format!("Request with id={request_id} was not found"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_messages_are_stable() {
        let err = RegistrationError::from(ConflictReason::LimitReached);
        assert_eq!(err.to_string(), "Conflict: limit reached");
        assert_eq!(err.kind(), "conflict");

        let err = RegistrationError::from(ConflictReason::RequestNotPending(
            RequestId::new(7),
            RequestStatus::Rejected,
        ));
        assert_eq!(
            err.to_string(),
            "Conflict: request not pending: request 7 is REJECTED"
        );
    }

    #[test]
    fn storage_errors_pass_through() {
        let err = RegistrationError::from(StorageError::Database("connection reset".into()));
        assert_eq!(err.to_string(), "Database error: connection reset");
        assert_eq!(err.kind(), "storage");
    }
}
