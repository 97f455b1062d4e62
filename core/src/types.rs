//! Domain types for participation requests.
//!
//! Identifiers, the read-only view of an event, the participation request
//! itself, and the values exchanged with callers of the engine.

use crate::error::{RegistrationError, StorageError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for an event
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(i64);

impl EventId {
    /// Wraps a raw store key
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the raw store key
    #[must_use]
    pub const fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a user (requester or initiator)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(i64);

impl UserId {
    /// Wraps a raw store key
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the raw store key
    #[must_use]
    pub const fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a participation request
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(i64);

impl RequestId {
    /// Wraps a raw store key
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the raw store key
    #[must_use]
    pub const fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Event (read side)
// ============================================================================

/// Lifecycle state of an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventState {
    /// Awaiting review, not visible to the public
    Pending,
    /// Visible and accepting participation requests
    Published,
    /// Withdrawn by the initiator or rejected by an administrator
    Canceled,
}

impl EventState {
    /// Convert state to database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Published => "PUBLISHED",
            Self::Canceled => "CANCELED",
        }
    }

    /// Parse state from database string.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Corrupt`] if the string doesn't match a known state.
    pub fn parse(s: &str) -> Result<Self, StorageError> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "PUBLISHED" => Ok(Self::Published),
            "CANCELED" => Ok(Self::Canceled),
            _ => Err(StorageError::Corrupt(format!("Invalid event state: {s}"))),
        }
    }
}

impl fmt::Display for EventState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The slice of an event the engine reads.
///
/// Owned by the event directory; the engine never creates events, it only
/// mutates `state` through [`crate::lifecycle`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Event identifier
    pub id: EventId,
    /// Organizer who created the event
    pub initiator_id: UserId,
    /// Maximum confirmed participants, 0 means unlimited
    pub participant_limit: u32,
    /// Whether requests wait for organizer confirmation
    pub request_moderation: bool,
    /// Lifecycle state
    pub state: EventState,
    /// When the event was published, if it has been
    pub published_on: Option<DateTime<Utc>>,
}

impl Event {
    /// Whether the event has no participant ceiling
    #[must_use]
    pub const fn is_unlimited(&self) -> bool {
        self.participant_limit == 0
    }

    /// Whether requests to this event go through organizer moderation.
    ///
    /// Unlimited events never do, whatever the moderation flag says.
    #[must_use]
    pub const fn is_moderated(&self) -> bool {
        self.request_moderation && !self.is_unlimited()
    }
}

// ============================================================================
// Participation requests
// ============================================================================

/// Status of a participation request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    /// Waiting for the organizer
    Pending,
    /// Holds one of the event's slots
    Confirmed,
    /// Turned down by the organizer or by overflow
    Rejected,
    /// Withdrawn by the requester
    Canceled,
}

impl RequestStatus {
    /// Convert status to database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Confirmed => "CONFIRMED",
            Self::Rejected => "REJECTED",
            Self::Canceled => "CANCELED",
        }
    }

    /// Parse status from database string.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Corrupt`] if the string doesn't match a known status.
    pub fn parse(s: &str) -> Result<Self, StorageError> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "CONFIRMED" => Ok(Self::Confirmed),
            "REJECTED" => Ok(Self::Rejected),
            "CANCELED" => Ok(Self::Canceled),
            _ => Err(StorageError::Corrupt(format!("Invalid request status: {s}"))),
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user's request to join an event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipationRequest {
    /// Request identifier
    pub id: RequestId,
    /// Event being joined
    pub event_id: EventId,
    /// User asking to join
    pub requester_id: UserId,
    /// When the request was admitted
    pub created: DateTime<Utc>,
    /// Current status
    pub status: RequestStatus,
}

/// A request that has passed admission but has no identifier yet.
///
/// The ledger assigns the id on insert.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewParticipationRequest {
    /// Event being joined
    pub event_id: EventId,
    /// User asking to join
    pub requester_id: UserId,
    /// Admission time
    pub created: DateTime<Utc>,
    /// Initial status decided by the admission policy
    pub status: RequestStatus,
}

impl NewParticipationRequest {
    /// Attach the identifier the ledger assigned.
    #[must_use]
    pub const fn with_id(self, id: RequestId) -> ParticipationRequest {
        ParticipationRequest {
            id,
            event_id: self.event_id,
            requester_id: self.requester_id,
            created: self.created,
            status: self.status,
        }
    }
}

// ============================================================================
// Organizer decisions
// ============================================================================

/// Organizer's bulk decision on pending requests.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Decision {
    /// Confirm as many as capacity allows, reject the rest
    #[serde(rename = "CONFIRMED")]
    Confirm,
    /// Reject every request in the batch
    #[serde(rename = "REJECTED")]
    Reject,
}

impl Decision {
    /// Wire representation of the decision
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Confirm => "CONFIRMED",
            Self::Reject => "REJECTED",
        }
    }
}

impl FromStr for Decision {
    type Err = RegistrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CONFIRMED" => Ok(Self::Confirm),
            "REJECTED" => Ok(Self::Reject),
            other => Err(RegistrationError::Validation(format!(
                "Unknown request decision: {other}"
            ))),
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a bulk decision, including cascade rejections.
///
/// The two lists are disjoint.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdateResult {
    /// Requests that now hold a slot
    pub confirmed: Vec<ParticipationRequest>,
    /// Requests that were turned down, batch members first
    pub rejected: Vec<ParticipationRequest>,
}
