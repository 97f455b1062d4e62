//! Property-based testing strategies using proptest.
//!
//! A [`Scenario`] is one event plus a random sequence of [`Operation`]s run
//! against it. Operations refer to requests by position in the order they
//! were created, so the same scenario replays identically on any ledger.

use crate::fixtures::EventBuilder;
use proptest::prelude::*;
use rsvp_core::types::{Decision, Event};

/// Organizer of every generated event.
pub const INITIATOR: i64 = 1;

/// A single step against the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// `requester` asks to join
    Submit {
        /// User id, never the initiator
        requester: i64,
    },
    /// The initiator decides on requests picked by creation index
    Resolve {
        /// Indexes into the requests created so far (taken modulo their count)
        picks: Vec<usize>,
        /// Decision applied to the batch
        decision: Decision,
    },
    /// The owner of the picked request withdraws it
    Cancel {
        /// Index into the requests created so far (taken modulo their count)
        pick: usize,
    },
}

/// An event and the operations to run on it.
#[derive(Debug, Clone)]
pub struct Scenario {
    /// Event under test, already published
    pub event: Event,
    /// Steps in order
    pub operations: Vec<Operation>,
}

/// Any decision
pub fn decision() -> impl Strategy<Value = Decision> {
    prop_oneof![Just(Decision::Confirm), Just(Decision::Reject)]
}

/// Published events with a small limit and either moderation setting.
///
/// Limit 0 (unlimited) is included.
pub fn published_event() -> impl Strategy<Value = Event> {
    (0u32..=4, any::<bool>()).prop_map(|(limit, moderated)| {
        EventBuilder::new(1)
            .initiator(INITIATOR)
            .limit(limit)
            .moderated(moderated)
            .build()
    })
}

/// One operation, weighted towards submissions.
pub fn operation(max_requesters: i64) -> impl Strategy<Value = Operation> {
    prop_oneof![
        4 => (2..=max_requesters + 1).prop_map(|requester| Operation::Submit { requester }),
        2 => (proptest::collection::vec(0usize..32, 1..4), decision())
            .prop_map(|(picks, decision)| Operation::Resolve { picks, decision }),
        1 => (0usize..32).prop_map(|pick| Operation::Cancel { pick }),
    ]
}

/// A full scenario of up to `max_steps` operations over `max_requesters` users.
pub fn scenario(max_requesters: i64, max_steps: usize) -> impl Strategy<Value = Scenario> {
    (
        published_event(),
        proptest::collection::vec(operation(max_requesters), 1..=max_steps),
    )
        .prop_map(|(event, operations)| Scenario { event, operations })
}
