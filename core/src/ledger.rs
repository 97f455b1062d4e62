//! Storage collaborators consumed by the engine.
//!
//! The engine never talks to a database directly. It reads events through an
//! [`EventDirectory`] and reads/writes participation requests through a
//! [`RequestLedger`].
//!
//! # Serialized unit of work
//!
//! Admission and allocation both read the confirmed count and then write
//! something that depends on it. [`RequestLedger::begin`] hands out a
//! [`LedgerTransaction`] that holds an exclusive lock on one event until it
//! is committed or dropped:
//!
//! - `PostgresRequestLedger` (in `rsvp-postgres`): a database transaction
//!   holding `SELECT ... FOR UPDATE` on the event row
//! - `InMemoryRequestLedger` (in `rsvp-testing`): an owned guard from a
//!   per-event `tokio::sync::Mutex`
//!
//! Two transactions on the same event never overlap; transactions on
//! different events run in parallel. Dropping a transaction without calling
//! [`LedgerTransaction::commit`] discards every write made through it.
//!
//! # Dyn Compatibility
//!
//! These traits return `Pin<Box<dyn Future>>` instead of using `async fn` so
//! the service can hold them as `Arc<dyn EventDirectory>` and
//! `Arc<dyn RequestLedger>`.

use crate::error::StorageError;
use crate::types::{
    Event, EventId, NewParticipationRequest, ParticipationRequest, RequestId, UserId,
};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by the storage traits.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StorageError>> + Send + 'a>>;

/// Read and mutate events.
pub trait EventDirectory: Send + Sync {
    /// Load an event in any state.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the lookup fails.
    fn find_by_id(&self, event_id: EventId) -> StoreFuture<'_, Option<Event>>;

    /// Load an event only if it is published.
    ///
    /// A directory query for public listing callers. Admission does not use
    /// it: [`find_by_id`](Self::find_by_id) plus the state check keeps an
    /// unpublished event a conflict rather than not-found.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the lookup fails.
    fn find_published_by_id(&self, event_id: EventId) -> StoreFuture<'_, Option<Event>>;

    /// Load an event only if `initiator_id` organizes it.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the lookup fails.
    fn find_by_id_and_initiator(
        &self,
        event_id: EventId,
        initiator_id: UserId,
    ) -> StoreFuture<'_, Option<Event>>;

    /// Insert or replace an event.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the write fails.
    fn save(&self, event: Event) -> StoreFuture<'_, ()>;
}

/// Participation request storage.
pub trait RequestLedger: Send + Sync {
    /// Open a serialized unit of work for one event.
    ///
    /// Waits until no other transaction holds the event.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the lock cannot be taken.
    fn begin(&self, event_id: EventId) -> StoreFuture<'_, Box<dyn LedgerTransaction>>;

    /// Load a single request outside any unit of work.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the lookup fails.
    fn find_by_id(&self, request_id: RequestId) -> StoreFuture<'_, Option<ParticipationRequest>>;

    /// All requests made by a user, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the lookup fails.
    fn find_by_requester(&self, requester_id: UserId)
    -> StoreFuture<'_, Vec<ParticipationRequest>>;

    /// All requests for an event, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the lookup fails.
    fn find_by_event(&self, event_id: EventId) -> StoreFuture<'_, Vec<ParticipationRequest>>;

    /// Confirmed counts for several events. Events without confirmed
    /// requests are absent from the map.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the query fails.
    fn count_confirmed_by_events(
        &self,
        event_ids: Vec<EventId>,
    ) -> StoreFuture<'_, HashMap<EventId, u64>>;
}

/// Exclusive unit of work over one event's requests.
///
/// Reads observe this transaction's own uncommitted writes.
pub trait LedgerTransaction: Send {
    /// The event this transaction holds.
    fn event_id(&self) -> EventId;

    /// Number of `CONFIRMED` requests for the event.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the query fails.
    fn count_confirmed(&mut self) -> StoreFuture<'_, u64>;

    /// Load one request of this event.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the lookup fails.
    fn find_by_id(&mut self, request_id: RequestId)
    -> StoreFuture<'_, Option<ParticipationRequest>>;

    /// Requests of this event among `request_ids`, in any status.
    ///
    /// Ids belonging to other events are silently skipped; the order of the
    /// result is unspecified.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the lookup fails.
    fn find_by_ids_and_event(
        &mut self,
        request_ids: Vec<RequestId>,
    ) -> StoreFuture<'_, Vec<ParticipationRequest>>;

    /// Every `PENDING` request of this event, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the lookup fails.
    fn find_pending(&mut self) -> StoreFuture<'_, Vec<ParticipationRequest>>;

    /// Whether the requester holds a request in any status but `CANCELED`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the lookup fails.
    fn exists_non_canceled(&mut self, requester_id: UserId) -> StoreFuture<'_, bool>;

    /// Store a new request and assign its id.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the write fails.
    fn insert(
        &mut self,
        request: NewParticipationRequest,
    ) -> StoreFuture<'_, ParticipationRequest>;

    /// Persist the status of existing requests.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the write fails.
    fn save_all(&mut self, requests: Vec<ParticipationRequest>) -> StoreFuture<'_, ()>;

    /// Make every write visible and release the event.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the commit fails; nothing is applied then.
    fn commit(self: Box<Self>) -> StoreFuture<'static, ()>;
}
