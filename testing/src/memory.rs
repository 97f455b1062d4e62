//! In-memory collaborators.
//!
//! Fast, deterministic stand-ins for the Postgres directory and ledger. The
//! ledger serializes units of work per event with an arena of
//! `tokio::sync::Mutex` locks keyed by event id, so concurrency tests
//! exercise the same exclusion the database provides with row locks.
//! Locks nobody holds or waits on are pruned on the next `begin`.

use chrono::{DateTime, Utc};
use rsvp_core::error::StorageError;
use rsvp_core::ledger::{EventDirectory, LedgerTransaction, RequestLedger, StoreFuture};
use rsvp_core::types::{
    Event, EventId, EventState, NewParticipationRequest, ParticipationRequest, RequestId,
    RequestStatus, UserId,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

// ============================================================================
// Event directory
// ============================================================================

/// `HashMap`-backed event directory.
#[derive(Debug, Default)]
pub struct InMemoryEventDirectory {
    events: RwLock<HashMap<EventId, Event>>,
}

impl InMemoryEventDirectory {
    /// Creates an empty directory
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a directory pre-populated with `events`
    #[must_use]
    pub fn with_events(events: impl IntoIterator<Item = Event>) -> Self {
        Self {
            events: RwLock::new(events.into_iter().map(|event| (event.id, event)).collect()),
        }
    }

    /// Current copy of an event, bypassing the trait
    pub async fn get(&self, event_id: EventId) -> Option<Event> {
        self.events.read().await.get(&event_id).cloned()
    }
}

impl EventDirectory for InMemoryEventDirectory {
    fn find_by_id(&self, event_id: EventId) -> StoreFuture<'_, Option<Event>> {
        Box::pin(async move { Ok(self.get(event_id).await) })
    }

    fn find_published_by_id(&self, event_id: EventId) -> StoreFuture<'_, Option<Event>> {
        Box::pin(async move {
            Ok(self
                .get(event_id)
                .await
                .filter(|event| event.state == EventState::Published))
        })
    }

    fn find_by_id_and_initiator(
        &self,
        event_id: EventId,
        initiator_id: UserId,
    ) -> StoreFuture<'_, Option<Event>> {
        Box::pin(async move {
            Ok(self
                .get(event_id)
                .await
                .filter(|event| event.initiator_id == initiator_id))
        })
    }

    fn save(&self, event: Event) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            self.events.write().await.insert(event.id, event);
            Ok(())
        })
    }
}

// ============================================================================
// Request ledger
// ============================================================================

#[derive(Debug, Default)]
struct LedgerInner {
    requests: RwLock<BTreeMap<RequestId, ParticipationRequest>>,
    next_id: AtomicI64,
    locks: Mutex<HashMap<EventId, Arc<Mutex<()>>>>,
    fail_commits: AtomicBool,
}

impl LedgerInner {
    fn next_id(&self) -> RequestId {
        RequestId::new(self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    async fn lock_for(&self, event_id: EventId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        // Nobody holds or waits on a lock whose only owner is the arena.
        locks.retain(|id, lock| *id == event_id || Arc::strong_count(lock) > 1);
        Arc::clone(locks.entry(event_id).or_default())
    }
}

/// `BTreeMap`-backed request ledger with per-event locking.
///
/// Clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRequestLedger {
    inner: Arc<LedgerInner>,
}

impl InMemoryRequestLedger {
    /// Creates an empty ledger
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a request directly, outside any unit of work.
    ///
    /// For arranging test fixtures; skips every admission rule.
    pub async fn seed(
        &self,
        event_id: EventId,
        requester_id: UserId,
        status: RequestStatus,
        created: DateTime<Utc>,
    ) -> ParticipationRequest {
        let request = NewParticipationRequest {
            event_id,
            requester_id,
            created,
            status,
        }
        .with_id(self.inner.next_id());
        self.inner
            .requests
            .write()
            .await
            .insert(request.id, request.clone());
        request
    }

    /// Every committed request, ordered by id
    pub async fn all(&self) -> Vec<ParticipationRequest> {
        self.inner.requests.read().await.values().cloned().collect()
    }

    /// Make every subsequent commit fail with a storage error.
    pub fn fail_commits(&self, fail: bool) {
        self.inner.fail_commits.store(fail, Ordering::SeqCst);
    }

    async fn committed_where(
        &self,
        keep: impl Fn(&ParticipationRequest) -> bool,
    ) -> Vec<ParticipationRequest> {
        self.inner
            .requests
            .read()
            .await
            .values()
            .filter(|request| keep(request))
            .cloned()
            .collect()
    }
}

impl RequestLedger for InMemoryRequestLedger {
    fn begin(&self, event_id: EventId) -> StoreFuture<'_, Box<dyn LedgerTransaction>> {
        Box::pin(async move {
            let lock = self.inner.lock_for(event_id).await;
            let guard = lock.lock_owned().await;

            let tx: Box<dyn LedgerTransaction> = Box::new(InMemoryTransaction {
                event_id,
                inner: Arc::clone(&self.inner),
                staged: BTreeMap::new(),
                _guard: guard,
            });
            Ok(tx)
        })
    }

    fn find_by_id(&self, request_id: RequestId) -> StoreFuture<'_, Option<ParticipationRequest>> {
        Box::pin(async move { Ok(self.inner.requests.read().await.get(&request_id).cloned()) })
    }

    fn find_by_requester(
        &self,
        requester_id: UserId,
    ) -> StoreFuture<'_, Vec<ParticipationRequest>> {
        Box::pin(async move {
            Ok(self
                .committed_where(|request| request.requester_id == requester_id)
                .await)
        })
    }

    fn find_by_event(&self, event_id: EventId) -> StoreFuture<'_, Vec<ParticipationRequest>> {
        Box::pin(async move {
            Ok(self
                .committed_where(|request| request.event_id == event_id)
                .await)
        })
    }

    fn count_confirmed_by_events(
        &self,
        event_ids: Vec<EventId>,
    ) -> StoreFuture<'_, HashMap<EventId, u64>> {
        Box::pin(async move {
            let mut counts = HashMap::new();
            for request in self
                .committed_where(|request| {
                    request.status == RequestStatus::Confirmed
                        && event_ids.contains(&request.event_id)
                })
                .await
            {
                *counts.entry(request.event_id).or_insert(0) += 1;
            }
            Ok(counts)
        })
    }
}

/// Unit of work holding one event's lock.
///
/// Writes are staged and only reach the shared map on commit.
struct InMemoryTransaction {
    event_id: EventId,
    inner: Arc<LedgerInner>,
    staged: BTreeMap<RequestId, ParticipationRequest>,
    _guard: OwnedMutexGuard<()>,
}

impl InMemoryTransaction {
    /// Committed requests of the event overlaid with staged writes.
    async fn view(&self) -> BTreeMap<RequestId, ParticipationRequest> {
        let mut view: BTreeMap<RequestId, ParticipationRequest> = self
            .inner
            .requests
            .read()
            .await
            .values()
            .filter(|request| request.event_id == self.event_id)
            .map(|request| (request.id, request.clone()))
            .collect();
        for (id, request) in &self.staged {
            view.insert(*id, request.clone());
        }
        view
    }
}

impl LedgerTransaction for InMemoryTransaction {
    fn event_id(&self) -> EventId {
        self.event_id
    }

    fn count_confirmed(&mut self) -> StoreFuture<'_, u64> {
        Box::pin(async move {
            let view = self.view().await;
            Ok(view
                .values()
                .filter(|request| request.status == RequestStatus::Confirmed)
                .count() as u64)
        })
    }

    fn find_by_id(
        &mut self,
        request_id: RequestId,
    ) -> StoreFuture<'_, Option<ParticipationRequest>> {
        Box::pin(async move { Ok(self.view().await.remove(&request_id)) })
    }

    fn find_by_ids_and_event(
        &mut self,
        request_ids: Vec<RequestId>,
    ) -> StoreFuture<'_, Vec<ParticipationRequest>> {
        Box::pin(async move {
            let mut view = self.view().await;
            Ok(request_ids
                .iter()
                .filter_map(|id| view.remove(id))
                .collect())
        })
    }

    fn find_pending(&mut self) -> StoreFuture<'_, Vec<ParticipationRequest>> {
        Box::pin(async move {
            Ok(self
                .view()
                .await
                .into_values()
                .filter(|request| request.status == RequestStatus::Pending)
                .collect())
        })
    }

    fn exists_non_canceled(&mut self, requester_id: UserId) -> StoreFuture<'_, bool> {
        Box::pin(async move {
            Ok(self.view().await.values().any(|request| {
                request.requester_id == requester_id && request.status != RequestStatus::Canceled
            }))
        })
    }

    fn insert(
        &mut self,
        request: NewParticipationRequest,
    ) -> StoreFuture<'_, ParticipationRequest> {
        Box::pin(async move {
            if request.event_id != self.event_id {
                return Err(StorageError::Database(format!(
                    "transaction holds event {} but the request targets event {}",
                    self.event_id, request.event_id
                )));
            }

            // Mirrors the partial unique index on (event_id, requester_id).
            let live_duplicate = self.view().await.values().any(|existing| {
                existing.requester_id == request.requester_id
                    && existing.status != RequestStatus::Canceled
            });
            if live_duplicate && request.status != RequestStatus::Canceled {
                return Err(StorageError::Database(format!(
                    "duplicate live request for event {} and requester {}",
                    request.event_id, request.requester_id
                )));
            }

            let stored = request.with_id(self.inner.next_id());
            self.staged.insert(stored.id, stored.clone());
            Ok(stored)
        })
    }

    fn save_all(&mut self, requests: Vec<ParticipationRequest>) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            if let Some(foreign) = requests
                .iter()
                .find(|request| request.event_id != self.event_id)
            {
                return Err(StorageError::Database(format!(
                    "request {} does not belong to event {}",
                    foreign.id, self.event_id
                )));
            }
            for request in requests {
                self.staged.insert(request.id, request);
            }
            Ok(())
        })
    }

    fn commit(self: Box<Self>) -> StoreFuture<'static, ()> {
        Box::pin(async move {
            if self.inner.fail_commits.load(Ordering::SeqCst) {
                return Err(StorageError::Database("simulated commit failure".to_string()));
            }

            let mut requests = self.inner.requests.write().await;
            for (id, request) in &self.staged {
                requests.insert(*id, request.clone());
            }
            Ok(())
        })
    }
}
