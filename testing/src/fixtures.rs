//! Builders and a ready-wired service for tests.

use crate::memory::{InMemoryEventDirectory, InMemoryRequestLedger};
use crate::mocks::{FixedClock, test_clock};
use rsvp_core::environment::Clock;
use rsvp_core::types::{
    Event, EventId, EventState, ParticipationRequest, RequestId, RequestStatus, UserId,
};
use rsvp_core::RegistrationService;
use std::sync::Arc;

/// Builder for [`Event`] fixtures.
///
/// Defaults to a published, moderated, unlimited event owned by user 1.
#[derive(Debug, Clone)]
pub struct EventBuilder {
    event: Event,
}

impl EventBuilder {
    /// Start building event `id`
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self {
            event: Event {
                id: EventId::new(id),
                initiator_id: UserId::new(1),
                participant_limit: 0,
                request_moderation: true,
                state: EventState::Published,
                published_on: None,
            },
        }
    }

    /// Set the organizer
    #[must_use]
    pub const fn initiator(mut self, id: i64) -> Self {
        self.event.initiator_id = UserId::new(id);
        self
    }

    /// Set the participant limit (0 = unlimited)
    #[must_use]
    pub const fn limit(mut self, limit: u32) -> Self {
        self.event.participant_limit = limit;
        self
    }

    /// Set whether requests need organizer approval
    #[must_use]
    pub const fn moderated(mut self, moderated: bool) -> Self {
        self.event.request_moderation = moderated;
        self
    }

    /// Set the lifecycle state
    #[must_use]
    pub const fn state(mut self, state: EventState) -> Self {
        self.event.state = state;
        self
    }

    /// Finish the event
    #[must_use]
    pub fn build(self) -> Event {
        self.event
    }
}

/// A [`RegistrationService`] over in-memory collaborators.
///
/// The directory, ledger and clock stay reachable so tests can arrange state
/// and inspect results without going through the service.
pub struct RegistrationHarness {
    /// Event directory shared with the service
    pub directory: Arc<InMemoryEventDirectory>,
    /// Request ledger shared with the service
    pub ledger: InMemoryRequestLedger,
    /// Clock shared with the service
    pub clock: FixedClock,
    /// Service under test
    pub service: RegistrationService,
}

impl RegistrationHarness {
    /// Harness with no events
    #[must_use]
    pub fn new() -> Self {
        Self::with_events([])
    }

    /// Harness whose directory holds `events`
    #[must_use]
    pub fn with_events(events: impl IntoIterator<Item = Event>) -> Self {
        let directory = Arc::new(InMemoryEventDirectory::with_events(events));
        let ledger = InMemoryRequestLedger::new();
        let clock = test_clock();

        let service = RegistrationService::new(
            directory.clone(),
            Arc::new(ledger.clone()),
            Arc::new(clock.clone()),
        );

        Self {
            directory,
            ledger,
            clock,
            service,
        }
    }

    /// Committed confirmed requests for `event_id`
    pub async fn confirmed_count(&self, event_id: EventId) -> usize {
        self.ledger
            .all()
            .await
            .iter()
            .filter(|request| {
                request.event_id == event_id && request.status == RequestStatus::Confirmed
            })
            .count()
    }

    /// Committed status of a request
    pub async fn status_of(&self, request_id: RequestId) -> Option<RequestStatus> {
        self.ledger
            .all()
            .await
            .into_iter()
            .find(|request| request.id == request_id)
            .map(|request| request.status)
    }

    /// Seed one pending request per requester, returning their ids in order.
    pub async fn seed_pending(
        &self,
        event_id: EventId,
        requesters: impl IntoIterator<Item = i64>,
    ) -> Vec<RequestId> {
        let mut ids = Vec::new();
        for requester in requesters {
            let request = self.seed(event_id, requester, RequestStatus::Pending).await;
            ids.push(request.id);
        }
        ids
    }

    /// Seed a single request with an explicit status
    pub async fn seed(
        &self,
        event_id: EventId,
        requester: i64,
        status: RequestStatus,
    ) -> ParticipationRequest {
        self.ledger
            .seed(event_id, UserId::new(requester), status, self.clock.now())
            .await
    }
}

impl Default for RegistrationHarness {
    fn default() -> Self {
        Self::new()
    }
}
