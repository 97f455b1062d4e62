//! `PostgreSQL`-backed event directory.

use crate::{db_error, non_negative};
use rsvp_core::error::StorageError;
use rsvp_core::ledger::{EventDirectory, StoreFuture};
use rsvp_core::types::{Event, EventId, EventState, UserId};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

const SELECT_EVENT: &str = r"
    SELECT id, initiator_id, participant_limit, request_moderation, state, published_on
    FROM events
";

/// Event directory over the `events` table.
#[derive(Clone)]
pub struct PostgresEventDirectory {
    pool: PgPool,
}

impl PostgresEventDirectory {
    /// Create a directory using an existing connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn fetch(
        &self,
        sql: String,
        id: EventId,
        extra: Option<i64>,
    ) -> Result<Option<Event>, StorageError> {
        let mut query = sqlx::query(&sql).bind(id.value());
        if let Some(extra) = extra {
            query = query.bind(extra);
        }
        let row = query.fetch_optional(&self.pool).await.map_err(db_error)?;
        row.as_ref().map(row_to_event).transpose()
    }
}

/// Convert a database row to an [`Event`].
pub(crate) fn row_to_event(row: &PgRow) -> Result<Event, StorageError> {
    let limit: i64 = row.try_get("participant_limit").map_err(db_error)?;
    let participant_limit = u32::try_from(non_negative("participant_limit", limit)?)
        .map_err(|_| StorageError::Corrupt(format!("participant_limit out of range: {limit}")))?;
    let state: String = row.try_get("state").map_err(db_error)?;

    Ok(Event {
        id: EventId::new(row.try_get("id").map_err(db_error)?),
        initiator_id: UserId::new(row.try_get("initiator_id").map_err(db_error)?),
        participant_limit,
        request_moderation: row.try_get("request_moderation").map_err(db_error)?,
        state: EventState::parse(&state)?,
        published_on: row.try_get("published_on").map_err(db_error)?,
    })
}

impl EventDirectory for PostgresEventDirectory {
    fn find_by_id(&self, event_id: EventId) -> StoreFuture<'_, Option<Event>> {
        Box::pin(async move {
            self.fetch(format!("{SELECT_EVENT} WHERE id = $1"), event_id, None)
                .await
        })
    }

    fn find_published_by_id(&self, event_id: EventId) -> StoreFuture<'_, Option<Event>> {
        Box::pin(async move {
            self.fetch(
                format!("{SELECT_EVENT} WHERE id = $1 AND state = 'PUBLISHED'"),
                event_id,
                None,
            )
            .await
        })
    }

    fn find_by_id_and_initiator(
        &self,
        event_id: EventId,
        initiator_id: UserId,
    ) -> StoreFuture<'_, Option<Event>> {
        Box::pin(async move {
            self.fetch(
                format!("{SELECT_EVENT} WHERE id = $1 AND initiator_id = $2"),
                event_id,
                Some(initiator_id.value()),
            )
            .await
        })
    }

    fn save(&self, event: Event) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            sqlx::query(
                r"
                INSERT INTO events (
                    id, initiator_id, participant_limit, request_moderation, state, published_on
                ) VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (id) DO UPDATE
                SET initiator_id = EXCLUDED.initiator_id,
                    participant_limit = EXCLUDED.participant_limit,
                    request_moderation = EXCLUDED.request_moderation,
                    state = EXCLUDED.state,
                    published_on = EXCLUDED.published_on
                ",
            )
            .bind(event.id.value())
            .bind(event.initiator_id.value())
            .bind(i64::from(event.participant_limit))
            .bind(event.request_moderation)
            .bind(event.state.as_str())
            .bind(event.published_on)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;

            tracing::debug!(event_id = %event.id, state = %event.state, "Event saved");
            Ok(())
        })
    }
}
