//! `PostgreSQL`-backed request ledger.
//!
//! [`PostgresRequestLedger::begin`] opens a transaction and locks the event
//! row with `SELECT ... FOR UPDATE`. Every read and write of the unit of work
//! runs on that transaction. sqlx rolls a transaction back when it is dropped
//! without a commit.

use crate::{db_error, non_negative};
use rsvp_core::error::StorageError;
use rsvp_core::ledger::{LedgerTransaction, RequestLedger, StoreFuture};
use rsvp_core::types::{
    EventId, NewParticipationRequest, ParticipationRequest, RequestId, RequestStatus, UserId,
};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::collections::HashMap;
use std::time::Instant;

const SELECT_REQUEST: &str = r"
    SELECT id, event_id, requester_id, created, status
    FROM participation_requests
";

/// Convert a database row to a [`ParticipationRequest`].
fn row_to_request(row: &PgRow) -> Result<ParticipationRequest, StorageError> {
    let status: String = row.try_get("status").map_err(db_error)?;

    Ok(ParticipationRequest {
        id: RequestId::new(row.try_get("id").map_err(db_error)?),
        event_id: EventId::new(row.try_get("event_id").map_err(db_error)?),
        requester_id: UserId::new(row.try_get("requester_id").map_err(db_error)?),
        created: row.try_get("created").map_err(db_error)?,
        status: RequestStatus::parse(&status)?,
    })
}

fn rows_to_requests(rows: &[PgRow]) -> Result<Vec<ParticipationRequest>, StorageError> {
    rows.iter().map(row_to_request).collect()
}

/// Request ledger over the `participation_requests` table.
#[derive(Clone)]
pub struct PostgresRequestLedger {
    pool: PgPool,
}

impl PostgresRequestLedger {
    /// Create a ledger using an existing connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl RequestLedger for PostgresRequestLedger {
    fn begin(&self, event_id: EventId) -> StoreFuture<'_, Box<dyn LedgerTransaction>> {
        Box::pin(async move {
            let started = Instant::now();
            let mut tx = self.pool.begin().await.map_err(db_error)?;

            let locked: Option<(i64,)> =
                sqlx::query_as("SELECT id FROM events WHERE id = $1 FOR UPDATE")
                    .bind(event_id.value())
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(db_error)?;
            if locked.is_none() {
                return Err(StorageError::EventMissing(event_id));
            }

            metrics::histogram!("registration.ledger.lock_wait_seconds")
                .record(started.elapsed().as_secs_f64());
            tracing::trace!(event_id = %event_id, "Event row locked");

            let unit: Box<dyn LedgerTransaction> =
                Box::new(PostgresLedgerTransaction { event_id, tx });
            Ok(unit)
        })
    }

    fn find_by_id(&self, request_id: RequestId) -> StoreFuture<'_, Option<ParticipationRequest>> {
        Box::pin(async move {
            let row = sqlx::query(&format!("{SELECT_REQUEST} WHERE id = $1"))
                .bind(request_id.value())
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error)?;
            row.as_ref().map(row_to_request).transpose()
        })
    }

    fn find_by_requester(
        &self,
        requester_id: UserId,
    ) -> StoreFuture<'_, Vec<ParticipationRequest>> {
        Box::pin(async move {
            let rows = sqlx::query(&format!(
                "{SELECT_REQUEST} WHERE requester_id = $1 ORDER BY id"
            ))
            .bind(requester_id.value())
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
            rows_to_requests(&rows)
        })
    }

    fn find_by_event(&self, event_id: EventId) -> StoreFuture<'_, Vec<ParticipationRequest>> {
        Box::pin(async move {
            let rows = sqlx::query(&format!("{SELECT_REQUEST} WHERE event_id = $1 ORDER BY id"))
                .bind(event_id.value())
                .fetch_all(&self.pool)
                .await
                .map_err(db_error)?;
            rows_to_requests(&rows)
        })
    }

    fn count_confirmed_by_events(
        &self,
        event_ids: Vec<EventId>,
    ) -> StoreFuture<'_, HashMap<EventId, u64>> {
        Box::pin(async move {
            let ids: Vec<i64> = event_ids.iter().map(EventId::value).collect();
            let rows: Vec<(i64, i64)> = sqlx::query_as(
                r"
                SELECT event_id, COUNT(*)
                FROM participation_requests
                WHERE status = 'CONFIRMED' AND event_id = ANY($1)
                GROUP BY event_id
                ",
            )
            .bind(&ids)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;

            rows.into_iter()
                .map(|(event_id, count)| {
                    Ok((EventId::new(event_id), non_negative("count", count)?))
                })
                .collect()
        })
    }
}

/// One unit of work: an open transaction holding the event's row lock.
struct PostgresLedgerTransaction {
    event_id: EventId,
    tx: Transaction<'static, Postgres>,
}

impl LedgerTransaction for PostgresLedgerTransaction {
    fn event_id(&self) -> EventId {
        self.event_id
    }

    fn count_confirmed(&mut self) -> StoreFuture<'_, u64> {
        Box::pin(async move {
            let (count,): (i64,) = sqlx::query_as(
                r"
                SELECT COUNT(*)
                FROM participation_requests
                WHERE event_id = $1 AND status = 'CONFIRMED'
                ",
            )
            .bind(self.event_id.value())
            .fetch_one(&mut *self.tx)
            .await
            .map_err(db_error)?;

            non_negative("count", count)
        })
    }

    fn find_by_id(
        &mut self,
        request_id: RequestId,
    ) -> StoreFuture<'_, Option<ParticipationRequest>> {
        Box::pin(async move {
            let row = sqlx::query(&format!("{SELECT_REQUEST} WHERE id = $1 AND event_id = $2"))
                .bind(request_id.value())
                .bind(self.event_id.value())
                .fetch_optional(&mut *self.tx)
                .await
                .map_err(db_error)?;
            row.as_ref().map(row_to_request).transpose()
        })
    }

    fn find_by_ids_and_event(
        &mut self,
        request_ids: Vec<RequestId>,
    ) -> StoreFuture<'_, Vec<ParticipationRequest>> {
        Box::pin(async move {
            let ids: Vec<i64> = request_ids.iter().map(RequestId::value).collect();
            let rows = sqlx::query(&format!(
                "{SELECT_REQUEST} WHERE id = ANY($1) AND event_id = $2 ORDER BY id"
            ))
            .bind(&ids)
            .bind(self.event_id.value())
            .fetch_all(&mut *self.tx)
            .await
            .map_err(db_error)?;
            rows_to_requests(&rows)
        })
    }

    fn find_pending(&mut self) -> StoreFuture<'_, Vec<ParticipationRequest>> {
        Box::pin(async move {
            let rows = sqlx::query(&format!(
                "{SELECT_REQUEST} WHERE event_id = $1 AND status = 'PENDING' ORDER BY id"
            ))
            .bind(self.event_id.value())
            .fetch_all(&mut *self.tx)
            .await
            .map_err(db_error)?;
            rows_to_requests(&rows)
        })
    }

    fn exists_non_canceled(&mut self, requester_id: UserId) -> StoreFuture<'_, bool> {
        Box::pin(async move {
            let (exists,): (bool,) = sqlx::query_as(
                r"
                SELECT EXISTS(
                    SELECT 1 FROM participation_requests
                    WHERE event_id = $1 AND requester_id = $2 AND status <> 'CANCELED'
                )
                ",
            )
            .bind(self.event_id.value())
            .bind(requester_id.value())
            .fetch_one(&mut *self.tx)
            .await
            .map_err(db_error)?;

            Ok(exists)
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

            let (id,): (i64,) = sqlx::query_as(
                r"
                INSERT INTO participation_requests (event_id, requester_id, created, status)
                VALUES ($1, $2, $3, $4)
                RETURNING id
                ",
            )
            .bind(request.event_id.value())
            .bind(request.requester_id.value())
            .bind(request.created)
            .bind(request.status.as_str())
            .fetch_one(&mut *self.tx)
            .await
            .map_err(db_error)?;

            Ok(request.with_id(RequestId::new(id)))
        })
    }

    fn save_all(&mut self, requests: Vec<ParticipationRequest>) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            if requests.is_empty() {
                return Ok(());
            }

            let ids: Vec<i64> = requests.iter().map(|r| r.id.value()).collect();
            let statuses: Vec<String> = requests
                .iter()
                .map(|r| r.status.as_str().to_string())
                .collect();

            let result = sqlx::query(
                r"
                UPDATE participation_requests AS r
                SET status = u.status
                FROM UNNEST($1::BIGINT[], $2::TEXT[]) AS u(id, status)
                WHERE r.id = u.id AND r.event_id = $3
                ",
            )
            .bind(&ids)
            .bind(&statuses)
            .bind(self.event_id.value())
            .execute(&mut *self.tx)
            .await
            .map_err(db_error)?;

            if result.rows_affected() != ids.len() as u64 {
                return Err(StorageError::Database(format!(
                    "updated {} of {} requests for event {}",
                    result.rows_affected(),
                    ids.len(),
                    self.event_id
                )));
            }
            Ok(())
        })
    }

    fn commit(self: Box<Self>) -> StoreFuture<'static, ()> {
        Box::pin(async move {
            let event_id = self.event_id;
            self.tx.commit().await.map_err(db_error)?;
            tracing::trace!(event_id = %event_id, "Unit of work committed");
            Ok(())
        })
    }
}
