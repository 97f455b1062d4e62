//! Schema setup.
//!
//! ```sql
//! events (id, initiator_id, participant_limit, request_moderation, state, published_on)
//! participation_requests (id, event_id, requester_id, created, status)
//! ```
//!
//! A partial unique index keeps at most one non-canceled request per
//! (event, requester), so the duplicate rule holds even if a caller bypasses
//! the unit of work.

use crate::db_error;
use rsvp_core::error::StorageError;
use sqlx::PgPool;

const STATEMENTS: &[(&str, &str)] = &[
    (
        "events table",
        r"
        CREATE TABLE IF NOT EXISTS events (
            id BIGINT PRIMARY KEY,
            initiator_id BIGINT NOT NULL,
            participant_limit BIGINT NOT NULL DEFAULT 0 CHECK (participant_limit >= 0),
            request_moderation BOOLEAN NOT NULL DEFAULT TRUE,
            state TEXT NOT NULL CHECK (state IN ('PENDING', 'PUBLISHED', 'CANCELED')),
            published_on TIMESTAMPTZ
        )
        ",
    ),
    (
        "participation_requests table",
        r"
        CREATE TABLE IF NOT EXISTS participation_requests (
            id BIGSERIAL PRIMARY KEY,
            event_id BIGINT NOT NULL REFERENCES events(id),
            requester_id BIGINT NOT NULL,
            created TIMESTAMPTZ NOT NULL DEFAULT now(),
            status TEXT NOT NULL
                CHECK (status IN ('PENDING', 'CONFIRMED', 'REJECTED', 'CANCELED'))
        )
        ",
    ),
    (
        "live request index",
        r"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_requests_live_per_requester
            ON participation_requests (event_id, requester_id)
            WHERE status <> 'CANCELED'
        ",
    ),
    (
        "event status index",
        "CREATE INDEX IF NOT EXISTS idx_requests_event_status ON participation_requests (event_id, status)",
    ),
    (
        "requester index",
        "CREATE INDEX IF NOT EXISTS idx_requests_requester ON participation_requests (requester_id)",
    ),
];

/// Create tables and indexes if they don't already exist.
///
/// # Errors
///
/// Returns [`StorageError::Database`] if a statement fails.
pub async fn run_migrations(pool: &PgPool) -> Result<(), StorageError> {
    let mut conn = pool.acquire().await.map_err(db_error)?;

    for (name, statement) in STATEMENTS {
        sqlx::query(statement)
            .execute(&mut *conn)
            .await
            .map_err(|e| StorageError::Database(format!("Failed to create {name}: {e}")))?;
    }

    tracing::info!(statements = STATEMENTS.len(), "Registration schema ready");
    Ok(())
}
