//! `PostgreSQL` storage for the RSVP registration engine.
//!
//! This crate implements the storage traits from `rsvp-core` on top of sqlx:
//!
//! - [`PostgresEventDirectory`] - the `events` table
//! - [`PostgresRequestLedger`] - the `participation_requests` table, with one
//!   database transaction per unit of work
//! - [`run_migrations`] - idempotent schema setup
//!
//! Every unit of work opens a transaction and takes a row lock on the event
//! (`SELECT ... FOR UPDATE`) before reading anything, so capacity decisions for
//! one event are serialized across every process sharing the database.
//!
//! # Example
//!
//! ```ignore
//! use rsvp_postgres::{PostgresEventDirectory, PostgresRequestLedger, run_migrations};
//!
//! async fn example(pool: sqlx::PgPool) -> Result<(), Box<dyn std::error::Error>> {
//!     run_migrations(&pool).await?;
//!     let directory = PostgresEventDirectory::new(pool.clone());
//!     let ledger = PostgresRequestLedger::new(pool);
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use rsvp_core::error::StorageError;

pub mod directory;
pub mod ledger;
pub mod schema;

pub use directory::PostgresEventDirectory;
pub use ledger::PostgresRequestLedger;
pub use schema::run_migrations;

/// Wrap a driver error.
pub(crate) fn db_error(error: sqlx::Error) -> StorageError {
    StorageError::Database(error.to_string())
}

/// Convert a stored id column that must fit the domain type.
pub(crate) fn non_negative(column: &str, value: i64) -> Result<u64, StorageError> {
    u64::try_from(value)
        .map_err(|_| StorageError::Corrupt(format!("{column} is negative: {value}")))
}
