//! # RSVP Core
//!
//! Participation request lifecycle and capacity allocation for a public
//! event-listing service.
//!
//! Organizers publish events with a participant limit; users ask to join;
//! organizers confirm or reject pending requests until the event is full.
//! This crate owns the rules for that flow and nothing else: storage lives
//! behind the [`ledger`] traits and transport is the caller's business.
//!
//! ## Core Concepts
//!
//! - **Admission**: whether a new request may be created, and whether it
//!   starts `PENDING` or `CONFIRMED` ([`admission`])
//! - **Allocation**: bulk confirm/reject of pending requests against the
//!   remaining capacity, with cascade rejection once the event fills up
//!   ([`allocation`])
//! - **Lifecycle**: the closed set of event state actions ([`lifecycle`])
//! - **Service**: the imperative shell that runs each operation inside one
//!   per-event unit of work ([`service`])
//!
//! ## Architecture Principles
//!
//! - Functional Core, Imperative Shell: policies are pure functions over a
//!   snapshot read inside the unit of work
//! - The confirmed count is always derived from request rows, never cached
//! - Every operation that reads capacity and writes depends on it holds the
//!   event's lock for the whole read-check-write sequence
//!
//! ## Example
//!
//! ```ignore
//! use rsvp_core::service::RegistrationService;
//!
//! let service = RegistrationService::new(directory, ledger, clock);
//! let request = service.submit(user_id, event_id).await?;
//! let outcome = service
//!     .resolve(initiator_id, event_id, vec![request.id], Decision::Confirm)
//!     .await?;
//! ```

pub mod admission;
pub mod allocation;
pub mod environment;
pub mod error;
pub mod ledger;
pub mod lifecycle;
pub mod service;
pub mod types;

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use error::{ConflictReason, RegistrationError, Result, StorageError};
pub use service::RegistrationService;
pub use types::*;
