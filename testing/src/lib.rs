//! # RSVP Testing
//!
//! Testing utilities and helpers for the RSVP registration engine.
//!
//! This crate provides:
//! - A deterministic clock
//! - In-memory implementations of the storage collaborators
//! - Builders and a ready-wired harness for service-level tests
//! - Property-based testing strategies
//!
//! ## Example
//!
//! ```ignore
//! use rsvp_testing::{EventBuilder, RegistrationHarness};
//!
//! #[tokio::test]
//! async fn test_auto_confirm() {
//!     let event = EventBuilder::new(1).limit(10).moderated(false).build();
//!     let harness = RegistrationHarness::with_events([event]);
//!
//!     let request = harness.service.submit(UserId::new(2), EventId::new(1)).await?;
//!     assert_eq!(request.status, RequestStatus::Confirmed);
//! }
//! ```

use chrono::{DateTime, Utc};
use rsvp_core::environment::Clock;

pub mod fixtures;
pub mod memory;
pub mod properties;

/// Mock implementations of collaborator traits
pub mod mocks {
    use super::{Clock, DateTime, Utc};

    pub use crate::memory::{InMemoryEventDirectory, InMemoryRequestLedger};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use rsvp_testing::mocks::FixedClock;
    /// use rsvp_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .map(|time| time.with_timezone(&Utc))
                .unwrap_or_default(),
        )
    }
}

/// Route `tracing` output through the test harness.
///
/// Safe to call from every test; only the first call installs a subscriber.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,rsvp_core=debug".into()),
        )
        .with_test_writer()
        .try_init();
}

// Re-export commonly used items
pub use fixtures::{EventBuilder, RegistrationHarness};
pub use mocks::{FixedClock, InMemoryEventDirectory, InMemoryRequestLedger, test_clock};
