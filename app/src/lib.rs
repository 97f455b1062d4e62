//! # RSVP Application
//!
//! Production wiring for the registration engine:
//!
//! - [`config`]: environment-driven configuration
//! - [`telemetry`]: `tracing` subscriber setup
//! - [`metrics`]: Prometheus recorder and metric descriptions
//! - [`bootstrap`]: connects to `PostgreSQL` and assembles a
//!   [`RegistrationService`](rsvp_core::RegistrationService)

pub mod bootstrap;
pub mod config;
pub mod metrics;
pub mod telemetry;

pub use bootstrap::{AppError, RegistrationApp};
pub use config::Config;
