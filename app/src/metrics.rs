//! Prometheus metrics for the registration engine.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `registration.requests.submitted{status}` - Requests admitted, by initial status
//! - `registration.requests.resolved{status}` - Requests confirmed or rejected by an organizer
//! - `registration.requests.cascade_rejected` - Pending requests rejected because the event filled
//! - `registration.requests.canceled{previous}` - Requests withdrawn, by the status they left
//! - `registration.failures{operation, kind}` - Refused or failed operations
//!
//! ## Histograms
//! - `registration.ledger.lock_wait_seconds` - Time spent acquiring an event's lock

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use thiserror::Error;

/// Errors from metrics setup.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Register all metric descriptions.
///
/// This should be called once at application startup, before any metrics are recorded.
pub fn register_metrics() {
    describe_counter!(
        "registration.requests.submitted",
        "Participation requests admitted, by initial status"
    );
    describe_counter!(
        "registration.requests.resolved",
        "Participation requests confirmed or rejected by an organizer"
    );
    describe_counter!(
        "registration.requests.cascade_rejected",
        "Pending requests rejected automatically once an event filled"
    );
    describe_counter!(
        "registration.requests.canceled",
        "Participation requests withdrawn by their requester"
    );
    describe_counter!(
        "registration.failures",
        "Registration operations refused or failed, by operation and error kind"
    );
    describe_histogram!(
        "registration.ledger.lock_wait_seconds",
        "Time taken to acquire an event's unit of work"
    );

    tracing::info!("Registration metrics registered");
}

/// Install the Prometheus recorder and return its handle for rendering.
///
/// Returns `Ok(None)` if a recorder is already installed.
///
/// # Errors
///
/// Returns [`MetricsError`] if the exporter cannot be built or installed.
pub fn install_recorder() -> Result<Option<PrometheusHandle>, MetricsError> {
    let builder = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Suffix("seconds".to_string()),
            &[0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5],
        )
        .map_err(|e| MetricsError::Build(e.to_string()))?;

    match builder.install_recorder() {
        Ok(handle) => {
            register_metrics();
            Ok(Some(handle))
        }
        Err(e) => {
            let err_msg = e.to_string();
            if err_msg.contains("already initialized") {
                tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                Ok(None)
            } else {
                Err(MetricsError::Install(err_msg))
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;

    #[test]
    fn second_install_is_skipped() {
        let first = install_recorder().expect("first install succeeds");
        let handle = first.expect("first install returns a handle");

        metrics::counter!("registration.requests.submitted", "status" => "PENDING").increment(1);
        assert!(handle.render().contains("registration_requests_submitted"));

        assert!(install_recorder().expect("second install is tolerated").is_none());
    }
}
