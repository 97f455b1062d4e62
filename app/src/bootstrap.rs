//! Wiring: configuration in, ready-to-use service out.
//!
//! ```rust,ignore
//! let config = Config::from_env();
//! let app = RegistrationApp::connect(&config).await?;
//!
//! let request = app.service.submit(requester, event).await?;
//! ```

use crate::config::{Config, PostgresConfig};
use crate::metrics::{self, MetricsError};
use metrics_exporter_prometheus::PrometheusHandle;
use rsvp_core::environment::SystemClock;
use rsvp_core::{RegistrationError, RegistrationService, StorageError};
use rsvp_postgres::{PostgresEventDirectory, PostgresRequestLedger, run_migrations};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Errors raised while starting or running the application.
#[derive(Error, Debug)]
pub enum AppError {
    /// Could not reach the database
    #[error("Failed to connect to database: {0}")]
    Connect(#[from] sqlx::Error),
    /// Schema setup or other storage failure
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// Metrics exporter setup failed
    #[error(transparent)]
    Metrics(#[from] MetricsError),
    /// A registration operation was refused
    #[error(transparent)]
    Registration(#[from] RegistrationError),
}

/// The assembled application.
#[derive(Clone)]
pub struct RegistrationApp {
    /// Registration operations
    pub service: RegistrationService,
    /// Event directory, for seeding and administration
    pub directory: Arc<PostgresEventDirectory>,
    /// Shared connection pool
    pub pool: PgPool,
    /// Prometheus handle, when metrics are enabled and this call installed them
    pub metrics: Option<PrometheusHandle>,
}

impl RegistrationApp {
    /// Connect to `PostgreSQL`, run migrations and assemble the service.
    ///
    /// # Errors
    ///
    /// Returns [`AppError`] if the database is unreachable, the schema cannot
    /// be created, or the metrics recorder cannot be installed.
    pub async fn connect(config: &Config) -> Result<Self, AppError> {
        let metrics = if config.telemetry.metrics_enabled {
            metrics::install_recorder()?
        } else {
            None
        };

        let pool = connect_pool(&config.postgres).await?;
        run_migrations(&pool).await?;

        Ok(Self::from_pool(pool, metrics))
    }

    /// Assemble the service over an existing, migrated pool.
    #[must_use]
    pub fn from_pool(pool: PgPool, metrics: Option<PrometheusHandle>) -> Self {
        let directory = Arc::new(PostgresEventDirectory::new(pool.clone()));
        let ledger = Arc::new(PostgresRequestLedger::new(pool.clone()));

        let service = RegistrationService::new(directory.clone(), ledger, Arc::new(SystemClock));

        Self {
            service,
            directory,
            pool,
            metrics,
        }
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if metrics are disabled.
    #[must_use]
    pub fn render_metrics(&self) -> Option<String> {
        self.metrics.as_ref().map(PrometheusHandle::render)
    }
}

/// Build the connection pool from configuration.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if no connection can be established.
pub async fn connect_pool(config: &PostgresConfig) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.connect_timeout())
        .idle_timeout(config.idle_timeout())
        .connect(&config.url)
        .await?;

    info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "Database pool ready"
    );
    Ok(pool)
}
