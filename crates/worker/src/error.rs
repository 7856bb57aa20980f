//! Worker error types.

use event_publisher::PublishError;
use order_search::SearchError;
use thiserror::Error;

/// Errors that stop the worker from starting or running.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// Invalid or unsupported configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connecting to PostgreSQL failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Applying the schema failed.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// The event bus client could not be built.
    #[error("Event publisher error: {0}")]
    Publisher(#[from] PublishError),

    /// The search engine could not be prepared.
    #[error("Search engine error: {0}")]
    Search(#[from] SearchError),

    /// The Prometheus exporter could not be installed.
    #[error("Metrics exporter error: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    /// A global tracing subscriber was already installed.
    #[error("Tracing initialization failed: {0}")]
    Tracing(String),
}

/// Convenience type alias for worker results.
pub type Result<T> = std::result::Result<T, WorkerError>;
