//! Outbox relay worker.
//!
//! Wires the PostgreSQL order store, the event bus client and the
//! Elasticsearch projector into an [`OutboxRelay`] and runs it until shutdown.

pub mod config;
pub mod error;
pub mod telemetry;

use std::sync::Arc;

use event_publisher::{EventPublisher, RestProxyEventPublisher};
use order_search::ElasticsearchProjector;
use order_store::PostgresOrderStore;
use order_sync::OutboxRelay;
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;

pub use config::{LogFormat, PublisherTarget, WorkerConfig};
pub use error::{Result, WorkerError};

/// Builds the event bus client for the configured target.
pub fn build_publisher(target: &PublisherTarget) -> Result<Arc<dyn EventPublisher>> {
    match target {
        PublisherTarget::RestProxy(url) => {
            tracing::info!(%url, "Publishing through Kafka REST proxy");
            Ok(Arc::new(RestProxyEventPublisher::new(url.clone())?))
        }
        #[cfg(feature = "kafka")]
        PublisherTarget::Native(brokers) => {
            tracing::info!(%brokers, "Publishing with native Kafka producer");
            Ok(Arc::new(event_publisher::KafkaEventPublisher::new(brokers)?))
        }
        #[cfg(not(feature = "kafka"))]
        PublisherTarget::Native(_) => Err(WorkerError::Config(
            "native Kafka publishing requires the `kafka` feature".to_string(),
        )),
    }
}

/// Connects to every collaborator and runs the relay until `shutdown` fires.
pub async fn run(config: WorkerConfig, shutdown: CancellationToken) -> Result<()> {
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;
    let store = PostgresOrderStore::new(pool);
    store.run_migrations().await?;
    tracing::info!("Database migrations applied");

    let publisher = build_publisher(&config.publisher_target())?;

    let projector = ElasticsearchProjector::new(config.elasticsearch_node.clone())?;
    projector.ensure_index(&config.orders_index).await?;

    let relay = OutboxRelay::new(store, publisher, projector, config.relay.clone())
        .with_collection(config.orders_index.clone());
    relay.run(shutdown).await;

    Ok(())
}
