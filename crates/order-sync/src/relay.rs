//! Outbox relay: repairs the event bus and search index after failed or
//! interrupted downstream steps.

use std::time::Duration;

use chrono::Utc;
use domain::{LifecycleEvent, Order, OrderDocument, OrderId};
use event_publisher::{EventPublisher, PublishError};
use order_search::{ORDERS_COLLECTION, SearchError, SearchProjector};
use order_store::{OrderStore, OrderStoreExt, OutboxEntry, OutboxKind, StoreError};
use tokio_util::sync::CancellationToken;

use crate::retry::{RetryConfig, retry_with_backoff};

/// Relay tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayConfig {
    /// Entries fetched per pass.
    pub batch_size: usize,
    /// Pause between passes that found less than a full batch.
    pub poll_interval: Duration,
    /// Failed passes after which an entry is left as a dead letter.
    pub max_attempts: u32,
    /// Entries younger than this are left to the synchronous path.
    pub grace_period: Duration,
    /// Backoff for each step inside one delivery.
    pub retry: RetryConfig,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            poll_interval: Duration::from_secs(1),
            max_attempts: 10,
            grace_period: Duration::from_secs(5),
            retry: RetryConfig::default(),
        }
    }
}

/// Counts from one relay pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayReport {
    /// Entries fully propagated and acknowledged.
    pub delivered: usize,
    /// Entries whose delivery failed this pass.
    pub failed: usize,
    /// Failed entries that reached `max_attempts` this pass.
    pub dead_lettered: usize,
}

impl RelayReport {
    pub fn processed(&self) -> usize {
        self.delivered + self.failed
    }
}

/// Drains unacknowledged outbox entries.
///
/// For each entry the current order is re-read from the store, which always
/// wins: the matching lifecycle event is re-emitted for creates and updates,
/// then the search document is replaced, or removed if the order is gone.
/// Consumers may therefore see an event more than once.
pub struct OutboxRelay<S, P, X>
where
    S: OrderStore,
    P: EventPublisher,
    X: SearchProjector,
{
    store: S,
    publisher: P,
    projector: X,
    collection: String,
    config: RelayConfig,
}

impl<S, P, X> OutboxRelay<S, P, X>
where
    S: OrderStore,
    P: EventPublisher,
    X: SearchProjector,
{
    pub fn new(store: S, publisher: P, projector: X, config: RelayConfig) -> Self {
        Self {
            store,
            publisher,
            projector,
            collection: ORDERS_COLLECTION.to_string(),
            config,
        }
    }

    /// Projects into a different collection.
    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    /// Runs one pass over the pending entries.
    #[tracing::instrument(skip(self))]
    pub async fn run_once(&self) -> Result<RelayReport, StoreError> {
        let entries = self
            .store
            .pending_outbox(self.config.batch_size, self.config.max_attempts)
            .await?;
        let grace = chrono::Duration::from_std(self.config.grace_period)
            .unwrap_or(chrono::Duration::zero());
        let cutoff = Utc::now() - grace;

        let mut report = RelayReport::default();
        for entry in entries {
            // Entries come oldest first, so everything after this is younger.
            if entry.created_at > cutoff {
                break;
            }

            match self.deliver(&entry).await {
                Ok(()) => {
                    self.store.mark_delivered(entry.id).await?;
                    metrics::counter!("outbox_relay_delivered_total").increment(1);
                    report.delivered += 1;
                }
                Err(reason) => {
                    self.store.record_failure(entry.id, &reason).await?;
                    metrics::counter!("outbox_relay_failed_total").increment(1);
                    report.failed += 1;

                    if entry.attempts + 1 >= self.config.max_attempts {
                        tracing::error!(
                            outbox_id = %entry.id,
                            order_id = %entry.order_id,
                            error = %reason,
                            "Outbox entry exhausted its attempts"
                        );
                        report.dead_lettered += 1;
                    }
                }
            }
        }

        Ok(report)
    }

    /// Runs passes until `shutdown` is cancelled.
    pub async fn run(&self, shutdown: CancellationToken) {
        tracing::info!(
            batch_size = self.config.batch_size,
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "Outbox relay started"
        );

        while !shutdown.is_cancelled() {
            let drain_again = match self.run_once().await {
                Ok(report) => {
                    if report.processed() > 0 {
                        tracing::info!(
                            delivered = report.delivered,
                            failed = report.failed,
                            dead_lettered = report.dead_lettered,
                            "Outbox relay pass finished"
                        );
                    }
                    // Failed entries wait out the poll interval before their next attempt.
                    report.failed == 0 && report.delivered >= self.config.batch_size
                }
                Err(e) => {
                    tracing::error!(error = %e, "Outbox relay pass failed");
                    false
                }
            };

            if drain_again {
                continue;
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }

        tracing::info!("Outbox relay stopped");
    }

    #[tracing::instrument(
        skip(self, entry),
        fields(outbox_id = %entry.id, order_id = %entry.order_id, kind = entry.kind.as_str())
    )]
    async fn deliver(&self, entry: &OutboxEntry) -> Result<(), String> {
        let order_id = entry.order_id;

        match self.current_order(order_id).await? {
            Some(order) => {
                if let Some(event) = event_for(entry.kind, &order) {
                    let event = event.map_err(|e| format!("encoding event: {e}"))?;
                    let (publisher, event) = (&self.publisher, &event);
                    retry_with_backoff(&self.config.retry, PublishError::is_transient, move |_| {
                        publisher.emit(event)
                    })
                    .await
                    .map_err(|e| format!("publishing: {e}"))?;
                }

                let doc = OrderDocument::from(&order);
                let (projector, collection) = (&self.projector, self.collection.as_str());
                let doc = &doc;
                retry_with_backoff(&self.config.retry, SearchError::is_transient, move |_| {
                    projector.upsert(collection, &doc.id, doc)
                })
                .await
                .map_err(|e| format!("projecting: {e}"))?;

                // A delete that finished while the document was written leaves
                // nothing behind to remove it.
                if self.current_order(order_id).await?.is_none() {
                    tracing::info!("Order deleted during delivery, removing projection");
                    self.remove_projection(order_id).await?;
                }
            }
            None => self.remove_projection(order_id).await?,
        }

        Ok(())
    }

    async fn current_order(&self, order_id: OrderId) -> Result<Option<Order>, String> {
        let store = &self.store;
        retry_with_backoff(&self.config.retry, StoreError::is_transient, move |_| {
            store.find(order_id)
        })
        .await
        .map_err(|e| format!("reading order: {e}"))
    }

    async fn remove_projection(&self, order_id: OrderId) -> Result<(), String> {
        let doc_id = order_id.to_string();
        let (projector, collection, doc_id) =
            (&self.projector, self.collection.as_str(), doc_id.as_str());
        retry_with_backoff(&self.config.retry, SearchError::is_transient, move |_| {
            projector.delete(collection, doc_id)
        })
        .await
        .map_err(|e| format!("removing projection: {e}"))
    }
}

/// The lifecycle event an outbox entry stands for, built from the current
/// record.
fn event_for(kind: OutboxKind, order: &Order) -> Option<serde_json::Result<LifecycleEvent>> {
    match kind {
        OutboxKind::Created => Some(LifecycleEvent::order_created(order)),
        OutboxKind::Updated => Some(LifecycleEvent::order_status_updated(order)),
        OutboxKind::Deleted => None,
    }
}
