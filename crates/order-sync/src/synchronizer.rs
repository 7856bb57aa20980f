//! Per-mutation orchestration of the order store, event bus and search index.

use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::time::Instant;

use domain::{LifecycleEvent, NewOrder, Order, OrderDocument, OrderId, OrderPatch};
use event_publisher::{EventPublisher, PublishError};
use order_search::{ORDERS_COLLECTION, SearchProjector, compile};
use order_store::{OrderStore, OutboxId};
use tokio_util::sync::CancellationToken;

use crate::error::{Result, SyncError};
use crate::outcome::{DownstreamFailure, FailureReason, Synced, SyncStep};

/// Collects the outcome of the downstream steps of one mutation.
struct Downstream<'a> {
    order_id: OrderId,
    cancel: &'a CancellationToken,
    failures: Vec<DownstreamFailure>,
}

impl<'a> Downstream<'a> {
    fn new(order_id: OrderId, cancel: &'a CancellationToken) -> Self {
        Self {
            order_id,
            cancel,
            failures: Vec::new(),
        }
    }

    /// Runs one step unless the caller has cancelled. Steps never undo
    /// earlier ones; a failure is recorded and the next step still runs.
    async fn run<F, E>(&mut self, step: SyncStep, work: F)
    where
        F: Future<Output = std::result::Result<(), E>>,
        E: Display,
    {
        if self.cancel.is_cancelled() {
            self.record(step, FailureReason::Cancelled);
            return;
        }

        if let Err(err) = work.await {
            tracing::warn!(
                order_id = %self.order_id,
                step = step.as_str(),
                error = %err,
                "Downstream step failed"
            );
            self.record(step, FailureReason::Unavailable(err.to_string()));
        }
    }

    fn record(&mut self, step: SyncStep, reason: FailureReason) {
        metrics::counter!("orders_downstream_failures_total", "step" => step.as_str())
            .increment(1);
        self.failures.push(DownstreamFailure::new(step, reason));
    }

    fn succeeded(&self) -> bool {
        self.failures.is_empty()
    }

    fn finish<T>(self, value: T) -> Synced<T> {
        Synced::new(value, self.failures)
    }
}

fn ensure_not_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(SyncError::Cancelled);
    }
    Ok(())
}

fn record_mutation(operation: &'static str, started: Instant) {
    metrics::counter!("orders_mutations_total", "operation" => operation).increment(1);
    metrics::histogram!("orders_sync_duration_seconds", "operation" => operation)
        .record(started.elapsed().as_secs_f64());
}

/// Sequences every order mutation as store, then event bus, then search index.
///
/// The store write is the only step that can fail a mutation. Event and
/// projection failures are reported in [`Synced::downstream`] and repaired
/// later by the [`crate::OutboxRelay`]. When every downstream step succeeds
/// the mutation's outbox entry is acknowledged here so the relay skips it.
#[derive(Clone)]
pub struct OrderSynchronizer<S, P, X>
where
    S: OrderStore,
    P: EventPublisher,
    X: SearchProjector,
{
    store: S,
    publisher: P,
    projector: X,
    collection: String,
}

impl<S, P, X> OrderSynchronizer<S, P, X>
where
    S: OrderStore,
    P: EventPublisher,
    X: SearchProjector,
{
    /// Creates a synchronizer projecting into the default orders collection.
    pub fn new(store: S, publisher: P, projector: X) -> Self {
        Self {
            store,
            publisher,
            projector,
            collection: ORDERS_COLLECTION.to_string(),
        }
    }

    /// Projects into a different collection.
    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    pub fn projector(&self) -> &X {
        &self.projector
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Creates an order, announces it and indexes it.
    pub async fn create(&self, input: NewOrder) -> Result<Synced<Order>> {
        self.create_with_cancel(input, &CancellationToken::new()).await
    }

    #[tracing::instrument(skip(self, input, cancel), fields(items = input.items.len()))]
    pub async fn create_with_cancel(
        &self,
        input: NewOrder,
        cancel: &CancellationToken,
    ) -> Result<Synced<Order>> {
        let started = Instant::now();
        input.validate()?;
        ensure_not_cancelled(cancel)?;

        let committed = self.store.create(input).await?;
        let order = committed.value;
        tracing::info!(order_id = %order.id, "Order created");

        let mut downstream = Downstream::new(order.id, cancel);
        downstream
            .run(SyncStep::Publish, self.emit(LifecycleEvent::order_created(&order)))
            .await;
        downstream.run(SyncStep::Project, self.upsert(&order)).await;
        self.acknowledge(&mut downstream, committed.outbox_id).await;

        record_mutation("create", started);
        Ok(downstream.finish(order))
    }

    /// Loads one order from the store.
    pub async fn get(&self, id: OrderId) -> Result<Order> {
        Ok(self.store.get(id).await?)
    }

    /// Loads every order from the store.
    pub async fn list(&self) -> Result<Vec<Order>> {
        Ok(self.store.list().await?)
    }

    /// Merges `patch` into an existing order, announces the new status and
    /// re-indexes the full record.
    pub async fn update(&self, id: OrderId, patch: OrderPatch) -> Result<Synced<Order>> {
        self.update_with_cancel(id, patch, &CancellationToken::new()).await
    }

    #[tracing::instrument(skip(self, id, patch, cancel), fields(order_id = %id))]
    pub async fn update_with_cancel(
        &self,
        id: OrderId,
        patch: OrderPatch,
        cancel: &CancellationToken,
    ) -> Result<Synced<Order>> {
        let started = Instant::now();
        patch.validate()?;
        ensure_not_cancelled(cancel)?;

        self.store.get(id).await?;
        ensure_not_cancelled(cancel)?;

        let committed = self.store.update(id, patch).await?;
        let order = committed.value;
        tracing::info!(status = %order.status, version = %order.version, "Order updated");

        let mut downstream = Downstream::new(order.id, cancel);
        downstream
            .run(
                SyncStep::Publish,
                self.emit(LifecycleEvent::order_status_updated(&order)),
            )
            .await;
        downstream.run(SyncStep::Project, self.upsert(&order)).await;
        self.acknowledge(&mut downstream, committed.outbox_id).await;

        record_mutation("update", started);
        Ok(downstream.finish(order))
    }

    /// Removes an order and its search document. No event is published.
    pub async fn delete(&self, id: OrderId) -> Result<Synced<()>> {
        self.delete_with_cancel(id, &CancellationToken::new()).await
    }

    #[tracing::instrument(skip(self, id, cancel), fields(order_id = %id))]
    pub async fn delete_with_cancel(
        &self,
        id: OrderId,
        cancel: &CancellationToken,
    ) -> Result<Synced<()>> {
        let started = Instant::now();
        ensure_not_cancelled(cancel)?;

        self.store.get(id).await?;
        ensure_not_cancelled(cancel)?;

        let committed = self.store.delete(id).await?;
        tracing::info!("Order deleted");

        let mut downstream = Downstream::new(id, cancel);
        let doc_id = id.to_string();
        downstream
            .run(
                SyncStep::Project,
                self.projector.delete(&self.collection, &doc_id),
            )
            .await;
        self.acknowledge(&mut downstream, committed.outbox_id).await;

        record_mutation("delete", started);
        Ok(downstream.finish(()))
    }

    /// Compiles the filter parameters and runs them against the search index.
    pub async fn search(&self, params: &HashMap<String, String>) -> Result<Vec<OrderDocument>> {
        self.search_with_cancel(params, &CancellationToken::new()).await
    }

    #[tracing::instrument(skip(self, cancel))]
    pub async fn search_with_cancel(
        &self,
        params: &HashMap<String, String>,
        cancel: &CancellationToken,
    ) -> Result<Vec<OrderDocument>> {
        ensure_not_cancelled(cancel)?;
        let query = compile(params);

        tokio::select! {
            _ = cancel.cancelled() => Err(SyncError::Cancelled),
            hits = self.projector.query(&self.collection, &query) => {
                hits.map_err(|e| SyncError::UpstreamUnavailable(e.to_string()))
            }
        }
    }

    async fn emit(
        &self,
        event: std::result::Result<LifecycleEvent, serde_json::Error>,
    ) -> std::result::Result<(), PublishError> {
        let event = event?;
        self.publisher.emit(&event).await
    }

    async fn upsert(&self, order: &Order) -> order_search::Result<()> {
        let doc = OrderDocument::from(order);
        self.projector.upsert(&self.collection, &doc.id, &doc).await
    }

    async fn acknowledge(&self, downstream: &mut Downstream<'_>, outbox_id: OutboxId) {
        // Anything short of full success is left for the relay.
        if downstream.succeeded() {
            downstream
                .run(SyncStep::Acknowledge, self.store.mark_delivered(outbox_id))
                .await;
        }
    }
}
