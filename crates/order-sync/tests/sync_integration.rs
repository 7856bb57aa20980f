//! End-to-end synchronization over the in-memory collaborators.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use domain::{
    LifecycleEvent, Money, NewOrder, OrderDocument, OrderError, OrderId, OrderItem, OrderPatch,
    OrderStatus, Topic,
};
use event_publisher::{EventPublisher, InMemoryEventPublisher};
use order_search::{
    InMemorySearchIndex, ORDERS_COLLECTION, Result as SearchResult, SearchError, SearchProjector,
    SearchQuery,
};
use order_store::{InMemoryOrderStore, OrderStore};
use order_sync::{
    FailureReason, OrderSynchronizer, OutboxRelay, RelayConfig, RetryConfig, SyncError, SyncStep,
};
use tokio_util::sync::CancellationToken;

type Synchronizer<P = InMemoryEventPublisher> =
    OrderSynchronizer<InMemoryOrderStore, P, InMemorySearchIndex>;

struct Harness {
    store: InMemoryOrderStore,
    publisher: InMemoryEventPublisher,
    index: InMemorySearchIndex,
    sync: Synchronizer,
}

impl Harness {
    fn new() -> Self {
        let store = InMemoryOrderStore::new();
        let publisher = InMemoryEventPublisher::new();
        let index = InMemorySearchIndex::new();
        let sync = OrderSynchronizer::new(store.clone(), publisher.clone(), index.clone());
        Self {
            store,
            publisher,
            index,
            sync,
        }
    }

    fn relay(
        &self,
        max_attempts: u32,
    ) -> OutboxRelay<InMemoryOrderStore, InMemoryEventPublisher, InMemorySearchIndex> {
        self.relay_with(relay_config(max_attempts), self.index.clone())
    }

    fn relay_with<X: SearchProjector>(
        &self,
        config: RelayConfig,
        projector: X,
    ) -> OutboxRelay<InMemoryOrderStore, InMemoryEventPublisher, X> {
        OutboxRelay::new(
            self.store.clone(),
            self.publisher.clone(),
            projector,
            config,
        )
    }

    async fn search(&self, pairs: &[(&str, &str)]) -> Vec<String> {
        let params: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.sync
            .search(&params)
            .await
            .unwrap()
            .into_iter()
            .map(|doc| doc.id)
            .collect()
    }
}

fn relay_config(max_attempts: u32) -> RelayConfig {
    RelayConfig {
        batch_size: 10,
        poll_interval: Duration::from_millis(10),
        max_attempts,
        grace_period: Duration::ZERO,
        retry: RetryConfig::once(),
    }
}

fn new_order() -> NewOrder {
    NewOrder::new(vec![
        OrderItem::new("SKU-001", "Widget", 2, Money::from_cents(1000)),
        OrderItem::new("SKU-002", "Gadget", 1, Money::from_cents(450)),
    ])
}

/// Publisher that cancels the caller's token while handling an event.
struct CancellingPublisher {
    inner: InMemoryEventPublisher,
    token: CancellationToken,
}

#[async_trait]
impl EventPublisher for CancellingPublisher {
    async fn emit(&self, event: &LifecycleEvent) -> event_publisher::Result<()> {
        let result = self.inner.emit(event).await;
        self.token.cancel();
        result
    }
}

/// Index on which a concurrent delete of the order completes (store row,
/// document and outbox acknowledgement) just before the first upsert lands.
struct DeleteRacingIndex {
    inner: InMemorySearchIndex,
    store: InMemoryOrderStore,
    raced: AtomicBool,
}

#[async_trait]
impl SearchProjector for DeleteRacingIndex {
    async fn upsert(&self, collection: &str, id: &str, doc: &OrderDocument) -> SearchResult<()> {
        if !self.raced.swap(true, Ordering::SeqCst) {
            let order_id = id
                .parse::<OrderId>()
                .map_err(|e| SearchError::Unavailable(format!("bad order id: {e}")))?;
            let deleted = self
                .store
                .delete(order_id)
                .await
                .map_err(|e| SearchError::Unavailable(e.to_string()))?;
            self.inner.delete(collection, id).await?;
            self.store
                .mark_delivered(deleted.outbox_id)
                .await
                .map_err(|e| SearchError::Unavailable(e.to_string()))?;
        }
        self.inner.upsert(collection, id, doc).await
    }

    async fn delete(&self, collection: &str, id: &str) -> SearchResult<()> {
        self.inner.delete(collection, id).await
    }

    async fn query(
        &self,
        collection: &str,
        query: &SearchQuery,
    ) -> SearchResult<Vec<OrderDocument>> {
        self.inner.query(collection, query).await
    }
}

#[tokio::test]
async fn create_then_get_returns_stored_fields() {
    let h = Harness::new();

    let synced = h.sync.create(new_order()).await.unwrap();
    assert!(synced.is_fully_synced());

    let order = h.sync.get(synced.value.id).await.unwrap();
    assert_eq!(order, synced.value);
    assert_eq!(order.total.cents(), 2450);
    assert_eq!(order.status, OrderStatus::created());

    let events = h.publisher.events_for(Topic::OrderCreated);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].payload["orderId"], order.id.to_string());

    let doc = h
        .index
        .document(ORDERS_COLLECTION, &order.id.to_string())
        .unwrap();
    assert_eq!(doc.status, "created");
    assert_eq!(doc.items, order.items);
}

#[tokio::test]
async fn status_update_leaves_other_fields_untouched() {
    let h = Harness::new();
    let created = h.sync.create(new_order()).await.unwrap().value;

    let updated = h
        .sync
        .update(created.id, OrderPatch::status("paid"))
        .await
        .unwrap();
    assert!(updated.is_fully_synced());

    let order = h.sync.get(created.id).await.unwrap();
    assert_eq!(order.status.as_str(), "paid");
    assert_eq!(order.items, created.items);
    assert_eq!(order.total, created.total);
    assert_eq!(order.created_at, created.created_at);

    let events = h.publisher.events_for(Topic::OrderStatusUpdated);
    assert_eq!(
        events[0].payload,
        serde_json::json!({"orderId": created.id.to_string(), "status": "paid"})
    );
    assert_eq!(
        h.index
            .document(ORDERS_COLLECTION, &created.id.to_string())
            .unwrap()
            .status,
        "paid"
    );
}

#[tokio::test]
async fn update_of_missing_order_fails_fast() {
    let h = Harness::new();

    let result = h
        .sync
        .update(OrderId::new(), OrderPatch::status("paid"))
        .await;

    assert!(matches!(result, Err(SyncError::NotFound(_))));
    assert_eq!(h.publisher.event_count(), 0);
}

#[tokio::test]
async fn blank_status_is_rejected() {
    let h = Harness::new();
    let created = h.sync.create(new_order()).await.unwrap().value;

    let result = h.sync.update(created.id, OrderPatch::status("  ")).await;

    assert!(matches!(result, Err(SyncError::ValidationFailed(_))));
    assert_eq!(h.sync.get(created.id).await.unwrap(), created);
}

#[tokio::test]
async fn overflowing_total_is_rejected_before_the_store() {
    let h = Harness::new();
    let input = NewOrder::new(vec![OrderItem::new(
        "SKU-001",
        "Widget",
        4,
        Money::from_cents(i64::MAX / 2),
    )]);

    let result = h.sync.create(input).await;

    assert!(matches!(
        result,
        Err(SyncError::ValidationFailed(OrderError::TotalOverflow))
    ));
    assert_eq!(h.store.order_count().await, 0);
    assert_eq!(h.publisher.event_count(), 0);
}

#[tokio::test]
async fn delete_removes_record_and_document_without_event() {
    let h = Harness::new();
    let created = h.sync.create(new_order()).await.unwrap().value;
    let events_before = h.publisher.event_count();

    let synced = h.sync.delete(created.id).await.unwrap();
    assert!(synced.is_fully_synced());

    assert!(matches!(
        h.sync.get(created.id).await,
        Err(SyncError::NotFound(_))
    ));
    assert!(matches!(
        h.sync.delete(created.id).await,
        Err(SyncError::NotFound(_))
    ));
    assert_eq!(h.index.document_count(ORDERS_COLLECTION), 0);
    assert_eq!(h.publisher.event_count(), events_before);
}

#[tokio::test]
async fn list_reads_from_the_store() {
    let h = Harness::new();
    h.index.set_fail_on_upsert(true);
    h.sync.create(new_order()).await.unwrap();
    h.sync.create(new_order()).await.unwrap();

    assert_eq!(h.sync.list().await.unwrap().len(), 2);
}

#[tokio::test]
async fn search_follows_status_changes() {
    let h = Harness::new();
    let id = h.sync.create(new_order()).await.unwrap().value.id.to_string();

    assert_eq!(h.search(&[("status", "created")]).await, vec![id.clone()]);

    h.sync
        .update(id.parse().unwrap(), OrderPatch::status("shipped"))
        .await
        .unwrap();

    assert!(h.search(&[("status", "created")]).await.is_empty());
    assert_eq!(h.search(&[("status", "shipped")]).await, vec![id.clone()]);
    assert_eq!(h.search(&[("item", "SKU-002")]).await, vec![id.clone()]);
    assert_eq!(h.search(&[("id", id.as_str())]).await, vec![id.clone()]);
}

#[tokio::test]
async fn search_failure_is_upstream_unavailable() {
    let h = Harness::new();
    h.index.set_fail_on_query(true);

    let result = h.sync.search(&HashMap::new()).await;

    assert!(matches!(result, Err(SyncError::UpstreamUnavailable(_))));
}

#[tokio::test]
async fn projection_failure_is_reported_and_order_survives() {
    let h = Harness::new();
    h.index.set_fail_on_upsert(true);

    let synced = h.sync.create(new_order()).await.unwrap();

    assert_eq!(synced.downstream.len(), 1);
    assert_eq!(synced.downstream[0].step, SyncStep::Project);
    assert!(matches!(
        synced.downstream[0].reason,
        FailureReason::Unavailable(_)
    ));
    assert_eq!(h.sync.get(synced.value.id).await.unwrap(), synced.value);
    assert_eq!(h.publisher.event_count(), 1);
}

#[tokio::test]
async fn relay_repairs_a_failed_projection() {
    let h = Harness::new();
    h.index.set_fail_on_upsert(true);
    let order = h.sync.create(new_order()).await.unwrap().value;

    h.index.set_fail_on_upsert(false);
    let report = h.relay(5).run_once().await.unwrap();

    assert_eq!(report.delivered, 1);
    assert_eq!(h.search(&[("status", "created")]).await, vec![order.id.to_string()]);
    assert!(h.store.pending_outbox(10, 5).await.unwrap().is_empty());
}

#[tokio::test]
async fn relay_re_emits_a_failed_event() {
    let h = Harness::new();
    h.publisher.set_fail(true);
    let created = h.sync.create(new_order()).await.unwrap().value;
    let synced = h
        .sync
        .update(created.id, OrderPatch::status("paid"))
        .await
        .unwrap();
    assert!(synced.failed(SyncStep::Publish));

    h.publisher.set_fail(false);
    let report = h.relay(5).run_once().await.unwrap();

    assert_eq!(report.delivered, 2);
    assert_eq!(h.publisher.events_for(Topic::OrderCreated).len(), 1);
    let updates = h.publisher.events_for(Topic::OrderStatusUpdated);
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].payload["status"], "paid");
}

#[tokio::test]
async fn relay_removes_projection_of_deleted_order() {
    let h = Harness::new();
    let created = h.sync.create(new_order()).await.unwrap().value;
    h.index.set_fail_on_delete(true);
    let synced = h.sync.delete(created.id).await.unwrap();
    assert!(synced.failed(SyncStep::Project));
    assert_eq!(h.index.document_count(ORDERS_COLLECTION), 1);

    h.index.set_fail_on_delete(false);
    h.relay(5).run_once().await.unwrap();

    assert_eq!(h.index.document_count(ORDERS_COLLECTION), 0);
}

#[tokio::test]
async fn relay_leaves_exhausted_entries_as_dead_letters() {
    let h = Harness::new();
    h.index.set_fail_on_upsert(true);
    h.sync.create(new_order()).await.unwrap();
    let relay = h.relay(2);

    let first = relay.run_once().await.unwrap();
    assert_eq!((first.failed, first.dead_lettered), (1, 0));

    let second = relay.run_once().await.unwrap();
    assert_eq!((second.failed, second.dead_lettered), (1, 1));

    let third = relay.run_once().await.unwrap();
    assert_eq!(third.processed(), 0);

    let entries = h.store.outbox_entries().await;
    assert_eq!(entries[0].attempts, 2);
    assert!(!entries[0].is_delivered());
}

#[tokio::test]
async fn relay_loop_waits_a_poll_interval_after_failures() {
    let h = Harness::new();
    h.index.set_fail_on_upsert(true);
    h.sync.create(new_order()).await.unwrap();

    let relay = h.relay_with(
        RelayConfig {
            batch_size: 1,
            poll_interval: Duration::from_secs(5),
            ..relay_config(10)
        },
        h.index.clone(),
    );
    let shutdown = CancellationToken::new();
    let stop = async {
        tokio::time::sleep(Duration::from_millis(200)).await;
        shutdown.cancel();
    };
    tokio::join!(relay.run(shutdown.clone()), stop);

    let entries = h.store.outbox_entries().await;
    assert_eq!(entries[0].attempts, 1);
    assert!(!entries[0].is_delivered());
}

#[tokio::test]
async fn relay_does_not_restore_projection_of_order_deleted_mid_delivery() {
    let h = Harness::new();
    h.index.set_fail_on_upsert(true);
    h.sync.create(new_order()).await.unwrap();
    h.index.set_fail_on_upsert(false);

    let racing = DeleteRacingIndex {
        inner: h.index.clone(),
        store: h.store.clone(),
        raced: AtomicBool::new(false),
    };
    let report = h.relay_with(relay_config(5), racing).run_once().await.unwrap();

    assert_eq!(report.delivered, 1);
    assert_eq!(h.store.order_count().await, 0);
    assert_eq!(h.index.document_count(ORDERS_COLLECTION), 0);
    assert!(h.store.pending_outbox(10, 5).await.unwrap().is_empty());
}

#[tokio::test]
async fn relay_loop_stops_on_shutdown() {
    let h = Harness::new();
    h.index.set_fail_on_upsert(true);
    h.sync.create(new_order()).await.unwrap();
    h.index.set_fail_on_upsert(false);

    let relay = h.relay(5);
    let shutdown = CancellationToken::new();
    let task = tokio::spawn({
        let shutdown = shutdown.clone();
        async move { relay.run(shutdown).await }
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(h.index.document_count(ORDERS_COLLECTION), 1);
}

#[tokio::test]
async fn cancelled_before_store_write_changes_nothing() {
    let h = Harness::new();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = h.sync.create_with_cancel(new_order(), &cancel).await;

    assert!(matches!(result, Err(SyncError::Cancelled)));
    assert_eq!(h.store.order_count().await, 0);
    assert_eq!(h.publisher.event_count(), 0);
}

#[tokio::test]
async fn cancelled_after_store_write_reports_skipped_steps() {
    let store = InMemoryOrderStore::new();
    let index = InMemorySearchIndex::new();
    let recorded = InMemoryEventPublisher::new();
    let cancel = CancellationToken::new();
    let sync: Synchronizer<CancellingPublisher> = OrderSynchronizer::new(
        store.clone(),
        CancellingPublisher {
            inner: recorded.clone(),
            token: cancel.clone(),
        },
        index.clone(),
    );

    let synced = sync.create_with_cancel(new_order(), &cancel).await.unwrap();

    assert!(!synced.failed(SyncStep::Publish));
    assert_eq!(synced.downstream.len(), 1);
    assert_eq!(synced.downstream[0].step, SyncStep::Project);
    assert_eq!(synced.downstream[0].reason, FailureReason::Cancelled);
    assert_eq!(recorded.event_count(), 1);
    assert_eq!(index.document_count(ORDERS_COLLECTION), 0);
    assert_eq!(store.get(synced.value.id).await.unwrap(), synced.value);
}

#[tokio::test]
async fn cancelled_search_returns_cancelled() {
    let h = Harness::new();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = h.sync.search_with_cancel(&HashMap::new(), &cancel).await;

    assert!(matches!(result, Err(SyncError::Cancelled)));
}
