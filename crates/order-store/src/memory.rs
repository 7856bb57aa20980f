//! In-memory order store for tests and benchmarks.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use domain::{NewOrder, Order, OrderPatch, order::record::now};
use tokio::sync::RwLock;

use crate::{
    Committed, OrderId, OutboxEntry, OutboxId, OutboxKind, Result, StoreError, store::OrderStore,
};

#[derive(Default)]
struct State {
    orders: HashMap<OrderId, Order>,
    outbox: Vec<OutboxEntry>,
}

impl State {
    fn append_outbox(&mut self, order_id: OrderId, kind: OutboxKind) -> OutboxId {
        let entry = OutboxEntry::new(order_id, kind, now());
        let id = entry.id;
        self.outbox.push(entry);
        id
    }
}

/// In-memory order store implementation for testing.
///
/// Orders and outbox live behind a single lock, so every mutation and its
/// outbox entry are applied together, mirroring the PostgreSQL transaction.
#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    state: Arc<RwLock<State>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryOrderStore {
    /// Creates a new empty in-memory order store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail with [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Returns the number of live orders.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }

    /// Returns every outbox entry, delivered or not, in insertion order.
    pub async fn outbox_entries(&self) -> Vec<OutboxEntry> {
        self.state.read().await.outbox.clone()
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "in-memory store switched off".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn create(&self, input: NewOrder) -> Result<Committed<Order>> {
        self.check_available()?;

        let mut state = self.state.write().await;
        let order = Order::create(OrderId::new(), input, now());
        state.orders.insert(order.id, order.clone());
        let outbox_id = state.append_outbox(order.id, OutboxKind::Created);

        Ok(Committed::new(order, outbox_id))
    }

    async fn get(&self, id: OrderId) -> Result<Order> {
        self.check_available()?;

        self.state
            .read()
            .await
            .orders
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn list(&self) -> Result<Vec<Order>> {
        self.check_available()?;

        let state = self.state.read().await;
        let mut orders: Vec<_> = state.orders.values().cloned().collect();
        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(orders)
    }

    async fn update(&self, id: OrderId, patch: OrderPatch) -> Result<Committed<Order>> {
        self.check_available()?;

        // The write guard is held across read, merge and write.
        let mut state = self.state.write().await;
        let order = state.orders.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        order.apply(patch, now());
        let order = order.clone();
        let outbox_id = state.append_outbox(id, OutboxKind::Updated);

        Ok(Committed::new(order, outbox_id))
    }

    async fn delete(&self, id: OrderId) -> Result<Committed<()>> {
        self.check_available()?;

        let mut state = self.state.write().await;
        state.orders.remove(&id).ok_or(StoreError::NotFound(id))?;
        let outbox_id = state.append_outbox(id, OutboxKind::Deleted);

        Ok(Committed::new((), outbox_id))
    }

    async fn pending_outbox(&self, limit: usize, max_attempts: u32) -> Result<Vec<OutboxEntry>> {
        self.check_available()?;

        let state = self.state.read().await;
        Ok(state
            .outbox
            .iter()
            .filter(|e| !e.is_delivered() && e.attempts < max_attempts)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn mark_delivered(&self, id: OutboxId) -> Result<()> {
        self.check_available()?;

        let mut state = self.state.write().await;
        if let Some(entry) = state.outbox.iter_mut().find(|e| e.id == id) {
            entry.delivered_at = Some(now());
        }
        Ok(())
    }

    async fn record_failure(&self, id: OutboxId, error: &str) -> Result<()> {
        self.check_available()?;

        let mut state = self.state.write().await;
        if let Some(entry) = state.outbox.iter_mut().find(|e| e.id == id) {
            entry.attempts += 1;
            entry.last_error = Some(error.to_string());
        }
        Ok(())
    }
}
