//! The order store seam.

use async_trait::async_trait;
use domain::{NewOrder, Order, OrderPatch};

use crate::{Committed, OrderId, OutboxEntry, OutboxId, Result, StoreError};

/// Core trait for order store implementations.
///
/// The order store owns the authoritative order state. Every mutation also
/// appends an [`OutboxEntry`] atomically with the change it describes.
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persists a new order under a freshly assigned identifier.
    async fn create(&self, input: NewOrder) -> Result<Committed<Order>>;

    /// Loads an order.
    ///
    /// Fails with [`StoreError::NotFound`] if the identifier does not exist.
    async fn get(&self, id: OrderId) -> Result<Order>;

    /// Loads all orders, oldest first.
    async fn list(&self) -> Result<Vec<Order>>;

    /// Merges `patch` into the current record and persists the result.
    ///
    /// The read, merge and write happen atomically with respect to other
    /// writers of the same identifier.
    async fn update(&self, id: OrderId, patch: OrderPatch) -> Result<Committed<Order>>;

    /// Removes an order.
    ///
    /// Fails with [`StoreError::NotFound`] if the identifier does not exist.
    async fn delete(&self, id: OrderId) -> Result<Committed<()>>;

    /// Returns undelivered outbox entries with fewer than `max_attempts`
    /// recorded failures, oldest first.
    ///
    /// Entries at `max_attempts` stay in the outbox as dead letters.
    async fn pending_outbox(&self, limit: usize, max_attempts: u32) -> Result<Vec<OutboxEntry>>;

    /// Marks an outbox entry as fully propagated.
    async fn mark_delivered(&self, id: OutboxId) -> Result<()>;

    /// Records a failed propagation attempt for an outbox entry.
    async fn record_failure(&self, id: OutboxId, error: &str) -> Result<()>;
}

/// Extension trait providing convenience methods for order stores.
#[async_trait]
pub trait OrderStoreExt: OrderStore {
    /// Loads an order, returning None instead of `NotFound`.
    async fn find(&self, id: OrderId) -> Result<Option<Order>> {
        match self.get(id).await {
            Ok(order) => Ok(Some(order)),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Checks if an order exists.
    async fn exists(&self, id: OrderId) -> Result<bool> {
        Ok(self.find(id).await?.is_some())
    }
}

// Blanket implementation for all OrderStore implementations
impl<T: OrderStore + ?Sized> OrderStoreExt for T {}
