//! The search projection seam.

use async_trait::async_trait;
use domain::OrderDocument;

use crate::{Result, SearchQuery};

/// Default collection (index) holding order documents.
pub const ORDERS_COLLECTION: &str = "orders";

/// Maintains denormalized order documents in a search engine.
///
/// The projector holds no merge logic: callers always supply the complete
/// document, and the latest write for an id wins.
#[async_trait]
pub trait SearchProjector: Send + Sync {
    /// Creates or replaces the document stored under `id`.
    async fn upsert(&self, collection: &str, id: &str, doc: &OrderDocument) -> Result<()>;

    /// Removes the document stored under `id`. A missing document is not an error.
    async fn delete(&self, collection: &str, id: &str) -> Result<()>;

    /// Returns every document matching the query.
    async fn query(&self, collection: &str, query: &SearchQuery) -> Result<Vec<OrderDocument>>;
}

#[async_trait]
impl<T: SearchProjector + ?Sized> SearchProjector for std::sync::Arc<T> {
    async fn upsert(&self, collection: &str, id: &str, doc: &OrderDocument) -> Result<()> {
        (**self).upsert(collection, id, doc).await
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        (**self).delete(collection, id).await
    }

    async fn query(&self, collection: &str, query: &SearchQuery) -> Result<Vec<OrderDocument>> {
        (**self).query(collection, query).await
    }
}
