//! Synchronizer error types.

use domain::{OrderError, OrderId};
use order_store::StoreError;
use thiserror::Error;

/// Failures surfaced to callers of the synchronizer.
///
/// Downstream (event bus, search index) failures on mutations are not
/// errors: they are reported in [`crate::Synced::downstream`].
#[derive(Debug, Error)]
pub enum SyncError {
    /// The order does not exist.
    #[error("Order not found: {0}")]
    NotFound(OrderId),

    /// The supplied fields were rejected before reaching the store.
    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] OrderError),

    /// The search engine could not answer a query.
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The order store failed.
    #[error("Order store error: {0}")]
    Store(StoreError),

    /// The operation was cancelled before the store was written.
    #[error("Operation cancelled")]
    Cancelled,
}

impl From<StoreError> for SyncError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => SyncError::NotFound(id),
            other => SyncError::Store(other),
        }
    }
}

/// Convenience type alias for synchronizer results.
pub type Result<T> = std::result::Result<T, SyncError>;
