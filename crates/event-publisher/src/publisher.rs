//! The event publishing seam.

use async_trait::async_trait;
use domain::LifecycleEvent;

use crate::Result;

/// Hands lifecycle events to the event bus.
///
/// Delivery is at-least-once and best-effort: a returned error means the
/// event may not have reached the bus. Implementations never retry on their
/// own; retrying is the caller's decision.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Emits one event to the topic it names.
    async fn emit(&self, event: &LifecycleEvent) -> Result<()>;
}

#[async_trait]
impl<T: EventPublisher + ?Sized> EventPublisher for std::sync::Arc<T> {
    async fn emit(&self, event: &LifecycleEvent) -> Result<()> {
        (**self).emit(event).await
    }
}
