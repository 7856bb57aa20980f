//! Event publishing for order lifecycle notifications.
//!
//! The [`EventPublisher`] trait is the seam used by the synchronizer.
//! Backends:
//! - [`InMemoryEventPublisher`] for tests
//! - [`RestProxyEventPublisher`] for Kafka-compatible HTTP proxies
//! - `KafkaEventPublisher` (feature `kafka`) for a native producer

pub mod error;
#[cfg(feature = "kafka")]
pub mod kafka;
pub mod memory;
pub mod publisher;
pub mod rest_proxy;

pub use error::{PublishError, Result};
#[cfg(feature = "kafka")]
pub use kafka::KafkaEventPublisher;
pub use memory::InMemoryEventPublisher;
pub use publisher::EventPublisher;
pub use rest_proxy::RestProxyEventPublisher;
