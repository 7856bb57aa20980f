//! Authoritative order storage with a transactional outbox.

pub mod error;
pub mod memory;
pub mod outbox;
pub mod postgres;
pub mod store;

pub use common::{OrderId, Version};
pub use error::{Result, StoreError};
pub use memory::InMemoryOrderStore;
pub use outbox::{Committed, OutboxEntry, OutboxId, OutboxKind};
pub use postgres::PostgresOrderStore;
pub use store::{OrderStore, OrderStoreExt};
