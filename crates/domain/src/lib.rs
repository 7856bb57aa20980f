//! Domain types for the order synchronization workspace.
//!
//! This crate provides:
//! - [`Order`], the authoritative record, with [`NewOrder`] and [`OrderPatch`] inputs
//! - [`OrderDocument`], the search projection of an order
//! - [`LifecycleEvent`] and its bus [`Topic`]s

pub mod order;

pub use common::{OrderId, Version};
pub use order::{
    LifecycleEvent, Money, NewOrder, Order, OrderDocument, OrderError, OrderItem, OrderPatch,
    OrderStatus, ProductId, Topic,
};
