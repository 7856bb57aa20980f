//! Order record and related types.

mod document;
mod events;
pub mod record;
mod status;
mod value_objects;

pub use document::OrderDocument;
pub use events::{LifecycleEvent, Topic};
pub use record::{NewOrder, Order, OrderPatch};
pub use status::OrderStatus;
pub use value_objects::{Money, OrderItem, ProductId};

use thiserror::Error;

/// Reasons an order mutation input is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    /// Order has no items.
    #[error("Order has no items")]
    NoItems,

    /// A line item has no product reference.
    #[error("Product ID is required")]
    ProductIdRequired,

    /// Invalid quantity.
    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: u32 },

    /// Invalid price.
    #[error("Invalid price: {price} (must not be negative)")]
    InvalidPrice { price: i64 },

    /// Line totals add up to more than a `Money` amount can hold.
    #[error("Order total exceeds the representable amount")]
    TotalOverflow,

    /// Status was supplied but empty.
    #[error("Status must not be blank")]
    BlankStatus,
}
