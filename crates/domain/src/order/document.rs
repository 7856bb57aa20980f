//! Search projection of an order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Money, Order, OrderItem};

/// Denormalized copy of an order held by the search index.
///
/// Derived from the stored [`Order`] and never authoritative: it is replaced
/// wholesale on every create or update and removed on delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDocument {
    pub id: String,
    pub items: Vec<OrderItem>,
    pub status: String,
    pub total: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Order> for OrderDocument {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id.to_string(),
            items: order.items.clone(),
            status: order.status.as_str().to_string(),
            total: order.total,
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}
