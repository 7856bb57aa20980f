//! The authoritative order record and its mutation inputs.

use chrono::{DateTime, SubsecRound, Utc};
use common::{OrderId, Version};
use serde::{Deserialize, Serialize};

use super::{Money, OrderError, OrderItem, OrderStatus};

/// Timestamps are kept at microsecond precision so that a record read back
/// from Postgres compares equal to the one that was written.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// An order as held by the order store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub items: Vec<OrderItem>,
    pub status: OrderStatus,
    /// Sum of `quantity * unit_price` over all items.
    pub total: Money,
    pub version: Version,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Builds the first revision of an order from creation input.
    pub fn create(id: OrderId, input: NewOrder, at: DateTime<Utc>) -> Self {
        let total = total_of(&input.items);
        Self {
            id,
            items: input.items,
            status: input.status.unwrap_or_default(),
            total,
            version: Version::first(),
            created_at: at,
            updated_at: at,
        }
    }

    /// Merges the supplied fields into this record.
    ///
    /// Fields absent from the patch are left untouched. The total is
    /// recomputed, the version advances and `updated_at` moves to `at`.
    pub fn apply(&mut self, patch: OrderPatch, at: DateTime<Utc>) {
        if let Some(items) = patch.items {
            self.items = items;
            self.total = total_of(&self.items);
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        self.version = self.version.next();
        self.updated_at = at;
    }
}

fn total_of(items: &[OrderItem]) -> Money {
    items.iter().map(OrderItem::total_price).sum()
}

fn checked_total(items: &[OrderItem]) -> Option<Money> {
    items.iter().try_fold(Money::zero(), |total, item| {
        total.checked_add(item.unit_price.checked_multiply(item.quantity)?)
    })
}

fn validate_items(items: &[OrderItem]) -> Result<(), OrderError> {
    if items.is_empty() {
        return Err(OrderError::NoItems);
    }
    for item in items {
        if item.product_id.as_str().trim().is_empty() {
            return Err(OrderError::ProductIdRequired);
        }
        if item.quantity == 0 {
            return Err(OrderError::InvalidQuantity {
                quantity: item.quantity,
            });
        }
        if item.unit_price.is_negative() {
            return Err(OrderError::InvalidPrice {
                price: item.unit_price.cents(),
            });
        }
    }
    if checked_total(items).is_none() {
        return Err(OrderError::TotalOverflow);
    }
    Ok(())
}

/// Fields supplied when creating an order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NewOrder {
    pub items: Vec<OrderItem>,
    /// Initial status; `created` when omitted.
    #[serde(default)]
    pub status: Option<OrderStatus>,
}

impl NewOrder {
    pub fn new(items: Vec<OrderItem>) -> Self {
        Self {
            items,
            status: None,
        }
    }

    pub fn with_status(mut self, status: impl Into<OrderStatus>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Checks the input before it reaches the store.
    pub fn validate(&self) -> Result<(), OrderError> {
        validate_items(&self.items)?;
        if self.status.as_ref().is_some_and(OrderStatus::is_blank) {
            return Err(OrderError::BlankStatus);
        }
        Ok(())
    }
}

/// Partial update of an order; `None` fields are left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OrderPatch {
    #[serde(default)]
    pub items: Option<Vec<OrderItem>>,
    #[serde(default)]
    pub status: Option<OrderStatus>,
}

impl OrderPatch {
    /// A patch that only changes the status.
    pub fn status(status: impl Into<OrderStatus>) -> Self {
        Self {
            items: None,
            status: Some(status.into()),
        }
    }

    /// A patch that only replaces the line items.
    pub fn items(items: Vec<OrderItem>) -> Self {
        Self {
            items: Some(items),
            status: None,
        }
    }

    pub fn with_status(mut self, status: impl Into<OrderStatus>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Returns true if the patch carries no fields.
    pub fn is_empty(&self) -> bool {
        self.items.is_none() && self.status.is_none()
    }

    /// Checks the supplied fields.
    pub fn validate(&self) -> Result<(), OrderError> {
        if let Some(items) = &self.items {
            validate_items(items)?;
        }
        if self.status.as_ref().is_some_and(OrderStatus::is_blank) {
            return Err(OrderError::BlankStatus);
        }
        Ok(())
    }
}
