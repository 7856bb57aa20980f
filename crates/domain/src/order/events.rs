//! Lifecycle events published to the event bus.

use serde::{Deserialize, Serialize};

use super::Order;

/// Event bus topics for order lifecycle notifications.
///
/// Deletes are not announced on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    OrderCreated,
    OrderStatusUpdated,
}

impl Topic {
    /// Returns the topic name as used on the bus.
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::OrderCreated => "order_created",
            Topic::OrderStatusUpdated => "order_status_updated",
        }
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize)]
struct OrderCreatedPayload<'a> {
    #[serde(rename = "orderId")]
    order_id: String,
    #[serde(flatten)]
    order: &'a Order,
}

#[derive(Serialize)]
struct StatusUpdatedPayload<'a> {
    #[serde(rename = "orderId")]
    order_id: String,
    status: &'a str,
}

/// A notification handed to the event bus.
///
/// Ownership ends once the event is handed to a publisher; nothing in the
/// core persists it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub topic: Topic,
    /// Partition key; the order id so that events for one order share a
    /// partition.
    pub key: String,
    pub payload: serde_json::Value,
}

impl LifecycleEvent {
    /// `order_created`: the order id plus the full stored record.
    pub fn order_created(order: &Order) -> Result<Self, serde_json::Error> {
        let payload = serde_json::to_value(OrderCreatedPayload {
            order_id: order.id.to_string(),
            order,
        })?;
        Ok(Self {
            topic: Topic::OrderCreated,
            key: order.id.to_string(),
            payload,
        })
    }

    /// `order_status_updated`: the order id and its current status.
    pub fn order_status_updated(order: &Order) -> Result<Self, serde_json::Error> {
        let payload = serde_json::to_value(StatusUpdatedPayload {
            order_id: order.id.to_string(),
            status: order.status.as_str(),
        })?;
        Ok(Self {
            topic: Topic::OrderStatusUpdated,
            key: order.id.to_string(),
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::{Money, NewOrder, OrderItem, record::now};
    use common::OrderId;

    fn sample_order() -> Order {
        Order::create(
            OrderId::new(),
            NewOrder::new(vec![OrderItem::new(
                "SKU-001",
                "Widget",
                2,
                Money::from_cents(1000),
            )]),
            now(),
        )
    }

    #[test]
    fn test_topic_names() {
        assert_eq!(Topic::OrderCreated.as_str(), "order_created");
        assert_eq!(Topic::OrderStatusUpdated.to_string(), "order_status_updated");
    }

    #[test]
    fn test_order_created_carries_full_record() {
        let order = sample_order();
        let event = LifecycleEvent::order_created(&order).unwrap();

        assert_eq!(event.topic, Topic::OrderCreated);
        assert_eq!(event.key, order.id.to_string());
        assert_eq!(event.payload["orderId"], order.id.to_string());
        assert_eq!(event.payload["id"], order.id.to_string());
        assert_eq!(event.payload["status"], "created");
        assert_eq!(event.payload["items"][0]["product_id"], "SKU-001");
    }

    #[test]
    fn test_status_updated_carries_only_id_and_status() {
        let order = sample_order();
        let event = LifecycleEvent::order_status_updated(&order).unwrap();

        assert_eq!(event.topic, Topic::OrderStatusUpdated);
        assert_eq!(
            event.payload,
            serde_json::json!({"orderId": order.id.to_string(), "status": "created"})
        );
    }
}
