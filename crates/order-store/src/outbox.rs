//! Outbox records written in the same transaction as each order mutation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::OrderId;

/// Unique identifier for an outbox entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutboxId(Uuid);

impl OutboxId {
    /// Creates a new random outbox ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an outbox ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for OutboxId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for OutboxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which mutation produced an outbox entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutboxKind {
    Created,
    Updated,
    Deleted,
}

impl OutboxKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboxKind::Created => "created",
            OutboxKind::Updated => "updated",
            OutboxKind::Deleted => "deleted",
        }
    }

    /// Parses the stored column value.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "created" => Some(OutboxKind::Created),
            "updated" => Some(OutboxKind::Updated),
            "deleted" => Some(OutboxKind::Deleted),
            _ => None,
        }
    }
}

impl std::fmt::Display for OutboxKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pending (or delivered) propagation of one order mutation.
///
/// The entry only references the order; whoever drains it re-reads the
/// current record so that the store always wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboxEntry {
    pub id: OutboxId,
    pub order_id: OrderId,
    pub kind: OutboxKind,
    pub created_at: DateTime<Utc>,
    /// Failed relay attempts so far.
    pub attempts: u32,
    pub last_error: Option<String>,
    pub delivered_at: Option<DateTime<Utc>>,
}

impl OutboxEntry {
    pub fn new(order_id: OrderId, kind: OutboxKind, created_at: DateTime<Utc>) -> Self {
        Self {
            id: OutboxId::new(),
            order_id,
            kind,
            created_at,
            attempts: 0,
            last_error: None,
            delivered_at: None,
        }
    }

    pub fn is_delivered(&self) -> bool {
        self.delivered_at.is_some()
    }
}

/// The result of a committed mutation together with its outbox entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Committed<T> {
    pub value: T,
    pub outbox_id: OutboxId,
}

impl<T> Committed<T> {
    pub fn new(value: T, outbox_id: OutboxId) -> Self {
        Self { value, outbox_id }
    }
}
