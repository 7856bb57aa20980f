//! Order status.

use serde::{Deserialize, Serialize};

/// Lifecycle status of an order.
///
/// The set of statuses is open: downstream services introduce their own
/// values, so the status is carried as an opaque string. The well-known
/// values are exposed as constructors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderStatus(String);

impl OrderStatus {
    pub const CREATED: &'static str = "created";
    pub const PAID: &'static str = "paid";
    pub const SHIPPED: &'static str = "shipped";
    pub const CANCELLED: &'static str = "cancelled";

    /// Creates a status from any string value.
    pub fn new(status: impl Into<String>) -> Self {
        Self(status.into())
    }

    pub fn created() -> Self {
        Self::new(Self::CREATED)
    }

    pub fn paid() -> Self {
        Self::new(Self::PAID)
    }

    pub fn shipped() -> Self {
        Self::new(Self::SHIPPED)
    }

    pub fn cancelled() -> Self {
        Self::new(Self::CANCELLED)
    }

    /// Returns true if the status has no visible characters.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Returns the status as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        Self::created()
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for OrderStatus {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for OrderStatus {
    fn from(s: String) -> Self {
        Self(s)
    }
}
