//! Shared types used across the order synchronization crates.

mod types;

pub use types::{OrderId, ParseOrderIdError, Version};
