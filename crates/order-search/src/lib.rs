//! Search projection of orders.
//!
//! This crate provides:
//! - [`compile`], the total mapping from client filter parameters to a [`SearchQuery`]
//! - [`SearchProjector`], the seam for maintaining and querying order documents
//! - [`InMemorySearchIndex`] for tests and [`ElasticsearchProjector`] for production

pub mod compiler;
pub mod elasticsearch;
pub mod error;
pub mod memory;
pub mod projector;
pub mod query;

pub use compiler::compile;
pub use elasticsearch::ElasticsearchProjector;
pub use error::{Result, SearchError};
pub use memory::InMemorySearchIndex;
pub use projector::{ORDERS_COLLECTION, SearchProjector};
pub use query::{Clause, DateBound, ExactField, SearchQuery};
