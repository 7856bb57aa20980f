//! Keeps the order store, the event bus and the search index in step.
//!
//! - [`OrderSynchronizer`] runs every mutation as store write, event, projection
//! - [`OutboxRelay`] replays mutations whose downstream steps did not finish
//! - [`Synced`] carries a committed value together with any downstream failures

pub mod error;
pub mod outcome;
pub mod relay;
pub mod retry;
pub mod synchronizer;

pub use error::{Result, SyncError};
pub use outcome::{DownstreamFailure, FailureReason, SyncStep, Synced};
pub use relay::{OutboxRelay, RelayConfig, RelayReport};
pub use retry::{RetryConfig, retry_with_backoff};
pub use synchronizer::OrderSynchronizer;
