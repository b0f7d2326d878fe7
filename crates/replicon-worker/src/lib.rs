//! Order Worker: the durable consumer dispatching normalized order
//! events to per-follower replication fan-out.

pub mod consumer;
pub mod context;
pub mod error;
pub mod handlers;
pub mod quantity;
pub mod should_replicate;
pub mod token_refresher;

pub use context::WorkerContext;
pub use error::WorkerError;
pub use should_replicate::{AlwaysReplicate, ShouldReplicate};
