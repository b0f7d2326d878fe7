//! Shared domain types for the order replication pipeline.
//!
//! Every type here is a plain serde-able DTO with no behavior beyond simple
//! mapping helpers (`Exchange::from_vendor`, `OrderType::from_vendor`, ...).
//! Persistence and transport crates (`replicon-db`, `replicon-ingress`,
//! `replicon-worker`) build on these without redefining the domain.

mod enums;
mod event;
mod follower_relationship;
mod order;
mod order_map;
mod user;

pub use enums::*;
pub use event::*;
pub use follower_relationship::*;
pub use order::*;
pub use order_map::*;
pub use user::*;

/// Opaque row identifiers. The store assigns these; the core never constructs one.
pub type UserId = i64;
pub type OrderId = i64;
pub type FollowerRelationshipId = i64;
pub type OrderMapId = i64;
