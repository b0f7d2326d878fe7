use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{OrderId, OrderSide, OrderStatus, OrderType, UserId};

/// `Order`. Covers both master orders (`is_master = true`,
/// `parent_master_order_id = None`) and follower orders (`is_master =
/// false`, `parent_master_order_id = Some(master_order_id)`).
///
/// Invariants (enforced in `replicon-db` at the SQL layer, not here):
/// `filled_qty <= requested_qty`; a follower order's
/// `parent_master_order_id` is non-null; `broker_order_id` is unique among
/// non-null values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub owner_user_id: UserId,
    pub is_master: bool,
    pub parent_master_order_id: Option<OrderId>,
    pub symbol: String,
    pub scrip_code: Option<String>,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub requested_qty: i64,
    pub price: Option<Decimal>,
    pub filled_qty: i64,
    pub average_price: Option<Decimal>,
    pub status: OrderStatus,
    pub broker_order_id: Option<String>,
    pub exchange_order_id: Option<String>,
    pub error_message: Option<String>,
    /// Milliseconds from event receipt to terminal replication outcome for
    /// this order. Populated by the worker on SUCCESS or FAILED; `None`
    /// while still in flight.
    pub replication_latency_ms: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn is_follower(&self) -> bool {
        !self.is_master
    }

    /// Invariant: `filled_qty <= requested_qty` at every observable
    /// instant. Exposed so callers can assert it in tests without
    /// reimplementing the comparison.
    pub fn fill_invariant_holds(&self) -> bool {
        self.filled_qty <= self.requested_qty
    }

    /// Invariant: every follower order references an existing master
    /// order via a non-null parent id.
    pub fn follower_invariant_holds(&self) -> bool {
        !self.is_follower() || self.parent_master_order_id.is_some()
    }
}

/// Fields a master-order upsert may change.
/// `None` means "leave unchanged" for that field.
#[derive(Debug, Clone, Default)]
pub struct MasterOrderPatch {
    pub filled_qty: Option<i64>,
    pub average_price: Option<Decimal>,
    pub exchange_order_id: Option<String>,
    pub status: Option<OrderStatus>,
}

/// A brand-new row for a master order seen for the first time. Used by
/// `orders.upsert_master` when no existing row matches
/// `(owner_user_id, broker_order_id)`.
#[derive(Debug, Clone)]
pub struct NewMasterOrder {
    pub owner_user_id: UserId,
    pub symbol: String,
    pub scrip_code: Option<String>,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub requested_qty: i64,
    pub price: Option<Decimal>,
    pub broker_order_id: String,
    pub exchange_order_id: Option<String>,
    pub status: OrderStatus,
}

/// A new follower order row created by the Order Worker on a successful
/// NEW fan-out.
#[derive(Debug, Clone)]
pub struct NewFollowerOrder {
    pub owner_user_id: UserId,
    pub parent_master_order_id: OrderId,
    pub symbol: String,
    pub scrip_code: Option<String>,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub requested_qty: i64,
    pub price: Option<Decimal>,
    pub broker_order_id: String,
    pub exchange_order_id: Option<String>,
}

/// Fields a follower order's MODIFY/CANCEL/FILL handling may update.
#[derive(Debug, Clone, Default)]
pub struct FollowerOrderPatch {
    pub price: Option<Decimal>,
    pub filled_qty: Option<i64>,
    pub average_price: Option<Decimal>,
    pub status: Option<OrderStatus>,
    pub error_message: Option<String>,
    pub replication_latency_ms: Option<i64>,
}
