use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{OrderId, OrderMapId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReplicationStatus {
    Pending,
    Success,
    Failed,
}

/// `OrderMap`. Invariant: one row per (master_order_id, follower_user_id);
/// on `Success` the referenced follower order exists and its
/// `parent_master_order_id` equals `master_order_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderMap {
    pub id: OrderMapId,
    pub master_order_id: OrderId,
    pub follower_order_id: Option<OrderId>,
    pub follower_user_id: UserId,
    pub master_broker_order_id: String,
    pub follower_broker_order_id: Option<String>,
    pub scaling_factor: Option<Decimal>,
    pub original_qty: i64,
    pub follower_qty: i64,
    pub replication_status: ReplicationStatus,
    pub latency_ms: Option<i64>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row shape for `order_maps.insert`. No `id`/timestamps — those are
/// assigned by the store.
#[derive(Debug, Clone)]
pub struct NewOrderMap {
    pub master_order_id: OrderId,
    pub follower_order_id: Option<OrderId>,
    pub follower_user_id: UserId,
    pub master_broker_order_id: String,
    pub follower_broker_order_id: Option<String>,
    pub scaling_factor: Option<Decimal>,
    pub original_qty: i64,
    pub follower_qty: i64,
    pub replication_status: ReplicationStatus,
    pub latency_ms: Option<i64>,
    pub error: Option<String>,
}

/// Cache-tier representation at `order:map:{master_order_id}`. Smaller
/// than the durable row: just enough for MODIFY/CANCEL to target the right
/// broker order without a DB round trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderMapCacheEntry {
    pub follower_order_id: OrderId,
    pub follower_broker_order_id: String,
}
