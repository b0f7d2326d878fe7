use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{CopyStrategy, FollowerRelationshipId, UserId};

/// `FollowerRelationship`. Invariant: at most one row per (master_id,
/// follower_id) — enforced by a unique index in `replicon-db`, not by this
/// type. Soft-deleted by clearing `active`; rows are never physically
/// removed by the core pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowerRelationship {
    pub id: FollowerRelationshipId,
    pub master_id: UserId,
    pub follower_id: UserId,
    pub active: bool,
    pub auto_follow: bool,
    pub copy_strategy: CopyStrategy,
    pub ratio: Option<Decimal>,
    pub percentage: Option<Decimal>,
    pub fixed_quantity: Option<i64>,
    /// Advisory ceiling; not enforced by the Order Worker itself. See
    /// `replicon_worker::ShouldReplicate` — whether a follower should trade
    /// at all is a pluggable policy decision the core does not make.
    pub max_order_value: Option<Decimal>,
    pub max_daily_loss: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FollowerRelationship {
    /// The fan-out candidate set is `active ∧ auto_follow`.
    pub fn is_fan_out_candidate(&self) -> bool {
        self.active && self.auto_follow
    }
}
