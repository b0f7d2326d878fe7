//! Whether a follower should trade is a pluggable policy decision the core
//! does not make — given a concrete seam here, consulted once per
//! relationship in the NEW fan-out, immediately after loading the
//! follower `User` and before computing a copy-strategy quantity.

use replicon_schemas::{FollowerRelationship, Order, User};

/// Default is "replicate everything eligible" — `is_fan_out_candidate`
/// (active ∧ auto_follow) already gated the relationship set before this
/// trait is consulted, so the permissive default changes nothing on its own.
pub trait ShouldReplicate: Send + Sync {
    fn allow(&self, master: &Order, rel: &FollowerRelationship, follower: &User) -> bool;
}

pub struct AlwaysReplicate;

impl ShouldReplicate for AlwaysReplicate {
    fn allow(&self, _master: &Order, _rel: &FollowerRelationship, _follower: &User) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use replicon_schemas::{CopyStrategy, OrderSide, OrderStatus, OrderType, UserRole};
    use rust_decimal::Decimal;

    fn sample_master() -> Order {
        Order {
            id: 1,
            owner_user_id: 1,
            is_master: true,
            parent_master_order_id: None,
            symbol: "RELIANCE".into(),
            scrip_code: None,
            side: OrderSide::Buy,
            order_type: OrderType::Limit,
            requested_qty: 10,
            price: Some(Decimal::new(250000, 2)),
            filled_qty: 0,
            average_price: None,
            status: OrderStatus::Submitted,
            broker_order_id: Some("bo-1".into()),
            exchange_order_id: None,
            error_message: None,
            replication_latency_ms: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn sample_relationship() -> FollowerRelationship {
        FollowerRelationship {
            id: 1,
            master_id: 1,
            follower_id: 2,
            active: true,
            auto_follow: true,
            copy_strategy: CopyStrategy::FixedRatio,
            ratio: Some(Decimal::ONE),
            percentage: None,
            fixed_quantity: None,
            max_order_value: None,
            max_daily_loss: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn sample_follower() -> User {
        User {
            id: 2,
            role: UserRole::Follower,
            active: true,
            broker_account_code: "F1".into(),
            broker_user_id: "fu-1".into(),
            broker_password_encrypted: "enc".into(),
            broker_api_key_encrypted: "enc".into(),
            public_ip: "127.0.0.1".into(),
            balance: Decimal::new(1_000_000, 2),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn always_replicate_allows_everything() {
        let p = AlwaysReplicate;
        assert!(p.allow(&sample_master(), &sample_relationship(), &sample_follower()));
    }
}
