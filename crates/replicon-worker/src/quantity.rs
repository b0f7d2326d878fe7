//! Copy-strategy quantity formulas.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use replicon_schemas::{CopyStrategy, FollowerRelationship};

/// Computes the quantity a follower order should request, given the
/// master's quantity/price and the follower's account balance. A `None`
/// means "skip this follower": skip, record as skipped, not
/// failed, if the result is <= 0 — the caller still owns the decision of
/// what "skip" means downstream; this function only ever returns a
/// positive quantity or `None`.
pub fn follower_quantity(
    rel: &FollowerRelationship,
    master_qty: i64,
    master_price: Option<Decimal>,
    follower_balance: Decimal,
) -> Option<i64> {
    let raw = match rel.copy_strategy {
        CopyStrategy::FixedRatio => {
            let ratio = rel.ratio.unwrap_or(Decimal::ZERO);
            (Decimal::from(master_qty) * ratio).floor().to_i64()?
        }
        CopyStrategy::Percentage => {
            let pct = rel.percentage.unwrap_or(Decimal::ZERO);
            match master_price {
                Some(price) if price > Decimal::ZERO => {
                    let pct_of_balance = follower_balance * pct / Decimal::from(100);
                    (pct_of_balance / price).floor().to_i64()?
                }
                _ => master_qty,
            }
        }
        CopyStrategy::FixedQuantity => rel.fixed_quantity.unwrap_or(0),
    };

    if raw > 0 {
        Some(raw)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn base_rel(strategy: CopyStrategy) -> FollowerRelationship {
        FollowerRelationship {
            id: 1,
            master_id: 1,
            follower_id: 2,
            active: true,
            auto_follow: true,
            copy_strategy: strategy,
            ratio: None,
            percentage: None,
            fixed_quantity: None,
            max_order_value: None,
            max_daily_loss: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn fixed_ratio_floors() {
        let mut rel = base_rel(CopyStrategy::FixedRatio);
        rel.ratio = Some(Decimal::new(5, 1)); // 0.5
        let qty = follower_quantity(&rel, 7, Some(Decimal::new(10000, 2)), Decimal::ZERO);
        assert_eq!(qty, Some(3)); // floor(7 * 0.5) = 3
    }

    #[test]
    fn percentage_divides_balance_by_price() {
        let mut rel = base_rel(CopyStrategy::Percentage);
        rel.percentage = Some(Decimal::new(10, 0)); // 10%
        let balance = Decimal::new(10_00000, 2); // 10000.00
        let price = Decimal::new(10000, 2); // 100.00
        let qty = follower_quantity(&rel, 50, Some(price), balance);
        assert_eq!(qty, Some(10)); // (10000 * 10/100) / 100 = 10
    }

    #[test]
    fn percentage_falls_back_to_master_qty_when_price_missing() {
        let mut rel = base_rel(CopyStrategy::Percentage);
        rel.percentage = Some(Decimal::new(10, 0));
        let qty = follower_quantity(&rel, 50, None, Decimal::new(10_00000, 2));
        assert_eq!(qty, Some(50));
    }

    #[test]
    fn fixed_quantity_uses_configured_value() {
        let mut rel = base_rel(CopyStrategy::FixedQuantity);
        rel.fixed_quantity = Some(25);
        let qty = follower_quantity(&rel, 50, Some(Decimal::ONE), Decimal::ZERO);
        assert_eq!(qty, Some(25));
    }

    #[test]
    fn non_positive_result_is_none() {
        let mut rel = base_rel(CopyStrategy::FixedRatio);
        rel.ratio = Some(Decimal::new(1, 2)); // 0.01
        let qty = follower_quantity(&rel, 1, Some(Decimal::ONE), Decimal::ZERO);
        assert_eq!(qty, None); // floor(1 * 0.01) = 0
    }
}
