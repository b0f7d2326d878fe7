//! FILL handling (optional). Updates fill fields only — never places or
//! cancels an order in response to a fill.

use std::sync::Arc;

use replicon_schemas::{FollowerOrderPatch, NormalizedOrderEvent, OrderStatus};

use crate::context::WorkerContext;
use crate::error::WorkerError;
use crate::handlers::modify::mapping_for;

fn fill_status(filled_qty: i64, requested_qty: i64) -> OrderStatus {
    if requested_qty > 0 && filled_qty >= requested_qty {
        OrderStatus::Filled
    } else if filled_qty > 0 {
        OrderStatus::PartiallyFilled
    } else {
        OrderStatus::Submitted
    }
}

/// Update the master Order's fill fields, then best-effort
/// propagate status to whichever follower Orders are mapped. `orders::update`
/// applies to any row in the unified `orders` table, master or follower.
pub async fn handle_fill(ctx: &Arc<WorkerContext>, event: &NormalizedOrderEvent) -> Result<(), WorkerError> {
    let master = replicon_db::orders::get(&ctx.pool, event.master_order_id)
        .await
        .map_err(WorkerError::from)?
        .ok_or_else(|| WorkerError::NotFound(format!("master order {} not found", event.master_order_id)))?;

    let status = fill_status(event.filled_qty, master.requested_qty);

    replicon_db::orders::update(
        &ctx.pool,
        master.id,
        &FollowerOrderPatch {
            filled_qty: Some(event.filled_qty),
            average_price: event.average_price,
            status: Some(status),
            ..Default::default()
        },
    )
    .await
    .map_err(WorkerError::from)?;

    let mapping = mapping_for(ctx, event.master_order_id).await.unwrap_or_default();

    for (follower_user_id, entry) in mapping {
        if let Err(err) = replicon_db::orders::update(
            &ctx.pool,
            entry.follower_order_id,
            &FollowerOrderPatch {
                filled_qty: Some(event.filled_qty),
                average_price: event.average_price,
                status: Some(status),
                ..Default::default()
            },
        )
        .await
        {
            tracing::warn!(error = %err, follower_user_id, "orders::update failed during FILL propagation");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_status_tracks_quantity_ratio() {
        assert_eq!(fill_status(0, 10), OrderStatus::Submitted);
        assert_eq!(fill_status(5, 10), OrderStatus::PartiallyFilled);
        assert_eq!(fill_status(10, 10), OrderStatus::Filled);
    }
}
