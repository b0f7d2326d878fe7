//! MODIFY handling.

use std::sync::Arc;

use replicon_broker::{BrokerCredentials, ModifyOrderRequest};
use replicon_schemas::{FollowerOrderPatch, NormalizedOrderEvent, OrderId, OrderMapCacheEntry, UserId};

use crate::context::WorkerContext;
use crate::error::WorkerError;

/// The mapping entries MODIFY/CANCEL operate over, whichever tier produced
/// them: cache first, durable store on miss.
pub(crate) async fn mapping_for(
    ctx: &WorkerContext,
    master_order_id: OrderId,
) -> Result<Vec<(UserId, OrderMapCacheEntry)>, WorkerError> {
    let cached = ctx
        .order_map_cache
        .get(master_order_id)
        .await
        .map_err(WorkerError::from)?;

    if !cached.is_empty() {
        return Ok(cached.into_iter().collect());
    }

    let rows = replicon_db::order_maps::for_master(&ctx.pool, master_order_id)
        .await
        .map_err(WorkerError::from)?;

    Ok(rows
        .into_iter()
        .filter_map(|row| {
            let follower_order_id = row.follower_order_id?;
            let follower_broker_order_id = row.follower_broker_order_id?;
            Some((
                row.follower_user_id,
                OrderMapCacheEntry {
                    follower_order_id,
                    follower_broker_order_id,
                },
            ))
        })
        .collect())
}

/// Resolve the mapping, replay the modify to each follower broker.
pub async fn handle_modify(ctx: &Arc<WorkerContext>, event: &NormalizedOrderEvent) -> Result<(), WorkerError> {
    let mapping = mapping_for(ctx, event.master_order_id).await?;

    if mapping.is_empty() {
        tracing::info!(
            master_order_id = event.master_order_id,
            "MODIFY with no prior NEW mapping; no-op"
        );
        return Err(WorkerError::NotFound(format!(
            "no order map for master order {}",
            event.master_order_id
        )));
    }

    for (follower_user_id, entry) in mapping {
        if let Err(err) = modify_one(ctx, event, follower_user_id, &entry).await {
            tracing::error!(
                error = %err,
                follower_user_id,
                master_order_id = event.master_order_id,
                "modify_order failed for follower"
            );
        }
    }

    Ok(())
}

async fn modify_one(
    ctx: &WorkerContext,
    event: &NormalizedOrderEvent,
    follower_user_id: UserId,
    entry: &OrderMapCacheEntry,
) -> anyhow::Result<()> {
    let follower = replicon_db::users::get(&ctx.pool, follower_user_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("follower {follower_user_id} not found"))?;

    let follower_order = replicon_db::orders::get(&ctx.pool, entry.follower_order_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("follower order {} not found", entry.follower_order_id))?;

    let session_token = ctx
        .token_cache
        .get_or_refresh(follower_user_id, ctx.token_refresher.as_ref())
        .await?;

    let credentials = BrokerCredentials {
        client_code: follower.broker_account_code.clone(),
        broker_user_id: follower.broker_user_id.clone(),
        encrypted_secret: follower.broker_password_encrypted.clone(),
        public_ip: follower.public_ip.clone(),
    };

    ctx.broker
        .modify_order(ModifyOrderRequest {
            session_token,
            credentials,
            broker_order_id: entry.follower_broker_order_id.clone(),
            exchange_order_id: follower_order.exchange_order_id.clone(),
            exchange: event.exchange,
            exchange_type: event.exchange_type,
            scrip_code: event.scrip_code.clone(),
            quantity: event.quantity,
            traded_qty: follower_order.filled_qty,
            price: event.price,
        })
        .await?;

    replicon_db::orders::update(
        &ctx.pool,
        follower_order.id,
        &FollowerOrderPatch {
            price: event.price,
            ..Default::default()
        },
    )
    .await?;

    Ok(())
}
