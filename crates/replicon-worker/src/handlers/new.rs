//! NEW handling: fan master order out to every active, auto-following
//! follower relationship, one bounded-concurrency task per follower.

use std::sync::Arc;
use std::time::Instant;

use tokio::task::JoinSet;

use replicon_broker::{BrokerCredentials, PlaceOrderRequest};
use replicon_schemas::{
    NewFollowerOrder, NewOrderMap, NormalizedOrderEvent, Order, OrderMapCacheEntry,
    ReplicationStatus,
};

use crate::context::WorkerContext;
use crate::error::WorkerError;
use crate::quantity::follower_quantity;

enum FollowerOutcome {
    Replicated,
    Failed,
    Skipped,
}

/// Resolve followers, compute scaled quantities, place at each broker.
pub async fn handle_new(ctx: &Arc<WorkerContext>, event: &NormalizedOrderEvent) -> Result<(), WorkerError> {
    let master = replicon_db::orders::get(&ctx.pool, event.master_order_id)
        .await
        .map_err(WorkerError::from)?
        .ok_or_else(|| WorkerError::NotFound(format!("master order {} not found", event.master_order_id)))?;

    replicon_db::users::get(&ctx.pool, master.owner_user_id)
        .await
        .map_err(WorkerError::from)?
        .ok_or_else(|| WorkerError::NotFound(format!("master owner {} not found", master.owner_user_id)))?;

    let relationships: Vec<_> = replicon_db::users::active_followers_of(&ctx.pool, master.owner_user_id)
        .await
        .map_err(WorkerError::from)?
        .into_iter()
        .filter(|(_, rel)| rel.is_fan_out_candidate())
        .collect();

    let mut tasks = JoinSet::new();
    for (follower, rel) in relationships {
        let ctx = ctx.clone();
        let master = master.clone();
        let event = event.clone();
        tasks.spawn(async move { fan_out_one(&ctx, &master, &event, follower, rel).await });
    }

    let mut replicated = 0i64;
    let mut failed = 0i64;
    let mut skipped = 0i64;
    while let Some(result) = tasks.join_next().await {
        match result {
            Ok(FollowerOutcome::Replicated) => replicated += 1,
            Ok(FollowerOutcome::Failed) => failed += 1,
            Ok(FollowerOutcome::Skipped) => skipped += 1,
            Err(join_err) => {
                tracing::error!(error = %join_err, "fan-out task panicked");
                failed += 1;
            }
        }
    }

    if let Err(err) = replicon_db::audit::append(
        &ctx.pool,
        "worker.replication",
        "REPLICATION_COMPLETED",
        serde_json::json!({
            "master_order_id": master.id,
            "replicated": replicated,
            "failed": failed,
            "skipped": skipped,
        }),
    )
    .await
    {
        tracing::warn!(error = %err, "audit::append failed for REPLICATION_COMPLETED");
    }

    tracing::info!(
        master_order_id = master.id,
        replicated,
        failed,
        skipped,
        "NEW fan-out complete"
    );

    Ok(())
}

async fn fan_out_one(
    ctx: &Arc<WorkerContext>,
    master: &Order,
    event: &NormalizedOrderEvent,
    follower: replicon_schemas::User,
    rel: replicon_schemas::FollowerRelationship,
) -> FollowerOutcome {
    if !follower.active {
        return FollowerOutcome::Skipped;
    }
    if !ctx.should_replicate.allow(master, &rel, &follower) {
        return FollowerOutcome::Skipped;
    }

    // Redelivery guard: if this exact (master, follower) pair already has a
    // SUCCESS mapping, a prior pass already placed the broker order and
    // created the follower Order row. Re-running the fan-out (e.g. after a
    // worker crash between broker accept and bus ack) must not place a
    // second broker order for the same follower — only a previously FAILED
    // or absent mapping is eligible to (re)attempt placement here.
    match replicon_db::order_maps::for_master_and_follower(&ctx.pool, master.id, follower.id).await {
        Ok(Some(existing)) if existing.replication_status == ReplicationStatus::Success => {
            return FollowerOutcome::Replicated;
        }
        Ok(_) => {}
        Err(err) => {
            tracing::error!(error = %err, follower_id = follower.id, "order_maps::for_master_and_follower failed during redelivery guard");
            return FollowerOutcome::Failed;
        }
    }

    let quantity = match follower_quantity(&rel, master.requested_qty, master.price, follower.balance) {
        Some(q) => q,
        None => return FollowerOutcome::Skipped,
    };

    let _permit = match ctx.fanout_semaphore.clone().acquire_owned().await {
        Ok(permit) => permit,
        Err(_) => return FollowerOutcome::Failed,
    };

    let started = Instant::now();
    let idempotency_key = format!("{}_{}", master.id, follower.id);

    let outcome = place_for_follower(ctx, master, event, &follower, quantity, &idempotency_key).await;

    let latency_ms = started.elapsed().as_millis() as i64;

    match outcome {
        Ok((broker_order_id, exchange_order_id)) => {
            let follower_order = match replicon_db::orders::insert_follower(
                &ctx.pool,
                &NewFollowerOrder {
                    owner_user_id: follower.id,
                    parent_master_order_id: master.id,
                    symbol: master.symbol.clone(),
                    scrip_code: master.scrip_code.clone(),
                    side: master.side,
                    order_type: master.order_type,
                    requested_qty: quantity,
                    price: master.price,
                    broker_order_id: broker_order_id.clone(),
                    exchange_order_id: exchange_order_id.clone(),
                },
            )
            .await
            {
                Ok(order) => order,
                Err(err) => {
                    tracing::error!(error = %err, follower_id = follower.id, "insert_follower failed after successful place_order");
                    return record_order_map_failure(
                        ctx, master, &follower, quantity, Some(latency_ms),
                        "follower order persisted failed after broker accept",
                    )
                    .await;
                }
            };

            if let Err(err) = replicon_db::order_maps::insert(
                &ctx.pool,
                &NewOrderMap {
                    master_order_id: master.id,
                    follower_order_id: Some(follower_order.id),
                    follower_user_id: follower.id,
                    master_broker_order_id: master.broker_order_id.clone().unwrap_or_default(),
                    follower_broker_order_id: Some(broker_order_id.clone()),
                    scaling_factor: rel.ratio,
                    original_qty: master.requested_qty,
                    follower_qty: quantity,
                    replication_status: ReplicationStatus::Success,
                    latency_ms: Some(latency_ms),
                    error: None,
                },
            )
            .await
            {
                tracing::error!(error = %err, follower_id = follower.id, "order_maps::insert failed for successful fan-out");
            }

            if let Err(err) = ctx
                .order_map_cache
                .put(
                    master.id,
                    follower.id,
                    OrderMapCacheEntry {
                        follower_order_id: follower_order.id,
                        follower_broker_order_id: broker_order_id,
                    },
                )
                .await
            {
                tracing::warn!(error = %err, follower_id = follower.id, "order_map_cache::put failed");
            }

            FollowerOutcome::Replicated
        }
        Err(err) => {
            record_order_map_failure(ctx, master, &follower, quantity, Some(latency_ms), &err.to_string()).await
        }
    }
}

async fn record_order_map_failure(
    ctx: &WorkerContext,
    master: &Order,
    follower: &replicon_schemas::User,
    quantity: i64,
    latency_ms: Option<i64>,
    error: &str,
) -> FollowerOutcome {
    if let Err(err) = replicon_db::order_maps::insert(
        &ctx.pool,
        &NewOrderMap {
            master_order_id: master.id,
            follower_order_id: None,
            follower_user_id: follower.id,
            master_broker_order_id: master.broker_order_id.clone().unwrap_or_default(),
            follower_broker_order_id: None,
            scaling_factor: None,
            original_qty: master.requested_qty,
            follower_qty: quantity,
            replication_status: ReplicationStatus::Failed,
            latency_ms,
            error: Some(error.to_string()),
        },
    )
    .await
    {
        tracing::error!(error = %err, follower_id = follower.id, "order_maps::insert failed for failed fan-out");
    }
    FollowerOutcome::Failed
}

async fn place_for_follower(
    ctx: &WorkerContext,
    master: &Order,
    event: &NormalizedOrderEvent,
    follower: &replicon_schemas::User,
    quantity: i64,
    idempotency_key: &str,
) -> anyhow::Result<(String, Option<String>)> {
    let session_token = ctx
        .token_cache
        .get_or_refresh(follower.id, ctx.token_refresher.as_ref())
        .await?;

    let credentials = BrokerCredentials {
        client_code: follower.broker_account_code.clone(),
        broker_user_id: follower.broker_user_id.clone(),
        encrypted_secret: follower.broker_password_encrypted.clone(),
        public_ip: follower.public_ip.clone(),
    };

    let response = ctx
        .broker
        .place_order(PlaceOrderRequest {
            session_token,
            credentials,
            idempotency_key: idempotency_key.to_string(),
            exchange: event.exchange,
            exchange_type: event.exchange_type,
            scrip_code: master.scrip_code.clone(),
            side: event.side,
            order_type: event.order_type,
            quantity,
            price: event.price,
            is_intraday: event.is_intraday,
        })
        .await?;

    Ok((response.broker_order_id, response.exchange_order_id))
}
