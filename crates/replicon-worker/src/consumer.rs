//! The durable consumer: claim a batch from the Postgres outbox, dispatch
//! each message by event-kind under a per-master-order-id advisory lock,
//! then ack or nack based on the outcome.

use std::sync::Arc;
use std::time::Duration;

use replicon_db::bus::{self, BusMessage};
use replicon_schemas::{EventKind, NormalizedOrderEvent};

use crate::context::WorkerContext;
use crate::error::WorkerError;
use crate::handlers;

const BATCH_SIZE: i64 = 20;
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(500);
const NACK_REDELIVERY_DELAY: Duration = Duration::from_secs(2);
const REAPER_INTERVAL: Duration = Duration::from_secs(30);

/// Runs until `shutdown` resolves. One instance per worker process; multiple
/// processes may run concurrently against the same database — `claim_batch`'s
/// `FOR UPDATE SKIP LOCKED` guarantees each row goes to exactly one of them.
pub async fn run(
    ctx: Arc<WorkerContext>,
    consumer_id: String,
    ack_wait_secs: u64,
    max_deliver: i32,
    mut shutdown: tokio::sync::oneshot::Receiver<()>,
) {
    let mut next_reap = tokio::time::Instant::now() + REAPER_INTERVAL;

    loop {
        if shutdown.try_recv().is_ok() {
            tracing::info!("consumer loop received shutdown signal");
            return;
        }

        if tokio::time::Instant::now() >= next_reap {
            match bus::requeue_expired_claims(&ctx.pool, ack_wait_secs as i64, max_deliver).await {
                Ok(dead) if !dead.is_empty() => {
                    tracing::warn!(count = dead.len(), "bus messages moved to DEAD after exhausting deliveries")
                }
                Ok(_) => {}
                Err(err) => tracing::error!(error = %err, "requeue_expired_claims failed"),
            }
            next_reap = tokio::time::Instant::now() + REAPER_INTERVAL;
        }

        let claimed = match bus::claim_batch(&ctx.pool, BATCH_SIZE, &consumer_id).await {
            Ok(rows) => rows,
            Err(err) => {
                tracing::error!(error = %err, "claim_batch failed");
                tokio::time::sleep(IDLE_POLL_INTERVAL).await;
                continue;
            }
        };

        if claimed.is_empty() {
            tokio::time::sleep(IDLE_POLL_INTERVAL).await;
            continue;
        }

        for message in claimed {
            process_one(&ctx, message).await;
        }
    }
}

async fn process_one(ctx: &Arc<WorkerContext>, message: BusMessage) {
    let event: NormalizedOrderEvent = match serde_json::from_value(message.payload.clone()) {
        Ok(event) => event,
        Err(err) => {
            tracing::error!(error = %err, bus_message_id = message.id, "undecodable bus message payload; acking to drop it");
            let _ = bus::ack(&ctx.pool, message.id).await;
            return;
        }
    };

    let mut tx = match ctx.pool.begin().await {
        Ok(tx) => tx,
        Err(err) => {
            tracing::error!(error = %err, bus_message_id = message.id, "failed to open advisory-lock transaction");
            let _ = bus::nack_with_delay(&ctx.pool, message.id).await;
            return;
        }
    };

    if let Err(err) = bus::lock_master_order_for_processing(&mut tx, message.master_order_id).await {
        tracing::error!(error = %err, bus_message_id = message.id, "lock_master_order_for_processing failed");
        let _ = tx.rollback().await;
        let _ = bus::nack_with_delay(&ctx.pool, message.id).await;
        return;
    }

    let result = dispatch(ctx, event.event_kind, &event).await;

    if let Err(err) = tx.commit().await {
        tracing::error!(error = %err, bus_message_id = message.id, "failed to release advisory-lock transaction");
    }

    match result {
        Ok(()) => {
            if let Err(err) = bus::ack(&ctx.pool, message.id).await {
                tracing::error!(error = %err, bus_message_id = message.id, "ack failed");
            }
        }
        Err(err) if err.should_ack() => {
            tracing::info!(bus_message_id = message.id, reason = %err, "acking message as a deliberate no-op");
            if let Err(ack_err) = bus::ack(&ctx.pool, message.id).await {
                tracing::error!(error = %ack_err, bus_message_id = message.id, "ack failed");
            }
        }
        Err(err) => {
            tracing::error!(error = %err, bus_message_id = message.id, "handler failed; nacking for redelivery");
            if let Err(nack_err) = bus::nack_with_delay(&ctx.pool, message.id).await {
                tracing::error!(error = %nack_err, bus_message_id = message.id, "nack_with_delay failed");
            }
            tokio::time::sleep(NACK_REDELIVERY_DELAY).await;
        }
    }
}

async fn dispatch(
    ctx: &Arc<WorkerContext>,
    kind: EventKind,
    event: &NormalizedOrderEvent,
) -> Result<(), WorkerError> {
    match kind {
        EventKind::New => handlers::handle_new(ctx, event).await,
        EventKind::Modify => handlers::handle_modify(ctx, event).await,
        EventKind::Cancel => handlers::handle_cancel(ctx, event).await,
        EventKind::Fill => handlers::handle_fill(ctx, event).await,
    }
}
