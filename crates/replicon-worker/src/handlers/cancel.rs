//! CANCEL handling.

use std::sync::Arc;

use replicon_broker::{BrokerCredentials, CancelOrderRequest};
use replicon_schemas::{FollowerOrderPatch, NormalizedOrderEvent, OrderStatus};

use crate::context::WorkerContext;
use crate::error::WorkerError;
use crate::handlers::modify::mapping_for;

/// Resolve the mapping, cancel at each follower broker.
pub async fn handle_cancel(ctx: &Arc<WorkerContext>, event: &NormalizedOrderEvent) -> Result<(), WorkerError> {
    let mapping = mapping_for(ctx, event.master_order_id).await?;

    if mapping.is_empty() {
        tracing::info!(
            master_order_id = event.master_order_id,
            "CANCEL with no prior NEW mapping; no-op"
        );
        return Err(WorkerError::NotFound(format!(
            "no order map for master order {}",
            event.master_order_id
        )));
    }

    for (follower_user_id, entry) in mapping {
        let follower = match replicon_db::users::get(&ctx.pool, follower_user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                tracing::error!(follower_user_id, "follower not found during CANCEL");
                continue;
            }
            Err(err) => {
                tracing::error!(error = %err, follower_user_id, "users::get failed during CANCEL");
                continue;
            }
        };

        let session_token = match ctx
            .token_cache
            .get_or_refresh(follower_user_id, ctx.token_refresher.as_ref())
            .await
        {
            Ok(token) => token,
            Err(err) => {
                tracing::error!(error = %err, follower_user_id, "token refresh failed during CANCEL");
                continue;
            }
        };

        let credentials = BrokerCredentials {
            client_code: follower.broker_account_code.clone(),
            broker_user_id: follower.broker_user_id.clone(),
            encrypted_secret: follower.broker_password_encrypted.clone(),
            public_ip: follower.public_ip.clone(),
        };

        if let Err(err) = ctx
            .broker
            .cancel_order(CancelOrderRequest {
                session_token,
                credentials,
                broker_order_id: entry.follower_broker_order_id.clone(),
                exchange: event.exchange,
                exchange_type: event.exchange_type,
            })
            .await
        {
            tracing::error!(error = %err, follower_user_id, "cancel_order failed");
            continue;
        }

        if let Err(err) = replicon_db::orders::update(
            &ctx.pool,
            entry.follower_order_id,
            &FollowerOrderPatch {
                status: Some(OrderStatus::Cancelled),
                ..Default::default()
            },
        )
        .await
        {
            tracing::error!(error = %err, follower_user_id, "orders::update failed after cancel_order");
        }
    }

    Ok(())
}
