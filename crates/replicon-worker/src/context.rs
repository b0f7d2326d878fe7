//! Everything a handler needs to process one claimed bus message. One
//! `WorkerContext` is built in `main.rs` and shared (via `Arc`) across every
//! concurrently-processed message and every per-follower fan-out task.

use std::sync::Arc;

use replicon_broker::BrokerAdapter;
use replicon_cache::{OrderMapCache, TokenCache, TokenRefresher};
use sqlx::PgPool;
use tokio::sync::Semaphore;

use crate::should_replicate::ShouldReplicate;

pub struct WorkerContext {
    pub pool: PgPool,
    pub token_cache: Arc<TokenCache>,
    pub token_refresher: Arc<dyn TokenRefresher>,
    pub order_map_cache: OrderMapCache,
    pub broker: Arc<dyn BrokerAdapter>,
    pub should_replicate: Arc<dyn ShouldReplicate>,
    /// Global semaphore capping concurrent broker calls per worker process
    /// (default 50). Shared across every in-flight fan-out, not per-message.
    pub fanout_semaphore: Arc<Semaphore>,
}
