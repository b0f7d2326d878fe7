//! Distributed rate-limit counter backing store, keyed `rate:{scope}`.
//!
//! `replicon-broker`'s in-process token bucket is the primary enforcement
//! point (a single process never needs to round-trip to Redis to decide
//! whether it may send its next request); this counter exists for
//! deployments running more than one worker process against the same broker
//! endpoint, where the per-process bucket alone cannot see the other
//! processes' traffic.

use anyhow::{Context, Result};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

fn key(scope: &str) -> String {
    format!("rate:{scope}")
}

#[derive(Clone)]
pub struct RedisRateLimitCounter {
    conn: ConnectionManager,
}

impl RedisRateLimitCounter {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    /// Increment the counter for `scope` within the current one-second
    /// window and return the post-increment count. The first increment in a
    /// window sets the key's expiry; later ones in the same window leave it
    /// alone, so the window rolls naturally.
    pub async fn increment(&self, scope: &str, window_secs: u64) -> Result<i64> {
        let mut conn = self.conn.clone();
        let k = key(scope);

        let count: i64 = conn.incr(&k, 1).await.context("rate_limit incr failed")?;
        if count == 1 {
            conn.expire::<_, ()>(&k, window_secs as i64)
                .await
                .context("rate_limit expire failed")?;
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_shape_matches_spec() {
        assert_eq!(key("iifl-place-order"), "rate:iifl-place-order");
    }
}
