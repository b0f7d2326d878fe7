//! Token Cache. `iifl:token:{user_id}`, TTL strictly less than the
//! broker's own session lifetime, single-flight refresh on concurrent misses.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::sync::{Mutex, OnceCell};

use replicon_schemas::UserId;

fn key(user_id: UserId) -> String {
    format!("iifl:token:{user_id}")
}

/// Implemented by whatever knows how to log a user in against the follower
/// broker. `replicon-broker-live` provides the real implementation;
/// `replicon-testkit` provides a deterministic fake for tests.
#[async_trait::async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, user_id: UserId) -> Result<String>;
}

type InFlight = Arc<OnceCell<Result<String, String>>>;

/// Redis-backed token cache with per-user single-flight refresh.
///
/// Concurrent callers that miss the cache for the same `user_id` share one
/// in-flight refresh: the first caller drives it, the rest await the same
/// `OnceCell`. This matches the "only one in-flight refresh per user-id;
/// others wait for it" requirement without a process-wide lock.
pub struct TokenCache {
    conn: ConnectionManager,
    ttl_secs: u64,
    inflight: Mutex<HashMap<UserId, InFlight>>,
}

impl TokenCache {
    pub fn new(conn: ConnectionManager, ttl_secs: u64) -> Self {
        Self {
            conn,
            ttl_secs,
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// `get_or_refresh(user) -> token`.
    pub async fn get_or_refresh(
        &self,
        user_id: UserId,
        refresher: &dyn TokenRefresher,
    ) -> Result<String> {
        if let Some(token) = self.get_cached(user_id).await? {
            return Ok(token);
        }

        let cell = {
            let mut inflight = self.inflight.lock().await;
            inflight
                .entry(user_id)
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        let result = cell
            .get_or_init(|| async {
                let refreshed = refresher.refresh(user_id).await;
                match refreshed {
                    Ok(token) => {
                        if let Err(e) = self.store(user_id, &token).await {
                            tracing::warn!(user_id, error = %e, "failed to cache refreshed token");
                        }
                        Ok(token)
                    }
                    Err(e) => Err(e.to_string()),
                }
            })
            .await
            .clone();

        // This call's work is done; drop our slot so a future miss (e.g.
        // after invalidation) starts a fresh single-flight group instead of
        // replaying this stale result forever.
        self.inflight.lock().await.remove(&user_id);

        result.map_err(|e| anyhow::anyhow!("broker auth failed for user {user_id}: {e}"))
    }

    async fn get_cached(&self, user_id: UserId) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        let token: Option<String> = conn
            .get(key(user_id))
            .await
            .context("token_cache get failed")?;
        Ok(token)
    }

    async fn store(&self, user_id: UserId, token: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(key(user_id), token, self.ttl_secs)
            .await
            .context("token_cache store failed")?;
        Ok(())
    }

    /// On `AuthFailure` the cached token is invalidated.
    pub async fn invalidate(&self, user_id: UserId) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key(user_id))
            .await
            .context("token_cache invalidate failed")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_shape_matches_spec() {
        assert_eq!(key(42), "iifl:token:42");
    }
}
