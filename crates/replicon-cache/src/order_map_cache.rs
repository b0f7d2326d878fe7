//! Order Map Store hot-path cache tier. `order:map:{master_order_id}`,
//! TTL default 7 days. The durable `order_maps` table in `replicon-db` is the
//! system of record; this is a working set read by MODIFY/CANCEL so they
//! don't need a DB round trip on the common path. Callers fall back to the
//! store on a cache miss.

use std::collections::HashMap;

use anyhow::{Context, Result};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};

use replicon_schemas::{OrderId, OrderMapCacheEntry, UserId};

fn key(master_order_id: OrderId) -> String {
    format!("order:map:{master_order_id}")
}

/// Updates to an existing mapping must be atomic, so concurrent
/// `put`s for distinct followers of the same master do not lose entries.
/// A Lua script executed server-side gives us the read-modify-write as one
/// atomic step without a client-side WATCH/retry loop: Redis runs the whole
/// script single-threaded, so two concurrent `put`s for the same master
/// order simply serialize instead of racing.
const MERGE_SCRIPT: &str = r#"
local current = redis.call('GET', KEYS[1])
local map = {}
if current then
    map = cjson.decode(current)
end
map[ARGV[1]] = cjson.decode(ARGV[2])
local encoded = cjson.encode(map)
redis.call('SET', KEYS[1], encoded, 'EX', ARGV[3])
return encoded
"#;

#[derive(Clone)]
pub struct OrderMapCache {
    conn: ConnectionManager,
    ttl_secs: u64,
}

impl OrderMapCache {
    pub fn new(conn: ConnectionManager, ttl_secs: u64) -> Self {
        Self { conn, ttl_secs }
    }

    /// Merge `follower_user_id -> entry` into the mapping for
    /// this master order.
    pub async fn put(
        &self,
        master_order_id: OrderId,
        follower_user_id: UserId,
        entry: OrderMapCacheEntry,
    ) -> Result<()> {
        let mut conn = self.conn.clone();
        let entry_json = serde_json::to_string(&entry).context("serialize order map entry")?;

        Script::new(MERGE_SCRIPT)
            .key(key(master_order_id))
            .arg(follower_user_id.to_string())
            .arg(entry_json)
            .arg(self.ttl_secs)
            .invoke_async::<_, String>(&mut conn)
            .await
            .context("order_map_cache put script failed")?;

        Ok(())
    }

    /// `get(master_order_id) -> {follower_user_id: entry}`.
    pub async fn get(
        &self,
        master_order_id: OrderId,
    ) -> Result<HashMap<UserId, OrderMapCacheEntry>> {
        let mut conn = self.conn.clone();
        let map = self.read_map(&mut conn, &key(master_order_id)).await?;
        Ok(map
            .into_iter()
            .filter_map(|(k, v)| k.parse::<UserId>().ok().map(|id| (id, v)))
            .collect())
    }

    /// `get_for(master_order_id, follower_user_id) -> entry | none`.
    pub async fn get_for(
        &self,
        master_order_id: OrderId,
        follower_user_id: UserId,
    ) -> Result<Option<OrderMapCacheEntry>> {
        let all = self.get(master_order_id).await?;
        Ok(all.get(&follower_user_id).cloned())
    }

    /// Delete the cached mapping for a master order.
    pub async fn delete(&self, master_order_id: OrderId) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key(master_order_id))
            .await
            .context("order_map_cache delete failed")?;
        Ok(())
    }

    async fn read_map(
        &self,
        conn: &mut ConnectionManager,
        k: &str,
    ) -> Result<HashMap<String, OrderMapCacheEntry>> {
        let raw: Option<String> = conn.get(k).await.context("order_map_cache read failed")?;
        match raw {
            None => Ok(HashMap::new()),
            Some(s) => serde_json::from_str(&s).context("corrupt order_map_cache entry"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_shape_matches_spec() {
        assert_eq!(key(7), "order:map:7");
    }
}
