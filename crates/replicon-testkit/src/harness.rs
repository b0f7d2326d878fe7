//! Scenario harness: wires a `WorkerContext` against a real (migrated)
//! Postgres database and a real Redis instance, the same way
//! `replicon-worker`'s `main.rs` does. Scenario tests are skipped rather
//! than faked when either is unavailable — the same env-var-gated skip
//! pattern this workspace's other DB-backed integration tests use, rather
//! than inventing in-memory doubles for infrastructure already depended on
//! concretely.

use std::sync::Arc;

use anyhow::Result;
use redis::aio::ConnectionManager;
use sqlx::PgPool;
use tokio::sync::Semaphore;

use replicon_broker::BrokerAdapter;
use replicon_cache::{OrderMapCache, TokenCache};
use replicon_worker::should_replicate::AlwaysReplicate;
use replicon_worker::token_refresher::BrokerTokenRefresher;
use replicon_worker::WorkerContext;

/// Default token TTL / order-map TTL for test harnesses: short enough that
/// a slow CI box doesn't accumulate stale Redis keys across runs, long
/// enough not to expire mid-test.
const TEST_TOKEN_TTL_SECS: u64 = 300;
const TEST_ORDER_MAP_TTL_SECS: u64 = 300;

pub struct TestEnv {
    pub pool: PgPool,
    pub redis: ConnectionManager,
}

/// Returns `None` (never errors) when `DATABASE_URL` or `REDIS_URL` is
/// unset, so scenario tests can skip cleanly on a machine with no
/// infrastructure running, the same way the rest of this workspace's
/// DB-backed tests do.
pub async fn test_env_from_env() -> Option<TestEnv> {
    let db_url = std::env::var(replicon_db::ENV_DB_URL).ok()?;
    let redis_url = std::env::var("REDIS_URL").ok()?;

    let pool = replicon_db::connect(&db_url, 5).await.ok()?;
    replicon_db::migrate(&pool).await.ok()?;
    let redis = replicon_cache::connect(&redis_url).await.ok()?;

    Some(TestEnv { pool, redis })
}

/// Builds a `WorkerContext` around a caller-supplied broker (typically a
/// `replicon_broker_paper::PaperBroker`, optionally wrapped in
/// `crate::fault_broker::RejectingBroker`). The token refresher drives the
/// same two-stage login the live broker would, against whatever adapter is
/// plugged in here — no separate fake-refresher type is needed since every
/// `BrokerAdapter` (paper included) implements `vendor_login`/`client_login`.
pub fn build_worker_context<B>(env: &TestEnv, broker: Arc<B>) -> Arc<WorkerContext>
where
    B: BrokerAdapter + 'static,
{
    let broker_dyn: Arc<dyn BrokerAdapter> = broker.clone();
    let token_cache = Arc::new(TokenCache::new(env.redis.clone(), TEST_TOKEN_TTL_SECS));
    let order_map_cache = OrderMapCache::new(env.redis.clone(), TEST_ORDER_MAP_TTL_SECS);
    let token_refresher = Arc::new(BrokerTokenRefresher::new(env.pool.clone(), broker));

    Arc::new(WorkerContext {
        pool: env.pool.clone(),
        token_cache,
        token_refresher,
        order_map_cache,
        broker: broker_dyn,
        should_replicate: Arc::new(AlwaysReplicate),
        fanout_semaphore: Arc::new(Semaphore::new(50)),
    })
}

/// Best-effort teardown of fixture rows so repeated local runs against a
/// long-lived dev database don't accumulate forever. Scoped to rows created
/// under a test-supplied `broker_account_code` prefix.
pub async fn purge_fixtures_with_prefix(pool: &PgPool, prefix: &str) -> Result<()> {
    sqlx::query(
        r#"
        delete from order_maps where follower_user_id in (
            select id from users where broker_account_code like $1
        ) or master_order_id in (
            select id from orders where owner_user_id in (
                select id from users where broker_account_code like $1
            )
        )
        "#,
    )
    .bind(format!("{prefix}%"))
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        delete from orders where owner_user_id in (
            select id from users where broker_account_code like $1
        )
        "#,
    )
    .bind(format!("{prefix}%"))
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        delete from follower_relationships where master_id in (
            select id from users where broker_account_code like $1
        ) or follower_id in (
            select id from users where broker_account_code like $1
        )
        "#,
    )
    .bind(format!("{prefix}%"))
    .execute(pool)
    .await?;

    sqlx::query("delete from users where broker_account_code like $1")
        .bind(format!("{prefix}%"))
        .execute(pool)
        .await?;

    Ok(())
}
