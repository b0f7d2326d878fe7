//! replicon-worker entry point: the Order Worker process.

use std::sync::Arc;

use anyhow::Context;
use replicon_broker::{BrokerAdapter, RetryingBroker};
use replicon_broker_live::IiflLiveBroker;
use replicon_cache::{OrderMapCache, TokenCache};
use replicon_config::Settings;
use replicon_worker::context::WorkerContext;
use replicon_worker::token_refresher::BrokerTokenRefresher;
use replicon_worker::{consumer, AlwaysReplicate};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let settings = Settings::from_env().context("failed to load settings")?;

    let pool = replicon_db::connect(&settings.database_url, settings.db_pool_size)
        .await
        .context("failed to connect to Postgres")?;
    replicon_db::migrate(&pool).await.context("failed to run migrations")?;

    let redis_conn = replicon_cache::connect(&settings.redis_url)
        .await
        .context("failed to connect to Redis")?;

    let http = reqwest::Client::builder()
        .pool_max_idle_per_host(settings.http_pool_size)
        .build()
        .context("failed to build broker HTTP client")?;

    let live_broker = IiflLiveBroker::new(
        http,
        settings.broker_base_url.clone(),
        settings.vendor_key.clone(),
        settings.vendor_code.clone(),
    );
    let broker = Arc::new(RetryingBroker::with_default_policy(
        live_broker,
        settings.rate_limit_per_sec,
    ));
    let broker_dyn: Arc<dyn BrokerAdapter> = broker.clone();

    let token_cache = Arc::new(TokenCache::new(redis_conn.clone(), settings.token_ttl_secs));
    let order_map_cache = OrderMapCache::new(redis_conn, settings.order_map_ttl_secs);
    let token_refresher = Arc::new(BrokerTokenRefresher::new(pool.clone(), broker));

    let ctx = Arc::new(WorkerContext {
        pool: pool.clone(),
        token_cache,
        token_refresher,
        order_map_cache,
        broker: broker_dyn,
        should_replicate: Arc::new(AlwaysReplicate),
        fanout_semaphore: Arc::new(tokio::sync::Semaphore::new(settings.max_concurrent_broker_calls)),
    });

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let consumer_id = format!("replicon-worker-{}", std::process::id());

    let consumer_handle = tokio::spawn(consumer::run(
        ctx,
        consumer_id,
        settings.bus_ack_wait_secs,
        settings.bus_max_deliver,
        shutdown_rx,
    ));

    tokio::signal::ctrl_c().await.context("failed to listen for ctrl_c")?;
    tracing::info!("shutdown signal received, draining consumer loop");
    let _ = shutdown_tx.send(());
    let _ = consumer_handle.await;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}
