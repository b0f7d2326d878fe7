//! Persistent Store and Postgres-backed Event Bus.
//!
//! Connection/migration helpers follow the same shape other services in
//! this workspace use for their own Postgres access: one
//! `DATABASE_URL`-driven pool, `sqlx::migrate!` for schema, explicit query
//! functions grouped by aggregate (`users`, `orders`, `follower_relationships`,
//! `order_maps`, `audit`, `bus`).

pub mod audit;
pub mod bus;
pub mod follower_relationships;
pub mod order_maps;
pub mod orders;
pub mod users;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

pub const ENV_DB_URL: &str = "DATABASE_URL";

/// Connect to Postgres using `DATABASE_URL`. Pool size is fixed here; callers
/// that need a different size (e.g. `replicon-config::Settings::db_pool_size`)
/// should use `connect(url, max_connections)` directly instead.
pub async fn connect_from_env() -> Result<PgPool> {
    let url = std::env::var(ENV_DB_URL).with_context(|| format!("missing env var {ENV_DB_URL}"))?;
    connect(&url, 10).await
}

pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(url)
        .await
        .context("failed to connect to Postgres")
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub ok: bool,
    pub has_core_tables: bool,
}

pub async fn status(pool: &PgPool) -> Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;

    let (has_core_tables,): (bool,) = sqlx::query_as(
        r#"
        select exists (
            select 1 from information_schema.tables
            where table_name = 'orders'
        )
        "#,
    )
    .fetch_one(pool)
    .await
    .context("status schema query failed")?;

    Ok(DbStatus {
        ok: one == 1,
        has_core_tables,
    })
}

/// Connect for test harnesses: connect + migrate in one call.
pub async fn testkit_db_pool() -> Result<PgPool> {
    let pool = connect_from_env().await?;
    migrate(&pool).await?;
    Ok(pool)
}
