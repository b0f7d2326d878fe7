use anyhow::{Context, Result};
use rust_decimal::Decimal;
use sqlx::{PgPool, Row};

use replicon_schemas::{NewOrderMap, OrderId, OrderMap, ReplicationStatus, UserId};

fn parse_status(raw: &str) -> Result<ReplicationStatus> {
    match raw {
        "PENDING" => Ok(ReplicationStatus::Pending),
        "SUCCESS" => Ok(ReplicationStatus::Success),
        "FAILED" => Ok(ReplicationStatus::Failed),
        other => anyhow::bail!("unknown replication_status in DB row: {other}"),
    }
}

fn status_str(status: ReplicationStatus) -> &'static str {
    match status {
        ReplicationStatus::Pending => "PENDING",
        ReplicationStatus::Success => "SUCCESS",
        ReplicationStatus::Failed => "FAILED",
    }
}

fn row_to_order_map(row: &sqlx::postgres::PgRow) -> Result<OrderMap> {
    let status_raw: String = row.try_get("replication_status")?;
    Ok(OrderMap {
        id: row.try_get("id")?,
        master_order_id: row.try_get("master_order_id")?,
        follower_order_id: row.try_get("follower_order_id")?,
        follower_user_id: row.try_get("follower_user_id")?,
        master_broker_order_id: row.try_get("master_broker_order_id")?,
        follower_broker_order_id: row.try_get("follower_broker_order_id")?,
        scaling_factor: row.try_get::<Option<Decimal>, _>("scaling_factor")?,
        original_qty: row.try_get("original_qty")?,
        follower_qty: row.try_get("follower_qty")?,
        replication_status: parse_status(&status_raw)?,
        latency_ms: row.try_get("latency_ms")?,
        error: row.try_get("error")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// `order_maps.insert(row)`. One row per (master_order_id,
/// follower_user_id): an `ON CONFLICT` upsert rather than a bare insert, so a
/// worker retrying a previously-`FAILED` follower after bus redelivery
/// updates that same row instead of hitting the unique-index constraint
/// error. The NEW handler still guards the `SUCCESS` case itself (it never
/// re-places an order for a follower already mapped as `SUCCESS`), so in
/// practice this upsert only ever fires once per follower per master order
/// — but making it an upsert means a worker crash between a successful
/// broker call and this write can't turn into a permanent stuck message.
pub async fn insert(pool: &PgPool, new: &NewOrderMap) -> Result<OrderMap> {
    let row = sqlx::query(
        r#"
        insert into order_maps (
            master_order_id, follower_order_id, follower_user_id,
            master_broker_order_id, follower_broker_order_id, scaling_factor,
            original_qty, follower_qty, replication_status, latency_ms, error
        )
        values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        on conflict (master_order_id, follower_user_id) do update set
            follower_order_id = excluded.follower_order_id,
            master_broker_order_id = excluded.master_broker_order_id,
            follower_broker_order_id = excluded.follower_broker_order_id,
            scaling_factor = excluded.scaling_factor,
            original_qty = excluded.original_qty,
            follower_qty = excluded.follower_qty,
            replication_status = excluded.replication_status,
            latency_ms = excluded.latency_ms,
            error = excluded.error,
            updated_at = now()
        returning id, master_order_id, follower_order_id, follower_user_id,
                  master_broker_order_id, follower_broker_order_id, scaling_factor,
                  original_qty, follower_qty, replication_status, latency_ms, error,
                  created_at, updated_at
        "#,
    )
    .bind(new.master_order_id)
    .bind(new.follower_order_id)
    .bind(new.follower_user_id)
    .bind(&new.master_broker_order_id)
    .bind(&new.follower_broker_order_id)
    .bind(new.scaling_factor)
    .bind(new.original_qty)
    .bind(new.follower_qty)
    .bind(status_str(new.replication_status))
    .bind(new.latency_ms)
    .bind(&new.error)
    .fetch_one(pool)
    .await
    .context("order_maps::insert failed")?;

    row_to_order_map(&row)
}

/// `order_maps.for_master(master_order_id)`. Used by MODIFY/CANCEL as
/// the durable fallback when the cache tier misses.
pub async fn for_master(pool: &PgPool, master_order_id: OrderId) -> Result<Vec<OrderMap>> {
    let rows = sqlx::query(
        r#"
        select id, master_order_id, follower_order_id, follower_user_id,
               master_broker_order_id, follower_broker_order_id, scaling_factor,
               original_qty, follower_qty, replication_status, latency_ms, error,
               created_at, updated_at
        from order_maps
        where master_order_id = $1
        order by id asc
        "#,
    )
    .bind(master_order_id)
    .fetch_all(pool)
    .await
    .context("order_maps::for_master failed")?;

    rows.iter().map(row_to_order_map).collect()
}

pub async fn for_master_and_follower(
    pool: &PgPool,
    master_order_id: OrderId,
    follower_user_id: UserId,
) -> Result<Option<OrderMap>> {
    let row = sqlx::query(
        r#"
        select id, master_order_id, follower_order_id, follower_user_id,
               master_broker_order_id, follower_broker_order_id, scaling_factor,
               original_qty, follower_qty, replication_status, latency_ms, error,
               created_at, updated_at
        from order_maps
        where master_order_id = $1 and follower_user_id = $2
        "#,
    )
    .bind(master_order_id)
    .bind(follower_user_id)
    .fetch_optional(pool)
    .await
    .context("order_maps::for_master_and_follower failed")?;

    row.as_ref().map(row_to_order_map).transpose()
}
