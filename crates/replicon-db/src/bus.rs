//! Event Bus, built on Postgres (`replicon_bus_outbox`) instead of a
//! message-broker dependency. See DESIGN.md for why: the pattern is
//! adapted directly from this workspace's own outbox/inbox durable-queue
//! idiom, used elsewhere for broker order dispatch, and it satisfies every
//! durability/ordering property this pipeline needs without introducing a
//! new kind of infrastructure dependency.
//!
//! - Subjects: `orders.new | orders.modified | orders.cancelled | orders.filled`.
//! - Idempotency: `idempotency_key` is `UNIQUE`; `publish` is `INSERT ...
//!   ON CONFLICT DO NOTHING`, so a duplicate publish is a no-op forever,
//!   not just within a sliding window.
//! - Durable consumer: `claim_batch` claims PENDING rows with `FOR UPDATE
//!   SKIP LOCKED`, so multiple worker processes never claim the same row.
//! - Ack-wait / max-deliver: `requeue_expired_claims` is the reaper that
//!   implements both — a claim older than `ack_wait` goes back to PENDING
//!   (and `deliver_count` increments) unless `deliver_count` has already
//!   reached `max_deliver`, in which case the row is marked `DEAD`.
//! - Ordering: `claim_batch` orders by `(master_order_id, id)`, and the
//!   worker takes a per-master-order-id advisory lock while handling one
//!   claimed row, so NEW always finishes before a later MODIFY/CANCEL for
//!   the same master order is even attempted.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{PgPool, Row};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusMessageStatus {
    Pending,
    Claimed,
    Acked,
    Dead,
}

#[derive(Debug, Clone)]
pub struct BusMessage {
    pub id: i64,
    pub subject: String,
    pub master_order_id: i64,
    pub idempotency_key: String,
    pub payload: Value,
    pub status: BusMessageStatus,
    pub deliver_count: i32,
    pub claimed_at: Option<DateTime<Utc>>,
    pub claimed_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

fn parse_status(raw: &str) -> Result<BusMessageStatus> {
    match raw {
        "PENDING" => Ok(BusMessageStatus::Pending),
        "CLAIMED" => Ok(BusMessageStatus::Claimed),
        "ACKED" => Ok(BusMessageStatus::Acked),
        "DEAD" => Ok(BusMessageStatus::Dead),
        other => anyhow::bail!("unknown bus message status in DB row: {other}"),
    }
}

fn row_to_message(row: &sqlx::postgres::PgRow) -> Result<BusMessage> {
    let status_raw: String = row.try_get("status")?;
    Ok(BusMessage {
        id: row.try_get("id")?,
        subject: row.try_get("subject")?,
        master_order_id: row.try_get("master_order_id")?,
        idempotency_key: row.try_get("idempotency_key")?,
        payload: row.try_get("payload")?,
        status: parse_status(&status_raw)?,
        deliver_count: row.try_get("deliver_count")?,
        claimed_at: row.try_get("claimed_at")?,
        claimed_by: row.try_get("claimed_by")?,
        created_at: row.try_get("created_at")?,
    })
}

/// Publish one event. Returns `false` (no row created)
/// if `idempotency_key` already exists — the caller should treat that as a
/// successful no-op, not an error.
pub async fn publish(
    pool: &PgPool,
    subject: &str,
    master_order_id: i64,
    idempotency_key: &str,
    payload: Value,
) -> Result<bool> {
    let row: Option<(i64,)> = sqlx::query_as(
        r#"
        insert into replicon_bus_outbox (subject, master_order_id, idempotency_key, payload, status)
        values ($1, $2, $3, $4, 'PENDING')
        on conflict (idempotency_key) do nothing
        returning id
        "#,
    )
    .bind(subject)
    .bind(master_order_id)
    .bind(idempotency_key)
    .bind(payload)
    .fetch_optional(pool)
    .await
    .context("bus::publish failed")?;

    Ok(row.is_some())
}

/// Atomically claim up to `batch_size` PENDING rows for exclusive
/// dispatch, ordered so that a master order's own events are delivered in
/// publish order ahead of any other master order's events in the same
/// batch.
pub async fn claim_batch(pool: &PgPool, batch_size: i64, consumer_id: &str) -> Result<Vec<BusMessage>> {
    let rows = sqlx::query(
        r#"
        with to_claim as (
            select id
            from replicon_bus_outbox
            where status = 'PENDING'
            order by master_order_id asc, id asc
            limit $1
            for update skip locked
        )
        update replicon_bus_outbox
           set status = 'CLAIMED',
               claimed_at = now(),
               claimed_by = $2,
               deliver_count = deliver_count + 1
         where id in (select id from to_claim)
        returning id, subject, master_order_id, idempotency_key, payload, status,
                  deliver_count, claimed_at, claimed_by, created_at
        "#,
    )
    .bind(batch_size)
    .bind(consumer_id)
    .fetch_all(pool)
    .await
    .context("bus::claim_batch failed")?;

    rows.iter().map(row_to_message).collect()
}

/// Mark a claimed message ACKED.
pub async fn ack(pool: &PgPool, id: i64) -> Result<bool> {
    let row: Option<(i64,)> = sqlx::query_as(
        r#"
        update replicon_bus_outbox
           set status = 'ACKED'
         where id = $1 and status = 'CLAIMED'
        returning id
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("bus::ack failed")?;

    Ok(row.is_some())
}

/// Release a claimed message back to PENDING immediately, for worker-level
/// failures the worker wants redelivered right away rather than waiting
/// out the full `ack_wait` window. The delay itself, if any, is the
/// caller's responsibility (e.g. sleep
/// before the next `claim_batch` call); the bus only guarantees the row is
/// claimable again.
pub async fn nack_with_delay(pool: &PgPool, id: i64) -> Result<bool> {
    let row: Option<(i64,)> = sqlx::query_as(
        r#"
        update replicon_bus_outbox
           set status = 'PENDING',
               claimed_at = null,
               claimed_by = null
         where id = $1 and status = 'CLAIMED'
        returning id
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("bus::nack_with_delay failed")?;

    Ok(row.is_some())
}

/// Reaper: requeue claims older than `ack_wait_secs` back to PENDING, or
/// flip them to DEAD once `deliver_count` has reached `max_deliver`.
/// Returns the ids that were newly marked DEAD.
pub async fn requeue_expired_claims(
    pool: &PgPool,
    ack_wait_secs: i64,
    max_deliver: i32,
) -> Result<Vec<i64>> {
    let dead: Vec<(i64,)> = sqlx::query_as(
        r#"
        update replicon_bus_outbox
           set status = 'DEAD'
         where status = 'CLAIMED'
           and claimed_at < now() - make_interval(secs => $1)
           and deliver_count >= $2
        returning id
        "#,
    )
    .bind(ack_wait_secs as f64)
    .bind(max_deliver)
    .fetch_all(pool)
    .await
    .context("bus::requeue_expired_claims dead-letter pass failed")?;

    sqlx::query(
        r#"
        update replicon_bus_outbox
           set status = 'PENDING',
               claimed_at = null,
               claimed_by = null
         where status = 'CLAIMED'
           and claimed_at < now() - make_interval(secs => $1)
           and deliver_count < $2
        "#,
    )
    .bind(ack_wait_secs as f64)
    .bind(max_deliver)
    .execute(pool)
    .await
    .context("bus::requeue_expired_claims requeue pass failed")?;

    Ok(dead.into_iter().map(|(id,)| id).collect())
}

/// Bounded-persistence housekeeping. Deletes ACKED
/// rows older than `retention_days`; physical byte-bound is an operational
/// concern left to the deployment, not enforced per-row here.
pub async fn reap_acked_older_than(pool: &PgPool, retention_days: i64) -> Result<u64> {
    let result = sqlx::query(
        r#"
        delete from replicon_bus_outbox
        where status = 'ACKED'
          and created_at < now() - make_interval(days => $1)
        "#,
    )
    .bind(retention_days as f64)
    .execute(pool)
    .await
    .context("bus::reap_acked_older_than failed")?;

    Ok(result.rows_affected())
}

/// Per-master-order-id serialization point, giving a single-partition-stream
/// ordering guarantee. Call within the same transaction that processes one
/// claimed message so two worker processes can never interleave NEW and a
/// later MODIFY/CANCEL/FILL for the same master order.
pub async fn lock_master_order_for_processing(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    master_order_id: i64,
) -> Result<()> {
    sqlx::query("select pg_advisory_xact_lock(hashtext($1::text)::bigint)")
        .bind(master_order_id)
        .execute(&mut **tx)
        .await
        .context("bus::lock_master_order_for_processing failed")?;
    Ok(())
}
