//! `audit.append(row)`, persisted as a table (`replicon_audit`) rather
//! than the append-only JSONL file some sibling tooling in this workspace
//! uses for the same purpose — this spec frames audit as one more
//! Persistent Store operation, so it lives alongside the other tables. The
//! hash-chain tamper-evidence technique is kept: each row's `hash_self` is
//! the SHA-256 of its own canonical JSON (with `hash_self` cleared) chained
//! to the previous row's `hash_self`, so `verify_hash_chain` can detect any
//! row being edited or deleted out from under the chain.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use sha2::{Digest, Sha256};
use sqlx::{PgPool, Row};

#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub id: i64,
    pub topic: String,
    pub event_type: String,
    pub payload: Value,
    pub hash_prev: Option<String>,
    pub hash_self: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Append one audit row, chaining it to the topic's most recent row.
///
/// Grounded on the same canonical-JSON + SHA-256 technique used elsewhere
/// in this workspace for hash-chained logs, retargeted at a DB row instead
/// of a JSONL line. The whole append is one transaction so the "read last
/// hash, then insert" race between concurrent appenders on the same topic
/// can't produce two rows claiming the same `hash_prev`.
pub async fn append(pool: &PgPool, topic: &str, event_type: &str, payload: Value) -> Result<AuditEvent> {
    let mut tx = pool.begin().await.context("audit::append begin tx failed")?;

    let prev_hash: Option<String> = sqlx::query_scalar(
        r#"
        select hash_self from replicon_audit
        where topic = $1
        order by id desc
        limit 1
        "#,
    )
    .bind(topic)
    .fetch_optional(&mut *tx)
    .await
    .context("audit::append read last hash failed")?
    .flatten();

    let hash_self = compute_hash(prev_hash.as_deref(), topic, event_type, &payload);

    let row = sqlx::query(
        r#"
        insert into replicon_audit (topic, event_type, payload, hash_prev, hash_self)
        values ($1, $2, $3, $4, $5)
        returning id, topic, event_type, payload, hash_prev, hash_self, created_at
        "#,
    )
    .bind(topic)
    .bind(event_type)
    .bind(&payload)
    .bind(&prev_hash)
    .bind(&hash_self)
    .fetch_one(&mut *tx)
    .await
    .context("audit::append insert failed")?;

    tx.commit().await.context("audit::append commit failed")?;

    Ok(AuditEvent {
        id: row.try_get("id")?,
        topic: row.try_get("topic")?,
        event_type: row.try_get("event_type")?,
        payload: row.try_get("payload")?,
        hash_prev: row.try_get("hash_prev")?,
        hash_self: row.try_get("hash_self")?,
        created_at: row.try_get("created_at")?,
    })
}

fn compute_hash(prev_hash: Option<&str>, topic: &str, event_type: &str, payload: &Value) -> String {
    let canonical = serde_json::json!({
        "topic": topic,
        "event_type": event_type,
        "payload": sort_keys(payload),
        "hash_prev": prev_hash,
    });
    let mut hasher = Sha256::new();
    hasher.update(canonical.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

fn sort_keys(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut keys: Vec<_> = map.keys().cloned().collect();
            keys.sort();
            let mut new = serde_json::Map::new();
            for k in keys {
                new.insert(k.clone(), sort_keys(&map[&k]));
            }
            Value::Object(new)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_keys).collect()),
        _ => v.clone(),
    }
}

/// Verify the hash chain for a single topic, in insertion order. Returns
/// the row id at which the chain breaks, if any.
pub async fn verify_hash_chain(pool: &PgPool, topic: &str) -> Result<Option<i64>> {
    let rows = sqlx::query(
        r#"
        select id, topic, event_type, payload, hash_prev, hash_self, created_at
        from replicon_audit
        where topic = $1
        order by id asc
        "#,
    )
    .bind(topic)
    .fetch_all(pool)
    .await
    .context("audit::verify_hash_chain query failed")?;

    let mut prev_hash: Option<String> = None;
    for row in rows {
        let id: i64 = row.try_get("id")?;
        let event_type: String = row.try_get("event_type")?;
        let payload: Value = row.try_get("payload")?;
        let hash_prev: Option<String> = row.try_get("hash_prev")?;
        let hash_self: Option<String> = row.try_get("hash_self")?;

        if hash_prev != prev_hash {
            return Ok(Some(id));
        }
        let recomputed = compute_hash(prev_hash.as_deref(), topic, &event_type, &payload);
        if Some(recomputed) != hash_self {
            return Ok(Some(id));
        }
        prev_hash = hash_self;
    }

    Ok(None)
}
