use anyhow::{Context, Result};
use rust_decimal::Decimal;
use sqlx::{PgPool, Row};

use replicon_schemas::{CopyStrategy, FollowerRelationship, FollowerRelationshipId, UserId};

fn parse_copy_strategy(raw: &str) -> Result<CopyStrategy> {
    match raw {
        "FIXED_RATIO" => Ok(CopyStrategy::FixedRatio),
        "PERCENTAGE" => Ok(CopyStrategy::Percentage),
        "FIXED_QUANTITY" => Ok(CopyStrategy::FixedQuantity),
        other => anyhow::bail!("unknown copy_strategy in DB row: {other}"),
    }
}

/// Shared row decoder. `prefix` lets callers alias columns (e.g. `r_id`)
/// when joining `follower_relationships` against another table, as
/// `users::active_followers_of` does.
pub(crate) fn row_to_relationship(
    row: &sqlx::postgres::PgRow,
    prefix: &str,
) -> Result<FollowerRelationship> {
    let copy_strategy_str: String = row.try_get(format!("{prefix}copy_strategy").as_str())?;
    Ok(FollowerRelationship {
        id: row.try_get(format!("{prefix}id").as_str())?,
        master_id: row.try_get(format!("{prefix}master_id").as_str())?,
        follower_id: row.try_get(format!("{prefix}follower_id").as_str())?,
        active: row.try_get(format!("{prefix}active").as_str())?,
        auto_follow: row.try_get(format!("{prefix}auto_follow").as_str())?,
        copy_strategy: parse_copy_strategy(&copy_strategy_str)?,
        ratio: row.try_get::<Option<Decimal>, _>(format!("{prefix}ratio").as_str())?,
        percentage: row.try_get::<Option<Decimal>, _>(format!("{prefix}percentage").as_str())?,
        fixed_quantity: row.try_get(format!("{prefix}fixed_quantity").as_str())?,
        max_order_value: row
            .try_get::<Option<Decimal>, _>(format!("{prefix}max_order_value").as_str())?,
        max_daily_loss: row
            .try_get::<Option<Decimal>, _>(format!("{prefix}max_daily_loss").as_str())?,
        created_at: row.try_get(format!("{prefix}created_at").as_str())?,
        updated_at: row.try_get(format!("{prefix}updated_at").as_str())?,
    })
}

pub async fn get(
    pool: &PgPool,
    id: FollowerRelationshipId,
) -> Result<Option<FollowerRelationship>> {
    let row = sqlx::query(
        r#"
        select id, master_id, follower_id, active, auto_follow, copy_strategy,
               ratio, percentage, fixed_quantity, max_order_value, max_daily_loss,
               created_at, updated_at
        from follower_relationships
        where id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("follower_relationships::get failed")?;

    row.as_ref().map(|r| row_to_relationship(r, "")).transpose()
}

/// Used by admin-surface callers (out of this core's scope, but exercised
/// by tests that need to seed fixtures directly).
pub async fn for_master_and_follower(
    pool: &PgPool,
    master_id: UserId,
    follower_id: UserId,
) -> Result<Option<FollowerRelationship>> {
    let row = sqlx::query(
        r#"
        select id, master_id, follower_id, active, auto_follow, copy_strategy,
               ratio, percentage, fixed_quantity, max_order_value, max_daily_loss,
               created_at, updated_at
        from follower_relationships
        where master_id = $1 and follower_id = $2
        "#,
    )
    .bind(master_id)
    .bind(follower_id)
    .fetch_optional(pool)
    .await
    .context("follower_relationships::for_master_and_follower failed")?;

    row.as_ref().map(|r| row_to_relationship(r, "")).transpose()
}
