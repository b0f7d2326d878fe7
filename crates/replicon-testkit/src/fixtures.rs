//! Fixture builders for scenario tests. Raw `INSERT`s rather than an
//! admin-surface CRUD layer, which is out of scope here — these exist only
//! to seed rows the core pipeline then reads, never to exercise that CRUD
//! surface itself.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use sqlx::{PgPool, Row};

use replicon_schemas::{CopyStrategy, UserId, UserRole};

fn role_str(role: UserRole) -> &'static str {
    match role {
        UserRole::Master => "MASTER",
        UserRole::Follower => "FOLLOWER",
        UserRole::Both => "BOTH",
    }
}

fn copy_strategy_str(strategy: CopyStrategy) -> &'static str {
    match strategy {
        CopyStrategy::FixedRatio => "FIXED_RATIO",
        CopyStrategy::Percentage => "PERCENTAGE",
        CopyStrategy::FixedQuantity => "FIXED_QUANTITY",
    }
}

/// `broker_account_code` is the caller's responsibility — tests should pass
/// a `uuid`-suffixed value so repeated runs against a shared database don't
/// collide on the unique index.
pub async fn insert_user(
    pool: &PgPool,
    role: UserRole,
    broker_account_code: &str,
    balance: Decimal,
) -> Result<UserId> {
    let row = sqlx::query(
        r#"
        insert into users (
            role, active, broker_account_code, broker_user_id,
            broker_password_encrypted, broker_api_key_encrypted, public_ip, balance
        )
        values ($1, true, $2, $3, 'testkit-encrypted-secret', null, '127.0.0.1', $4)
        returning id
        "#,
    )
    .bind(role_str(role))
    .bind(broker_account_code)
    .bind(format!("{broker_account_code}-broker-user"))
    .bind(balance)
    .fetch_one(pool)
    .await
    .context("fixtures::insert_user failed")?;

    Ok(row.try_get("id")?)
}

pub async fn deactivate_user(pool: &PgPool, user_id: UserId) -> Result<()> {
    sqlx::query("update users set active = false where id = $1")
        .bind(user_id)
        .execute(pool)
        .await
        .context("fixtures::deactivate_user failed")?;
    Ok(())
}

#[derive(Debug, Clone, Default)]
pub struct NewRelationshipFixture {
    pub auto_follow: bool,
    pub ratio: Option<Decimal>,
    pub percentage: Option<Decimal>,
    pub fixed_quantity: Option<i64>,
}

pub async fn insert_relationship(
    pool: &PgPool,
    master_id: UserId,
    follower_id: UserId,
    strategy: CopyStrategy,
    fixture: NewRelationshipFixture,
) -> Result<()> {
    sqlx::query(
        r#"
        insert into follower_relationships (
            master_id, follower_id, active, auto_follow, copy_strategy,
            ratio, percentage, fixed_quantity
        )
        values ($1, $2, true, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(master_id)
    .bind(follower_id)
    .bind(fixture.auto_follow)
    .bind(copy_strategy_str(strategy))
    .bind(fixture.ratio)
    .bind(fixture.percentage)
    .bind(fixture.fixed_quantity)
    .execute(pool)
    .await
    .context("fixtures::insert_relationship failed")?;

    Ok(())
}

/// A unique-enough fixture identifier so concurrent test runs against a
/// shared database don't collide on `broker_account_code`'s unique index.
pub fn unique_code(prefix: &str) -> String {
    format!("{prefix}-{}", uuid::Uuid::new_v4())
}
