use anyhow::{Context, Result};
use rust_decimal::Decimal;
use sqlx::{PgPool, Row};

use replicon_schemas::{FollowerRelationship, User, UserId, UserRole};

use crate::follower_relationships::row_to_relationship;

pub(crate) fn row_to_user(row: &sqlx::postgres::PgRow) -> Result<User> {
    let role_str: String = row.try_get("role")?;
    Ok(User {
        id: row.try_get("id")?,
        role: parse_role(&role_str)?,
        active: row.try_get("active")?,
        broker_account_code: row.try_get("broker_account_code")?,
        broker_user_id: row.try_get("broker_user_id")?,
        broker_password_encrypted: row.try_get("broker_password_encrypted")?,
        broker_api_key_encrypted: row.try_get("broker_api_key_encrypted")?,
        public_ip: row.try_get("public_ip")?,
        balance: row.try_get::<Decimal, _>("balance")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn parse_role(raw: &str) -> Result<UserRole> {
    match raw {
        "MASTER" => Ok(UserRole::Master),
        "FOLLOWER" => Ok(UserRole::Follower),
        "BOTH" => Ok(UserRole::Both),
        other => anyhow::bail!("unknown user role in DB row: {other}"),
    }
}

/// `users.find_active_master_by_broker_code(code)`. Returns `None`
/// (NotFound, at the ingress layer) if nothing matches.
pub async fn find_active_master_by_broker_code(
    pool: &PgPool,
    broker_account_code: &str,
) -> Result<Option<User>> {
    let row = sqlx::query(
        r#"
        select id, role, active, broker_account_code, broker_user_id,
               broker_password_encrypted, broker_api_key_encrypted, public_ip,
               balance, created_at, updated_at
        from users
        where broker_account_code = $1
          and active
          and role in ('MASTER', 'BOTH')
        "#,
    )
    .bind(broker_account_code)
    .fetch_optional(pool)
    .await
    .context("find_active_master_by_broker_code failed")?;

    row.as_ref().map(row_to_user).transpose()
}

/// `users.get(id)`.
pub async fn get(pool: &PgPool, id: UserId) -> Result<Option<User>> {
    let row = sqlx::query(
        r#"
        select id, role, active, broker_account_code, broker_user_id,
               broker_password_encrypted, broker_api_key_encrypted, public_ip,
               balance, created_at, updated_at
        from users
        where id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("users::get failed")?;

    row.as_ref().map(row_to_user).transpose()
}

/// `users.active_followers_of(master_id)`: returns `(User,
/// FollowerRelationship)` pairs. The NEW fan-out restricts further to
/// `active ∧ auto_follow`; this query returns every active relationship and
/// leaves the `auto_follow` filter to the caller via
/// `FollowerRelationship::is_fan_out_candidate`, since MODIFY/CANCEL lookups
/// reuse the relationship rows without needing the auto_follow gate.
pub async fn active_followers_of(
    pool: &PgPool,
    master_id: UserId,
) -> Result<Vec<(User, FollowerRelationship)>> {
    let rows = sqlx::query(
        r#"
        select
            u.id as u_id, u.role as u_role, u.active as u_active,
            u.broker_account_code as u_broker_account_code,
            u.broker_user_id as u_broker_user_id,
            u.broker_password_encrypted as u_broker_password_encrypted,
            u.broker_api_key_encrypted as u_broker_api_key_encrypted,
            u.public_ip as u_public_ip, u.balance as u_balance,
            u.created_at as u_created_at, u.updated_at as u_updated_at,
            r.id as r_id, r.master_id as r_master_id, r.follower_id as r_follower_id,
            r.active as r_active, r.auto_follow as r_auto_follow,
            r.copy_strategy as r_copy_strategy, r.ratio as r_ratio,
            r.percentage as r_percentage, r.fixed_quantity as r_fixed_quantity,
            r.max_order_value as r_max_order_value, r.max_daily_loss as r_max_daily_loss,
            r.created_at as r_created_at, r.updated_at as r_updated_at
        from follower_relationships r
        join users u on u.id = r.follower_id
        where r.master_id = $1
          and r.active
        order by r.id asc
        "#,
    )
    .bind(master_id)
    .fetch_all(pool)
    .await
    .context("active_followers_of failed")?;

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let role_str: String = row.try_get("u_role")?;
        let user = User {
            id: row.try_get("u_id")?,
            role: parse_role(&role_str)?,
            active: row.try_get("u_active")?,
            broker_account_code: row.try_get("u_broker_account_code")?,
            broker_user_id: row.try_get("u_broker_user_id")?,
            broker_password_encrypted: row.try_get("u_broker_password_encrypted")?,
            broker_api_key_encrypted: row.try_get("u_broker_api_key_encrypted")?,
            public_ip: row.try_get("u_public_ip")?,
            balance: row.try_get::<Decimal, _>("u_balance")?,
            created_at: row.try_get("u_created_at")?,
            updated_at: row.try_get("u_updated_at")?,
        };
        let relationship = row_to_relationship(&row, "r_")?;
        out.push((user, relationship));
    }
    Ok(out)
}
