use anyhow::{Context, Result};
use rust_decimal::Decimal;
use sqlx::{PgPool, Row};

use replicon_schemas::{
    FollowerOrderPatch, MasterOrderPatch, NewFollowerOrder, NewMasterOrder, Order, OrderId,
    OrderSide, OrderStatus, OrderType, UserId,
};

fn parse_side(raw: &str) -> Result<OrderSide> {
    match raw {
        "BUY" => Ok(OrderSide::Buy),
        "SELL" => Ok(OrderSide::Sell),
        other => anyhow::bail!("unknown order side in DB row: {other}"),
    }
}

fn side_str(side: OrderSide) -> &'static str {
    match side {
        OrderSide::Buy => "BUY",
        OrderSide::Sell => "SELL",
    }
}

fn parse_order_type(raw: &str) -> Result<OrderType> {
    match raw {
        "MARKET" => Ok(OrderType::Market),
        "LIMIT" => Ok(OrderType::Limit),
        "STOP_LOSS" => Ok(OrderType::StopLoss),
        "STOP_LOSS_MARKET" => Ok(OrderType::StopLossMarket),
        other => anyhow::bail!("unknown order_type in DB row: {other}"),
    }
}

fn order_type_str(t: OrderType) -> &'static str {
    match t {
        OrderType::Market => "MARKET",
        OrderType::Limit => "LIMIT",
        OrderType::StopLoss => "STOP_LOSS",
        OrderType::StopLossMarket => "STOP_LOSS_MARKET",
    }
}

fn parse_status(raw: &str) -> Result<OrderStatus> {
    match raw {
        "PENDING" => Ok(OrderStatus::Pending),
        "SUBMITTED" => Ok(OrderStatus::Submitted),
        "PARTIALLY_FILLED" => Ok(OrderStatus::PartiallyFilled),
        "FILLED" => Ok(OrderStatus::Filled),
        "CANCELLED" => Ok(OrderStatus::Cancelled),
        "REJECTED" => Ok(OrderStatus::Rejected),
        "FAILED" => Ok(OrderStatus::Failed),
        other => anyhow::bail!("unknown order status in DB row: {other}"),
    }
}

fn status_str(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::Pending => "PENDING",
        OrderStatus::Submitted => "SUBMITTED",
        OrderStatus::PartiallyFilled => "PARTIALLY_FILLED",
        OrderStatus::Filled => "FILLED",
        OrderStatus::Cancelled => "CANCELLED",
        OrderStatus::Rejected => "REJECTED",
        OrderStatus::Failed => "FAILED",
    }
}

fn row_to_order(row: &sqlx::postgres::PgRow) -> Result<Order> {
    let side_raw: String = row.try_get("side")?;
    let type_raw: String = row.try_get("order_type")?;
    let status_raw: String = row.try_get("status")?;
    Ok(Order {
        id: row.try_get("id")?,
        owner_user_id: row.try_get("owner_user_id")?,
        is_master: row.try_get("is_master")?,
        parent_master_order_id: row.try_get("parent_master_order_id")?,
        symbol: row.try_get("symbol")?,
        scrip_code: row.try_get("scrip_code")?,
        side: parse_side(&side_raw)?,
        order_type: parse_order_type(&type_raw)?,
        requested_qty: row.try_get("requested_qty")?,
        price: row.try_get::<Option<Decimal>, _>("price")?,
        filled_qty: row.try_get("filled_qty")?,
        average_price: row.try_get::<Option<Decimal>, _>("average_price")?,
        status: parse_status(&status_raw)?,
        broker_order_id: row.try_get("broker_order_id")?,
        exchange_order_id: row.try_get("exchange_order_id")?,
        error_message: row.try_get("error_message")?,
        replication_latency_ms: row.try_get("replication_latency_ms")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

pub async fn get(pool: &PgPool, id: OrderId) -> Result<Option<Order>> {
    let row = sqlx::query(
        r#"
        select id, owner_user_id, is_master, parent_master_order_id, symbol, scrip_code,
               side, order_type, requested_qty, price, filled_qty, average_price, status,
               broker_order_id, exchange_order_id, error_message, replication_latency_ms,
               created_at, updated_at
        from orders
        where id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("orders::get failed")?;

    row.as_ref().map(row_to_order).transpose()
}

/// `orders.upsert_master(owner_id, broker_order_id, patch)`: create on
/// first sight, else apply the ingress status-mapping patch. Returns the
/// resulting row.
pub async fn upsert_master(
    pool: &PgPool,
    broker_order_id: &str,
    new: &NewMasterOrder,
    patch_if_exists: &MasterOrderPatch,
) -> Result<Order> {
    let existing = sqlx::query(
        r#"
        select id, owner_user_id, is_master, parent_master_order_id, symbol, scrip_code,
               side, order_type, requested_qty, price, filled_qty, average_price, status,
               broker_order_id, exchange_order_id, error_message, replication_latency_ms,
               created_at, updated_at
        from orders
        where owner_user_id = $1 and broker_order_id = $2 and is_master
        "#,
    )
    .bind(new.owner_user_id)
    .bind(broker_order_id)
    .fetch_optional(pool)
    .await
    .context("upsert_master lookup failed")?;

    if let Some(row) = existing {
        let current = row_to_order(&row)?;
        let filled_qty = patch_if_exists.filled_qty.unwrap_or(current.filled_qty);
        let average_price = patch_if_exists
            .average_price
            .or(current.average_price);
        let exchange_order_id = patch_if_exists
            .exchange_order_id
            .clone()
            .or(current.exchange_order_id);
        let status = patch_if_exists.status.unwrap_or(current.status);

        let row = sqlx::query(
            r#"
            update orders
               set filled_qty = $2,
                   average_price = $3,
                   exchange_order_id = $4,
                   status = $5,
                   updated_at = now()
             where id = $1
            returning id, owner_user_id, is_master, parent_master_order_id, symbol, scrip_code,
                      side, order_type, requested_qty, price, filled_qty, average_price, status,
                      broker_order_id, exchange_order_id, error_message, replication_latency_ms,
                      created_at, updated_at
            "#,
        )
        .bind(current.id)
        .bind(filled_qty)
        .bind(average_price)
        .bind(exchange_order_id)
        .bind(status_str(status))
        .fetch_one(pool)
        .await
        .context("upsert_master update failed")?;

        return row_to_order(&row);
    }

    let row = sqlx::query(
        r#"
        insert into orders (
            owner_user_id, is_master, parent_master_order_id, symbol, scrip_code,
            side, order_type, requested_qty, price, filled_qty, average_price,
            status, broker_order_id, exchange_order_id
        )
        values ($1, true, null, $2, $3, $4, $5, $6, $7, 0, null, $8, $9, $10)
        returning id, owner_user_id, is_master, parent_master_order_id, symbol, scrip_code,
                  side, order_type, requested_qty, price, filled_qty, average_price, status,
                  broker_order_id, exchange_order_id, error_message, replication_latency_ms,
                  created_at, updated_at
        "#,
    )
    .bind(new.owner_user_id)
    .bind(&new.symbol)
    .bind(&new.scrip_code)
    .bind(side_str(new.side))
    .bind(order_type_str(new.order_type))
    .bind(new.requested_qty)
    .bind(new.price)
    .bind(status_str(new.status))
    .bind(broker_order_id)
    .bind(&new.exchange_order_id)
    .fetch_one(pool)
    .await
    .context("upsert_master insert failed")?;

    row_to_order(&row)
}

/// `orders.insert_follower(row)`: created exactly
/// once, on a successful NEW fan-out.
pub async fn insert_follower(pool: &PgPool, new: &NewFollowerOrder) -> Result<Order> {
    let row = sqlx::query(
        r#"
        insert into orders (
            owner_user_id, is_master, parent_master_order_id, symbol, scrip_code,
            side, order_type, requested_qty, price, filled_qty, average_price,
            status, broker_order_id, exchange_order_id
        )
        values ($1, false, $2, $3, $4, $5, $6, $7, $8, 0, null, 'SUBMITTED', $9, $10)
        returning id, owner_user_id, is_master, parent_master_order_id, symbol, scrip_code,
                  side, order_type, requested_qty, price, filled_qty, average_price, status,
                  broker_order_id, exchange_order_id, error_message, replication_latency_ms,
                  created_at, updated_at
        "#,
    )
    .bind(new.owner_user_id)
    .bind(new.parent_master_order_id)
    .bind(&new.symbol)
    .bind(&new.scrip_code)
    .bind(side_str(new.side))
    .bind(order_type_str(new.order_type))
    .bind(new.requested_qty)
    .bind(new.price)
    .bind(&new.broker_order_id)
    .bind(&new.exchange_order_id)
    .fetch_one(pool)
    .await
    .context("insert_follower failed")?;

    row_to_order(&row)
}

/// `orders.update(id, patch)`. Used by MODIFY/CANCEL/FILL handlers.
pub async fn update(pool: &PgPool, id: OrderId, patch: &FollowerOrderPatch) -> Result<Order> {
    let current = get(pool, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("order {id} not found"))?;

    let price = patch.price.or(current.price);
    let filled_qty = patch.filled_qty.unwrap_or(current.filled_qty);
    let average_price = patch.average_price.or(current.average_price);
    let status = patch.status.unwrap_or(current.status);
    let error_message = patch
        .error_message
        .clone()
        .or(current.error_message.clone());
    let replication_latency_ms = patch
        .replication_latency_ms
        .or(current.replication_latency_ms);

    let row = sqlx::query(
        r#"
        update orders
           set price = $2,
               filled_qty = $3,
               average_price = $4,
               status = $5,
               error_message = $6,
               replication_latency_ms = $7,
               updated_at = now()
         where id = $1
        returning id, owner_user_id, is_master, parent_master_order_id, symbol, scrip_code,
                  side, order_type, requested_qty, price, filled_qty, average_price, status,
                  broker_order_id, exchange_order_id, error_message, replication_latency_ms,
                  created_at, updated_at
        "#,
    )
    .bind(id)
    .bind(price)
    .bind(filled_qty)
    .bind(average_price)
    .bind(status_str(status))
    .bind(error_message)
    .bind(replication_latency_ms)
    .fetch_one(pool)
    .await
    .context("orders::update failed")?;

    row_to_order(&row)
}

pub async fn find_by_broker_order_id(
    pool: &PgPool,
    owner_user_id: UserId,
    broker_order_id: &str,
) -> Result<Option<Order>> {
    let row = sqlx::query(
        r#"
        select id, owner_user_id, is_master, parent_master_order_id, symbol, scrip_code,
               side, order_type, requested_qty, price, filled_qty, average_price, status,
               broker_order_id, exchange_order_id, error_message, replication_latency_ms,
               created_at, updated_at
        from orders
        where owner_user_id = $1 and broker_order_id = $2
        "#,
    )
    .bind(owner_user_id)
    .bind(broker_order_id)
    .fetch_optional(pool)
    .await
    .context("find_by_broker_order_id failed")?;

    row.as_ref().map(row_to_order).transpose()
}
