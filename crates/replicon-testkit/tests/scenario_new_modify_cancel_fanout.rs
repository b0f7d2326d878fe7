//! End-to-end scenarios: simple fan-out, modify, cancel,
//! orphan modify, and partial per-follower failure. Skipped (not faked)
//! when `DATABASE_URL`/`REDIS_URL` are not set.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;

use replicon_broker_paper::PaperBroker;
use replicon_schemas::{
    CopyStrategy, EventKind, Exchange, ExchangeType, NewMasterOrder, NormalizedOrderEvent,
    OrderSide, OrderStatus, OrderType, ReplicationStatus, UserRole,
};
use replicon_testkit::fixtures::{self, NewRelationshipFixture};
use replicon_testkit::{build_worker_context, test_env_from_env, RejectingBroker};
use replicon_worker::handlers::{handle_cancel, handle_modify, handle_new};

fn new_event(master_order_id: i64, master_user_id: i64, kind: EventKind, price: Decimal, qty: i64) -> NormalizedOrderEvent {
    let now = Utc::now();
    NormalizedOrderEvent {
        event_kind: kind,
        master_order_id,
        master_user_id,
        symbol: "RELIANCE".into(),
        scrip_code: Some("2885".into()),
        exchange: Exchange::Nse,
        exchange_type: ExchangeType::Cash,
        side: OrderSide::Buy,
        order_type: OrderType::Limit,
        quantity: qty,
        price: Some(price),
        trigger_price: None,
        filled_qty: 0,
        average_price: None,
        status: "PENDING".into(),
        product: Some("MIS".into()),
        validity: Some("DAY".into()),
        is_intraday: true,
        event_timestamp: now,
        idempotency_key: NormalizedOrderEvent::derive_idempotency_key(master_order_id, kind, now),
        metadata: HashMap::new(),
    }
}

#[tokio::test]
async fn scenario_1_simple_fan_out_ratio_and_percentage() {
    let Some(env) = test_env_from_env().await else {
        eprintln!("SKIP: DATABASE_URL/REDIS_URL not set");
        return;
    };

    let prefix = fixtures::unique_code("s1-master");
    let master_id = fixtures::insert_user(&env.pool, UserRole::Master, &prefix, Decimal::ZERO)
        .await
        .unwrap();
    let f1_code = fixtures::unique_code("s1-f1");
    let f1 = fixtures::insert_user(&env.pool, UserRole::Follower, &f1_code, Decimal::new(1_000_000_00, 2))
        .await
        .unwrap();
    let f2_code = fixtures::unique_code("s1-f2");
    let f2 = fixtures::insert_user(&env.pool, UserRole::Follower, &f2_code, Decimal::new(1_000_000_00, 2))
        .await
        .unwrap();

    fixtures::insert_relationship(
        &env.pool,
        master_id,
        f1,
        CopyStrategy::FixedRatio,
        NewRelationshipFixture {
            auto_follow: true,
            ratio: Some(Decimal::ONE),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    fixtures::insert_relationship(
        &env.pool,
        master_id,
        f2,
        CopyStrategy::FixedRatio,
        NewRelationshipFixture {
            auto_follow: true,
            ratio: Some(Decimal::new(20, 1)), // 2.0
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let master_order = replicon_db::orders::upsert_master(
        &env.pool,
        "O1",
        &NewMasterOrder {
            owner_user_id: master_id,
            symbol: "RELIANCE".into(),
            scrip_code: Some("2885".into()),
            side: OrderSide::Buy,
            order_type: OrderType::Limit,
            requested_qty: 10,
            price: Some(Decimal::new(250050, 2)),
            broker_order_id: "O1".into(),
            exchange_order_id: None,
            status: OrderStatus::Pending,
        },
        &Default::default(),
    )
    .await
    .unwrap();

    let ctx = build_worker_context(&env, Arc::new(PaperBroker::new()));

    let event = new_event(master_order.id, master_id, EventKind::New, Decimal::new(250050, 2), 10);
    handle_new(&ctx, &event).await.unwrap();

    let maps = replicon_db::order_maps::for_master(&env.pool, master_order.id)
        .await
        .unwrap();
    assert_eq!(maps.len(), 2);
    assert!(maps.iter().all(|m| m.replication_status == ReplicationStatus::Success));

    let mut qty_by_follower: HashMap<i64, i64> = maps.iter().map(|m| (m.follower_user_id, m.follower_qty)).collect();
    assert_eq!(qty_by_follower.remove(&f1), Some(10));
    assert_eq!(qty_by_follower.remove(&f2), Some(20));

    let cached = ctx.order_map_cache.get(master_order.id).await.unwrap();
    assert_eq!(cached.len(), 2);

    replicon_testkit::purge_fixtures_with_prefix(&env.pool, "s1-").await.unwrap();
}

#[tokio::test]
async fn scenario_2_and_3_modify_then_cancel_touch_no_new_rows() {
    let Some(env) = test_env_from_env().await else {
        eprintln!("SKIP: DATABASE_URL/REDIS_URL not set");
        return;
    };

    let prefix = "s23-";
    let master_id = fixtures::insert_user(&env.pool, UserRole::Master, &fixtures::unique_code("s23-master"), Decimal::ZERO)
        .await
        .unwrap();
    let f1 = fixtures::insert_user(
        &env.pool,
        UserRole::Follower,
        &fixtures::unique_code("s23-f1"),
        Decimal::new(1_000_000_00, 2),
    )
    .await
    .unwrap();
    fixtures::insert_relationship(
        &env.pool,
        master_id,
        f1,
        CopyStrategy::FixedRatio,
        NewRelationshipFixture {
            auto_follow: true,
            ratio: Some(Decimal::ONE),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let master_order = replicon_db::orders::upsert_master(
        &env.pool,
        "O2",
        &NewMasterOrder {
            owner_user_id: master_id,
            symbol: "RELIANCE".into(),
            scrip_code: Some("2885".into()),
            side: OrderSide::Buy,
            order_type: OrderType::Limit,
            requested_qty: 10,
            price: Some(Decimal::new(250000, 2)),
            broker_order_id: "O2".into(),
            exchange_order_id: None,
            status: OrderStatus::Pending,
        },
        &Default::default(),
    )
    .await
    .unwrap();

    let ctx = build_worker_context(&env, Arc::new(PaperBroker::new()));

    let new_ev = new_event(master_order.id, master_id, EventKind::New, Decimal::new(250000, 2), 10);
    handle_new(&ctx, &new_ev).await.unwrap();

    let before = replicon_db::order_maps::for_master(&env.pool, master_order.id).await.unwrap();
    assert_eq!(before.len(), 1);
    let follower_order_id = before[0].follower_order_id.unwrap();

    let modify_ev = new_event(master_order.id, master_id, EventKind::Modify, Decimal::new(251000, 2), 10);
    handle_modify(&ctx, &modify_ev).await.unwrap();

    let after_modify = replicon_db::order_maps::for_master(&env.pool, master_order.id).await.unwrap();
    assert_eq!(after_modify.len(), 1, "MODIFY must not create new OrderMap rows");

    let follower_order = replicon_db::orders::get(&env.pool, follower_order_id).await.unwrap().unwrap();
    assert_eq!(follower_order.price, Some(Decimal::new(251000, 2)));
    assert_eq!(follower_order.status, OrderStatus::Submitted);

    let cancel_ev = new_event(master_order.id, master_id, EventKind::Cancel, Decimal::new(251000, 2), 10);
    handle_cancel(&ctx, &cancel_ev).await.unwrap();

    let after_cancel = replicon_db::order_maps::for_master(&env.pool, master_order.id).await.unwrap();
    assert_eq!(after_cancel.len(), 1, "CANCEL must not create new OrderMap rows");

    let follower_order = replicon_db::orders::get(&env.pool, follower_order_id).await.unwrap().unwrap();
    assert_eq!(follower_order.status, OrderStatus::Cancelled);

    replicon_testkit::purge_fixtures_with_prefix(&env.pool, prefix).await.unwrap();
}

#[tokio::test]
async fn scenario_4_duplicate_ingress_publishes_once_and_fans_out_once() {
    let Some(env) = test_env_from_env().await else {
        eprintln!("SKIP: DATABASE_URL/REDIS_URL not set");
        return;
    };

    let master_id = fixtures::insert_user(&env.pool, UserRole::Master, &fixtures::unique_code("s4-master"), Decimal::ZERO)
        .await
        .unwrap();
    let f1_code = fixtures::unique_code("s4-f1");
    let f1 = fixtures::insert_user(&env.pool, UserRole::Follower, &f1_code, Decimal::new(1_000_000_00, 2))
        .await
        .unwrap();
    fixtures::insert_relationship(
        &env.pool,
        master_id,
        f1,
        CopyStrategy::FixedRatio,
        NewRelationshipFixture {
            auto_follow: true,
            ratio: Some(Decimal::ONE),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let master_order = replicon_db::orders::upsert_master(
        &env.pool,
        "O4",
        &NewMasterOrder {
            owner_user_id: master_id,
            symbol: "RELIANCE".into(),
            scrip_code: Some("2885".into()),
            side: OrderSide::Buy,
            order_type: OrderType::Limit,
            requested_qty: 10,
            price: Some(Decimal::new(250050, 2)),
            broker_order_id: "O4".into(),
            exchange_order_id: None,
            status: OrderStatus::Pending,
        },
        &Default::default(),
    )
    .await
    .unwrap();

    // Same webhook delivered twice produces the same idempotency key, so the
    // bus's `publish` is an ON CONFLICT DO NOTHING no-op on the second call.
    let event = new_event(master_order.id, master_id, EventKind::New, Decimal::new(250050, 2), 10);
    let payload = serde_json::to_value(&event).unwrap();

    let first = replicon_db::bus::publish(
        &env.pool,
        event.event_kind.subject(),
        event.master_order_id,
        &event.idempotency_key,
        payload.clone(),
    )
    .await
    .unwrap();
    let second = replicon_db::bus::publish(
        &env.pool,
        event.event_kind.subject(),
        event.master_order_id,
        &event.idempotency_key,
        payload,
    )
    .await
    .unwrap();

    assert!(first, "first publish creates a new bus row");
    assert!(!second, "duplicate publish within the idempotency window is a no-op");

    let claimed = replicon_db::bus::claim_batch(&env.pool, 10, "test-consumer").await.unwrap();
    assert_eq!(claimed.len(), 1, "exactly one bus row regardless of duplicate publishes");

    // Driving the fan-out itself is still idempotent even if a worker
    // somehow handled the event twice (e.g. after a nack/redelivery race).
    let ctx = build_worker_context(&env, Arc::new(PaperBroker::new()));
    handle_new(&ctx, &event).await.unwrap();
    handle_new(&ctx, &event).await.unwrap();

    let maps = replicon_db::order_maps::for_master(&env.pool, master_order.id).await.unwrap();
    assert_eq!(maps.len(), 1, "duplicate fan-out must not create a second OrderMap row");
    assert_eq!(maps[0].replication_status, ReplicationStatus::Success);

    let follower_orders = sqlx::query_scalar::<_, i64>(
        "select count(*) from orders where parent_master_order_id = $1",
    )
    .bind(master_order.id)
    .fetch_one(&env.pool)
    .await
    .unwrap();
    assert_eq!(follower_orders, 1, "duplicate fan-out must not create a second follower Order");

    replicon_testkit::purge_fixtures_with_prefix(&env.pool, "s4-").await.unwrap();
}

#[tokio::test]
async fn scenario_5_orphan_modify_creates_no_orders_and_acks() {
    let Some(env) = test_env_from_env().await else {
        eprintln!("SKIP: DATABASE_URL/REDIS_URL not set");
        return;
    };

    let master_id = fixtures::insert_user(&env.pool, UserRole::Master, &fixtures::unique_code("s5-master"), Decimal::ZERO)
        .await
        .unwrap();
    let master_order = replicon_db::orders::upsert_master(
        &env.pool,
        "O5",
        &NewMasterOrder {
            owner_user_id: master_id,
            symbol: "RELIANCE".into(),
            scrip_code: None,
            side: OrderSide::Buy,
            order_type: OrderType::Limit,
            requested_qty: 5,
            price: Some(Decimal::new(100000, 2)),
            broker_order_id: "O5".into(),
            exchange_order_id: None,
            status: OrderStatus::Pending,
        },
        &Default::default(),
    )
    .await
    .unwrap();

    let ctx = build_worker_context(&env, Arc::new(PaperBroker::new()));

    let modify_ev = new_event(master_order.id, master_id, EventKind::Modify, Decimal::new(101000, 2), 5);
    let result = handle_modify(&ctx, &modify_ev).await;

    assert!(result.is_err());
    assert!(result.unwrap_err().should_ack(), "orphan MODIFY must be a deliberate ack, not a redelivery-causing error");

    let orders = sqlx::query_scalar::<_, i64>("select count(*) from orders where parent_master_order_id = $1")
        .bind(master_order.id)
        .fetch_one(&env.pool)
        .await
        .unwrap();
    assert_eq!(orders, 0);

    replicon_testkit::purge_fixtures_with_prefix(&env.pool, "s5-").await.unwrap();
}

#[tokio::test]
async fn scenario_6_partial_failure_isolates_rejected_follower() {
    let Some(env) = test_env_from_env().await else {
        eprintln!("SKIP: DATABASE_URL/REDIS_URL not set");
        return;
    };

    let master_id = fixtures::insert_user(&env.pool, UserRole::Master, &fixtures::unique_code("s6-master"), Decimal::ZERO)
        .await
        .unwrap();
    let f1_code = fixtures::unique_code("s6-f1");
    let f1 = fixtures::insert_user(&env.pool, UserRole::Follower, &f1_code, Decimal::new(1_000_000_00, 2))
        .await
        .unwrap();
    let f2_code = fixtures::unique_code("s6-f2");
    let f2 = fixtures::insert_user(&env.pool, UserRole::Follower, &f2_code, Decimal::new(1_000_000_00, 2))
        .await
        .unwrap();

    for follower in [f1, f2] {
        fixtures::insert_relationship(
            &env.pool,
            master_id,
            follower,
            CopyStrategy::FixedRatio,
            NewRelationshipFixture {
                auto_follow: true,
                ratio: Some(Decimal::ONE),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    }

    let master_order = replicon_db::orders::upsert_master(
        &env.pool,
        "O6",
        &NewMasterOrder {
            owner_user_id: master_id,
            symbol: "RELIANCE".into(),
            scrip_code: None,
            side: OrderSide::Buy,
            order_type: OrderType::Limit,
            requested_qty: 10,
            price: Some(Decimal::new(250000, 2)),
            broker_order_id: "O6".into(),
            exchange_order_id: None,
            status: OrderStatus::Pending,
        },
        &Default::default(),
    )
    .await
    .unwrap();

    let broker = RejectingBroker::new(PaperBroker::new(), vec![f2_code.clone()]);
    let ctx = build_worker_context(&env, Arc::new(broker));

    let event = new_event(master_order.id, master_id, EventKind::New, Decimal::new(250000, 2), 10);
    handle_new(&ctx, &event).await.unwrap();

    let maps = replicon_db::order_maps::for_master(&env.pool, master_order.id).await.unwrap();
    assert_eq!(maps.len(), 2);

    let f1_map = maps.iter().find(|m| m.follower_user_id == f1).unwrap();
    let f2_map = maps.iter().find(|m| m.follower_user_id == f2).unwrap();
    assert_eq!(f1_map.replication_status, ReplicationStatus::Success);
    assert_eq!(f2_map.replication_status, ReplicationStatus::Failed);
    assert!(f2_map.error.is_some());
    assert!(f2_map.follower_order_id.is_none());

    let cached = ctx.order_map_cache.get(master_order.id).await.unwrap();
    assert_eq!(cached.len(), 1, "only the successful follower is cached");
    assert!(cached.contains_key(&f1));

    replicon_testkit::purge_fixtures_with_prefix(&env.pool, "s6-").await.unwrap();
}
