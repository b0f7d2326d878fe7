//! `POST /webhooks/blaze/order` — the webhook ingress endpoint.
//!
//! Field list mirrors the vendor's own webhook schema field-for-field so
//! nothing is silently dropped before it reaches `metadata`.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use replicon_schemas::{
    EventKind, Exchange, ExchangeType, MasterOrderPatch, NewMasterOrder, NormalizedOrderEvent,
    OrderSide, OrderStatus, OrderType,
};

use crate::error::IngressError;
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct BlazeOrderWebhook {
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub order_id: String,
    pub broker_order_id: Option<String>,
    pub exchange_order_id: Option<String>,
    pub symbol: String,
    pub scrip_code: Option<String>,
    pub exchange: String,
    pub segment: String,
    pub transaction_type: String,
    pub order_type: String,
    pub quantity: i64,
    pub price: Option<Decimal>,
    pub trigger_price: Option<Decimal>,
    pub disclosed_quantity: Option<i64>,
    pub filled_quantity: Option<i64>,
    pub average_price: Option<Decimal>,
    pub pending_quantity: Option<i64>,
    pub status: String,
    pub status_message: Option<String>,
    pub product: Option<String>,
    pub validity: Option<String>,
    pub account_id: String,
    pub client_code: Option<String>,
    pub user_id: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

#[derive(Debug)]
pub struct ValidationError(pub String);

impl BlazeOrderWebhook {
    /// Minimal structural validation. Semantic normalization
    /// (status/order-type/exchange mapping) never fails — unrecognized
    /// values fall back to a safe default, per the mapping tables.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.order_id.trim().is_empty() {
            return Err(ValidationError("order_id must not be empty".into()));
        }
        if self.symbol.trim().is_empty() {
            return Err(ValidationError("symbol must not be empty".into()));
        }
        if self.account_id.trim().is_empty() {
            return Err(ValidationError("account_id must not be empty".into()));
        }
        if self.quantity < 0 {
            return Err(ValidationError("quantity must not be negative".into()));
        }
        Ok(())
    }

    fn side(&self) -> OrderSide {
        match self.transaction_type.trim().to_uppercase().as_str() {
            "SELL" => OrderSide::Sell,
            _ => OrderSide::Buy,
        }
    }

    fn is_intraday(&self) -> bool {
        self.product
            .as_deref()
            .map(replicon_schemas::is_intraday_product)
            .unwrap_or(false)
    }

    /// The vendor payload -> `NormalizedOrderEvent` mapping.
    pub fn normalize(&self, master_order_id: i64, master_user_id: i64) -> NormalizedOrderEvent {
        let event_kind = EventKind::from_vendor(&self.event_type);
        let idempotency_key =
            NormalizedOrderEvent::derive_idempotency_key(master_order_id, event_kind, self.timestamp);

        NormalizedOrderEvent {
            event_kind,
            master_order_id,
            master_user_id,
            symbol: self.symbol.clone(),
            scrip_code: self.scrip_code.clone(),
            exchange: Exchange::from_vendor(&self.exchange),
            exchange_type: ExchangeType::from_vendor(&self.segment),
            side: self.side(),
            order_type: OrderType::from_vendor(&self.order_type),
            quantity: self.quantity,
            price: self.price,
            trigger_price: self.trigger_price,
            filled_qty: self.filled_quantity.unwrap_or(0),
            average_price: self.average_price,
            status: self.status.clone(),
            product: self.product.clone(),
            validity: self.validity.clone(),
            is_intraday: self.is_intraday(),
            event_timestamp: self.timestamp,
            idempotency_key,
            metadata: self.metadata.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BlazeWebhookResponse {
    pub success: bool,
    pub message: String,
    pub processed_at: DateTime<Utc>,
    pub replication_initiated: bool,
    pub follower_count: i64,
}

/// Full flow: validate, resolve master, upsert master
/// order, normalize, publish, audit.
pub async fn receive_blaze_order_webhook(
    State(state): State<Arc<AppState>>,
    Json(webhook): Json<BlazeOrderWebhook>,
) -> Result<Response, IngressError> {
    webhook
        .validate()
        .map_err(|ValidationError(msg)| IngressError::Validation(msg))?;

    let master = replicon_db::users::find_active_master_by_broker_code(
        &state.pool,
        &webhook.account_id,
    )
    .await
    .map_err(|err| {
        warn!(error = %err, "find_active_master_by_broker_code failed");
        IngressError::Internal("master lookup failed".into())
    })?
    .ok_or_else(|| {
        warn!(account_id = %webhook.account_id, "no active master for webhook account_id");
        IngressError::NotFound(format!("no active master account for {}", webhook.account_id))
    })?;

    let broker_order_id = webhook
        .broker_order_id
        .clone()
        .unwrap_or_else(|| webhook.order_id.clone());

    let new = NewMasterOrder {
        owner_user_id: master.id,
        symbol: webhook.symbol.clone(),
        scrip_code: webhook.scrip_code.clone(),
        side: webhook.side(),
        order_type: OrderType::from_vendor(&webhook.order_type),
        requested_qty: webhook.quantity,
        price: webhook.price,
        broker_order_id: broker_order_id.clone(),
        exchange_order_id: webhook.exchange_order_id.clone(),
        status: OrderStatus::from_vendor(&webhook.status).unwrap_or(OrderStatus::Pending),
    };

    let patch = MasterOrderPatch {
        filled_qty: webhook.filled_quantity,
        average_price: webhook.average_price,
        exchange_order_id: webhook.exchange_order_id.clone(),
        status: OrderStatus::from_vendor(&webhook.status),
    };

    let master_order = replicon_db::orders::upsert_master(&state.pool, &broker_order_id, &new, &patch)
        .await
        .map_err(|err| {
            warn!(error = %err, "upsert_master failed");
            IngressError::Internal("order upsert failed".into())
        })?;

    let event = webhook.normalize(master_order.id, master.id);

    let event_payload = serde_json::to_value(&event).map_err(|err| {
        warn!(error = %err, "failed to serialize normalized event");
        IngressError::Internal("event serialization failed".into())
    })?;

    // The upsert above and this publish are not
    // one atomic transaction; a failure here surfaces as 5xx so the vendor
    // retries, and the idempotency key absorbs the resulting duplicate.
    let replication_initiated = replicon_db::bus::publish(
        &state.pool,
        event.event_kind.subject(),
        event.master_order_id,
        &event.idempotency_key,
        event_payload,
    )
    .await
    .map_err(|err| {
        warn!(error = %err, "bus::publish failed");
        IngressError::Internal("publish failed".into())
    })?;

    if let Err(err) = replicon_db::audit::append(
        &state.pool,
        "webhook.blaze.order",
        "RECEIVED",
        serde_json::json!({
            "master_order_id": master_order.id,
            "broker_order_id": broker_order_id,
            "event_kind": event.event_kind,
            "idempotency_key": event.idempotency_key,
        }),
    )
    .await
    {
        warn!(error = %err, "audit::append failed for webhook receipt");
    }

    let follower_count = match replicon_db::users::active_followers_of(&state.pool, master.id).await {
        Ok(rows) => rows
            .iter()
            .filter(|(_, rel)| rel.is_fan_out_candidate())
            .count() as i64,
        Err(err) => {
            warn!(error = %err, "active_followers_of failed; reporting 0");
            0
        }
    };

    info!(
        master_order_id = master_order.id,
        event_kind = ?event.event_kind,
        replication_initiated,
        follower_count,
        "blaze webhook processed"
    );

    Ok((
        StatusCode::OK,
        Json(BlazeWebhookResponse {
            success: true,
            message: "order event processed".into(),
            processed_at: Utc::now(),
            replication_initiated,
            follower_count,
        }),
    )
        .into_response())
}

pub async fn webhook_health() -> impl IntoResponse {
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample(event_type: &str, status: &str) -> BlazeOrderWebhook {
        BlazeOrderWebhook {
            event_type: event_type.into(),
            timestamp: Utc.with_ymd_and_hms(2026, 1, 1, 9, 30, 0).unwrap(),
            order_id: "ord-1".into(),
            broker_order_id: Some("bo-1".into()),
            exchange_order_id: None,
            symbol: "RELIANCE".into(),
            scrip_code: Some("500325".into()),
            exchange: "NSE".into(),
            segment: "CASH".into(),
            transaction_type: "BUY".into(),
            order_type: "LIMIT".into(),
            quantity: 10,
            price: Some(Decimal::new(250000, 2)),
            trigger_price: None,
            disclosed_quantity: None,
            filled_quantity: Some(0),
            average_price: None,
            pending_quantity: Some(10),
            status: status.into(),
            status_message: None,
            product: Some("MIS".into()),
            validity: Some("DAY".into()),
            account_id: "ACC1".into(),
            client_code: Some("C1".into()),
            user_id: Some("U1".into()),
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn validate_rejects_empty_order_id() {
        let mut webhook = sample("order_placed", "PENDING");
        webhook.order_id = String::new();
        assert!(webhook.validate().is_err());
    }

    #[test]
    fn validate_rejects_negative_quantity() {
        let mut webhook = sample("order_placed", "PENDING");
        webhook.quantity = -1;
        assert!(webhook.validate().is_err());
    }

    #[test]
    fn normalize_maps_event_kind_and_intraday_flag() {
        let webhook = sample("order_placed", "PENDING");
        let event = webhook.normalize(7, 1);
        assert_eq!(event.event_kind, EventKind::New);
        assert_eq!(event.master_order_id, 7);
        assert!(event.is_intraday);
        assert_eq!(event.exchange, Exchange::Nse);
        assert_eq!(event.exchange_type, ExchangeType::Cash);
        assert_eq!(event.side, OrderSide::Buy);
    }

    #[test]
    fn normalize_unknown_event_type_defaults_to_new() {
        let webhook = sample("something_unexpected", "PENDING");
        let event = webhook.normalize(7, 1);
        assert_eq!(event.event_kind, EventKind::New);
    }

    #[test]
    fn normalize_derives_idempotency_key_from_master_order_and_event_kind() {
        let webhook = sample("order_modified", "PENDING");
        let event = webhook.normalize(42, 1);
        assert!(event.idempotency_key.starts_with("42_Modify_"));
    }
}
