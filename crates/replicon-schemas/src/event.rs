use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{EventKind, Exchange, ExchangeType, OrderId, OrderSide, OrderType, UserId};

/// `NormalizedOrderEvent` (transport only — never persisted as-is;
/// the webhook ingress endpoint derives it, the Order Worker consumes it
/// and persists its own domain rows).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedOrderEvent {
    pub event_kind: EventKind,
    pub master_order_id: OrderId,
    pub master_user_id: UserId,
    pub symbol: String,
    pub scrip_code: Option<String>,
    pub exchange: Exchange,
    pub exchange_type: ExchangeType,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub quantity: i64,
    pub price: Option<Decimal>,
    pub trigger_price: Option<Decimal>,
    pub filled_qty: i64,
    pub average_price: Option<Decimal>,
    pub status: String,
    pub product: Option<String>,
    pub validity: Option<String>,
    pub is_intraday: bool,
    pub event_timestamp: DateTime<Utc>,
    pub idempotency_key: String,
    /// Dynamic config dicts from the vendor payload: recognized
    /// fields are typed above; anything else lands here for audit, never
    /// interpreted by the core.
    pub metadata: HashMap<String, Value>,
}

impl NormalizedOrderEvent {
    /// Key shape: `{master_order_id}_{event_kind}_{timestamp}`.
    pub fn derive_idempotency_key(
        master_order_id: OrderId,
        event_kind: EventKind,
        event_timestamp: DateTime<Utc>,
    ) -> String {
        format!(
            "{}_{:?}_{}",
            master_order_id,
            event_kind,
            event_timestamp.timestamp_millis()
        )
    }
}

/// Bus envelope wrapping a `NormalizedOrderEvent` on the wire. Generic
/// over payload so the same envelope shape could carry
/// other event types in the future without the bus layer caring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope<T> {
    pub event_type: EventKind,
    pub master_order_id: OrderId,
    pub order_data: T,
    pub timestamp: DateTime<Utc>,
    pub idempotency_key: String,
}

impl<T> EventEnvelope<T> {
    pub fn new(event_type: EventKind, master_order_id: OrderId, order_data: T) -> Self
    where
        T: Clone,
    {
        let timestamp = Utc::now();
        let idempotency_key =
            NormalizedOrderEvent::derive_idempotency_key(master_order_id, event_type, timestamp);
        Self {
            event_type,
            master_order_id,
            order_data,
            timestamp,
            idempotency_key,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn idempotency_key_is_deterministic_for_same_inputs() {
        let ts = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let a = NormalizedOrderEvent::derive_idempotency_key(42, EventKind::New, ts);
        let b = NormalizedOrderEvent::derive_idempotency_key(42, EventKind::New, ts);
        assert_eq!(a, b);
    }

    #[test]
    fn idempotency_key_differs_by_event_kind() {
        let ts = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let new_key = NormalizedOrderEvent::derive_idempotency_key(42, EventKind::New, ts);
        let modify_key = NormalizedOrderEvent::derive_idempotency_key(42, EventKind::Modify, ts);
        assert_ne!(new_key, modify_key);
    }
}
