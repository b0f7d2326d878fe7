use rust_decimal::Decimal;

use replicon_schemas::{Exchange, ExchangeType, OrderSide, OrderType};

/// Session credentials a `BrokerAdapter` needs to act on behalf of one
/// follower. Opaque to everything above the adapter: the worker never
/// inspects these fields, only forwards them.
#[derive(Debug, Clone)]
pub struct BrokerCredentials {
    pub client_code: String,
    pub broker_user_id: String,
    pub encrypted_secret: String,
    pub public_ip: String,
}

/// Two-stage authentication. `encryption_key` is the vendor-login
/// artifact the client-login step consumes; it is held only for the
/// duration of one authentication flow, never cached or logged.
#[derive(Debug, Clone)]
pub struct VendorLoginResponse {
    pub encryption_key: String,
}

#[derive(Debug, Clone)]
pub struct ClientLoginResponse {
    pub session_token: String,
}

/// Broker-agnostic place-order request. `idempotency_key` is derived from
/// `(master_order_id, follower_user_id)` — the caller derives it,
/// the adapter is responsible for echoing it into whatever client-order-id
/// field the concrete broker API exposes.
#[derive(Debug, Clone)]
pub struct PlaceOrderRequest {
    pub session_token: String,
    pub credentials: BrokerCredentials,
    pub idempotency_key: String,
    pub exchange: Exchange,
    pub exchange_type: ExchangeType,
    pub scrip_code: Option<String>,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub quantity: i64,
    pub price: Option<Decimal>,
    pub is_intraday: bool,
}

#[derive(Debug, Clone)]
pub struct PlaceOrderResponse {
    pub broker_order_id: String,
    pub exchange_order_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ModifyOrderRequest {
    pub session_token: String,
    pub credentials: BrokerCredentials,
    pub broker_order_id: String,
    pub exchange_order_id: Option<String>,
    pub exchange: Exchange,
    pub exchange_type: ExchangeType,
    pub scrip_code: Option<String>,
    pub quantity: i64,
    pub traded_qty: i64,
    pub price: Option<Decimal>,
}

#[derive(Debug, Clone)]
pub struct ModifyOrderResponse {
    pub broker_order_id: String,
}

#[derive(Debug, Clone)]
pub struct CancelOrderRequest {
    pub session_token: String,
    pub credentials: BrokerCredentials,
    pub broker_order_id: String,
    pub exchange: Exchange,
    pub exchange_type: ExchangeType,
}

#[derive(Debug, Clone)]
pub struct CancelOrderResponse {
    pub broker_order_id: String,
}

#[derive(Debug, Clone)]
pub struct OrderStatusRequest {
    pub session_token: String,
    pub credentials: BrokerCredentials,
    pub broker_order_id: String,
    pub exchange: Exchange,
}

#[derive(Debug, Clone)]
pub struct OrderStatusResponse {
    pub broker_order_id: String,
    pub exchange_order_id: Option<String>,
    pub status: String,
    pub filled_qty: i64,
    pub average_price: Option<Decimal>,
}
