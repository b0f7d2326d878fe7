//! Deterministic in-memory `BrokerAdapter` for tests and the end-to-end
//! scenario harness.
//!
//! Design decisions (kept intentionally simple/deterministic, mirroring the
//! teacher paper broker):
//! - `broker_order_id` is exactly the caller-supplied `idempotency_key`.
//! - Submitting the same idempotency key twice returns the same order
//!   without mutating state (no duplicate follower orders on webhook retry).
//! - No randomness, no timestamps, no auto-generated fills.

use std::collections::BTreeMap;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use replicon_broker::{
    BrokerAdapter, BrokerCredentials, BrokerError, CancelOrderRequest, CancelOrderResponse,
    ClientLoginResponse, ModifyOrderRequest, ModifyOrderResponse, OrderStatusRequest,
    OrderStatusResponse, PlaceOrderRequest, PlaceOrderResponse, VendorLoginResponse,
};

#[derive(Clone, Debug)]
struct PaperOrder {
    status: String,
    quantity: i64,
    filled_qty: i64,
    price: Option<Decimal>,
}

#[derive(Default)]
pub struct PaperBroker {
    orders: Mutex<BTreeMap<String, PaperOrder>>,
}

impl PaperBroker {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BrokerAdapter for PaperBroker {
    async fn vendor_login(&self) -> Result<VendorLoginResponse, BrokerError> {
        Ok(VendorLoginResponse {
            encryption_key: "paper-encryption-key".into(),
        })
    }

    async fn client_login(
        &self,
        _vendor: &VendorLoginResponse,
        credentials: &BrokerCredentials,
    ) -> Result<ClientLoginResponse, BrokerError> {
        Ok(ClientLoginResponse {
            session_token: format!("paper-session-{}", credentials.client_code),
        })
    }

    async fn place_order(
        &self,
        req: PlaceOrderRequest,
    ) -> Result<PlaceOrderResponse, BrokerError> {
        let broker_order_id = req.idempotency_key.clone();
        let mut orders = self.orders.lock().await;

        if orders.contains_key(&broker_order_id) {
            return Ok(PlaceOrderResponse {
                broker_order_id,
                exchange_order_id: None,
            });
        }

        orders.insert(
            broker_order_id.clone(),
            PaperOrder {
                status: "SUBMITTED".into(),
                quantity: req.quantity,
                filled_qty: 0,
                price: req.price,
            },
        );

        Ok(PlaceOrderResponse {
            broker_order_id,
            exchange_order_id: None,
        })
    }

    async fn modify_order(
        &self,
        req: ModifyOrderRequest,
    ) -> Result<ModifyOrderResponse, BrokerError> {
        let mut orders = self.orders.lock().await;
        if let Some(order) = orders.get_mut(&req.broker_order_id) {
            order.quantity = req.quantity;
            order.price = req.price;
        }

        Ok(ModifyOrderResponse {
            broker_order_id: req.broker_order_id,
        })
    }

    async fn cancel_order(
        &self,
        req: CancelOrderRequest,
    ) -> Result<CancelOrderResponse, BrokerError> {
        let mut orders = self.orders.lock().await;
        if let Some(order) = orders.get_mut(&req.broker_order_id) {
            order.status = "CANCELLED".into();
        }

        Ok(CancelOrderResponse {
            broker_order_id: req.broker_order_id,
        })
    }

    async fn order_status(
        &self,
        req: OrderStatusRequest,
    ) -> Result<OrderStatusResponse, BrokerError> {
        let orders = self.orders.lock().await;
        let order = orders
            .get(&req.broker_order_id)
            .ok_or_else(|| BrokerError::Rejected(format!("unknown order {}", req.broker_order_id)))?;

        Ok(OrderStatusResponse {
            broker_order_id: req.broker_order_id,
            exchange_order_id: None,
            status: order.status.clone(),
            filled_qty: order.filled_qty,
            average_price: order.price,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use replicon_schemas::{Exchange, ExchangeType, OrderSide, OrderType};

    fn credentials() -> BrokerCredentials {
        BrokerCredentials {
            client_code: "C1".into(),
            broker_user_id: "U1".into(),
            encrypted_secret: "secret".into(),
            public_ip: "127.0.0.1".into(),
        }
    }

    fn place_req(idempotency_key: &str) -> PlaceOrderRequest {
        PlaceOrderRequest {
            session_token: "tok".into(),
            credentials: credentials(),
            idempotency_key: idempotency_key.into(),
            exchange: Exchange::Nse,
            exchange_type: ExchangeType::Cash,
            scrip_code: Some("500".into()),
            side: OrderSide::Buy,
            order_type: OrderType::Limit,
            quantity: 10,
            price: Some(Decimal::new(1000, 2)),
            is_intraday: true,
        }
    }

    #[tokio::test]
    async fn place_order_is_idempotent_on_retry() {
        let broker = PaperBroker::new();
        let first = broker.place_order(place_req("key-1")).await.unwrap();
        let second = broker.place_order(place_req("key-1")).await.unwrap();
        assert_eq!(first.broker_order_id, second.broker_order_id);
    }

    #[tokio::test]
    async fn order_status_reflects_modify_and_cancel() {
        let broker = PaperBroker::new();
        broker.place_order(place_req("key-2")).await.unwrap();

        broker
            .modify_order(ModifyOrderRequest {
                session_token: "tok".into(),
                credentials: credentials(),
                broker_order_id: "key-2".into(),
                exchange_order_id: None,
                exchange: Exchange::Nse,
                exchange_type: ExchangeType::Cash,
                scrip_code: Some("500".into()),
                quantity: 20,
                traded_qty: 0,
                price: Some(Decimal::new(1100, 2)),
            })
            .await
            .unwrap();

        let status = broker
            .order_status(OrderStatusRequest {
                session_token: "tok".into(),
                credentials: credentials(),
                broker_order_id: "key-2".into(),
                exchange: Exchange::Nse,
            })
            .await
            .unwrap();
        assert_eq!(status.average_price, Some(Decimal::new(1100, 2)));

        broker
            .cancel_order(CancelOrderRequest {
                session_token: "tok".into(),
                credentials: credentials(),
                broker_order_id: "key-2".into(),
                exchange: Exchange::Nse,
                exchange_type: ExchangeType::Cash,
            })
            .await
            .unwrap();

        let status = broker
            .order_status(OrderStatusRequest {
                session_token: "tok".into(),
                credentials: credentials(),
                broker_order_id: "key-2".into(),
                exchange: Exchange::Nse,
            })
            .await
            .unwrap();
        assert_eq!(status.status, "CANCELLED");
    }

    #[tokio::test]
    async fn order_status_for_unknown_order_is_rejected() {
        let broker = PaperBroker::new();
        let result = broker
            .order_status(OrderStatusRequest {
                session_token: "tok".into(),
                credentials: credentials(),
                broker_order_id: "missing".into(),
                exchange: Exchange::Nse,
            })
            .await;
        assert!(matches!(result, Err(BrokerError::Rejected(_))));
    }
}
