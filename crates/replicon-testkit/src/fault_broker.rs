//! A `BrokerAdapter` wrapper that rejects `place_order` for a configured set
//! of follower client codes, leaving every other call and every other
//! follower untouched. Used to test the scenario where a broker returns
//! Rejected for one follower while siblings are still processed, without
//! teaching the paper broker itself about failure injection.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;

use replicon_broker::{
    BrokerAdapter, BrokerCredentials, BrokerError, CancelOrderRequest, CancelOrderResponse,
    ClientLoginResponse, ModifyOrderRequest, ModifyOrderResponse, OrderStatusRequest,
    OrderStatusResponse, PlaceOrderRequest, PlaceOrderResponse, VendorLoginResponse,
};

pub struct RejectingBroker<B> {
    inner: B,
    reject_client_codes: Mutex<HashSet<String>>,
}

impl<B> RejectingBroker<B> {
    pub fn new(inner: B, reject_client_codes: impl IntoIterator<Item = String>) -> Self {
        Self {
            inner,
            reject_client_codes: Mutex::new(reject_client_codes.into_iter().collect()),
        }
    }

    fn should_reject(&self, credentials: &BrokerCredentials) -> bool {
        self.reject_client_codes
            .lock()
            .expect("reject set poisoned")
            .contains(&credentials.client_code)
    }
}

#[async_trait]
impl<B: BrokerAdapter> BrokerAdapter for RejectingBroker<B> {
    async fn vendor_login(&self) -> Result<VendorLoginResponse, BrokerError> {
        self.inner.vendor_login().await
    }

    async fn client_login(
        &self,
        vendor: &VendorLoginResponse,
        credentials: &BrokerCredentials,
    ) -> Result<ClientLoginResponse, BrokerError> {
        self.inner.client_login(vendor, credentials).await
    }

    async fn place_order(
        &self,
        req: PlaceOrderRequest,
    ) -> Result<PlaceOrderResponse, BrokerError> {
        if self.should_reject(&req.credentials) {
            return Err(BrokerError::Rejected(format!(
                "testkit: rejected for client_code {}",
                req.credentials.client_code
            )));
        }
        self.inner.place_order(req).await
    }

    async fn modify_order(
        &self,
        req: ModifyOrderRequest,
    ) -> Result<ModifyOrderResponse, BrokerError> {
        self.inner.modify_order(req).await
    }

    async fn cancel_order(
        &self,
        req: CancelOrderRequest,
    ) -> Result<CancelOrderResponse, BrokerError> {
        self.inner.cancel_order(req).await
    }

    async fn order_status(
        &self,
        req: OrderStatusRequest,
    ) -> Result<OrderStatusResponse, BrokerError> {
        self.inner.order_status(req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use replicon_broker_paper::PaperBroker;
    use replicon_schemas::{Exchange, ExchangeType, OrderSide, OrderType};
    use rust_decimal::Decimal;

    fn credentials(client_code: &str) -> BrokerCredentials {
        BrokerCredentials {
            client_code: client_code.into(),
            broker_user_id: "u".into(),
            encrypted_secret: "s".into(),
            public_ip: "127.0.0.1".into(),
        }
    }

    fn place_req(client_code: &str) -> PlaceOrderRequest {
        PlaceOrderRequest {
            session_token: "tok".into(),
            credentials: credentials(client_code),
            idempotency_key: format!("key-{client_code}"),
            exchange: Exchange::Nse,
            exchange_type: ExchangeType::Cash,
            scrip_code: None,
            side: OrderSide::Buy,
            order_type: OrderType::Limit,
            quantity: 1,
            price: Some(Decimal::ONE),
            is_intraday: true,
        }
    }

    #[tokio::test]
    async fn rejects_only_the_configured_follower() {
        let broker = RejectingBroker::new(PaperBroker::new(), vec!["F2".to_string()]);

        let ok = broker.place_order(place_req("F1")).await;
        assert!(ok.is_ok());

        let rejected = broker.place_order(place_req("F2")).await;
        assert!(matches!(rejected, Err(BrokerError::Rejected(_))));
    }
}
