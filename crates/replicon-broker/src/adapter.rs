use async_trait::async_trait;

use crate::error::BrokerError;
use crate::types::{
    BrokerCredentials, CancelOrderRequest, CancelOrderResponse, ClientLoginResponse,
    ModifyOrderRequest, ModifyOrderResponse, OrderStatusRequest, OrderStatusResponse,
    PlaceOrderRequest, PlaceOrderResponse, VendorLoginResponse,
};

/// Broker Client contract. One implementation per concrete follower
/// broker API; `replicon-broker-live` is the vendor-shaped HTTP adapter,
/// `replicon-broker-paper` a deterministic in-memory double for tests.
///
/// Every method is a single RPC attempt — retry, rate limiting, and circuit
/// breaking live one layer up in `RetryingBroker` / `CircuitBreakingBroker`,
/// not here, so an adapter implementation stays a thin translation of
/// broker-agnostic requests into the concrete wire format.
#[async_trait]
pub trait BrokerAdapter: Send + Sync {
    /// Two-stage auth, stage 1: vendor login returns an encryption key.
    async fn vendor_login(&self) -> Result<VendorLoginResponse, BrokerError>;

    /// Stage 2: client login (using the vendor's encryption key)
    /// returns the per-user session token the other calls require.
    async fn client_login(
        &self,
        vendor: &VendorLoginResponse,
        credentials: &BrokerCredentials,
    ) -> Result<ClientLoginResponse, BrokerError>;

    async fn place_order(
        &self,
        req: PlaceOrderRequest,
    ) -> Result<PlaceOrderResponse, BrokerError>;

    async fn modify_order(
        &self,
        req: ModifyOrderRequest,
    ) -> Result<ModifyOrderResponse, BrokerError>;

    async fn cancel_order(
        &self,
        req: CancelOrderRequest,
    ) -> Result<CancelOrderResponse, BrokerError>;

    async fn order_status(
        &self,
        req: OrderStatusRequest,
    ) -> Result<OrderStatusResponse, BrokerError>;
}
