mod adapter;
mod circuit_breaker;
mod error;
mod rate_limit;
mod retry;
mod types;

pub use adapter::BrokerAdapter;
pub use circuit_breaker::CircuitBreakingBroker;
pub use error::BrokerError;
pub use rate_limit::TokenBucket;
pub use retry::{retry_with_backoff, RetryPolicy};
pub use types::{
    BrokerCredentials, CancelOrderRequest, CancelOrderResponse, ClientLoginResponse,
    ModifyOrderRequest, ModifyOrderResponse, OrderStatusRequest, OrderStatusResponse,
    PlaceOrderRequest, PlaceOrderResponse, VendorLoginResponse,
};

use async_trait::async_trait;

/// The Broker Client: rate limiting plus retry-with-backoff wrapped
/// around a concrete adapter. This is what the worker holds and calls — it
/// never talks to a bare `BrokerAdapter` directly, so every call to the
/// broker goes through one shared rate limit and the same retry policy
/// regardless of which concrete adapter is plugged in underneath.
pub struct RetryingBroker<B> {
    inner_broker: B,
    bucket: TokenBucket,
    policy: RetryPolicy,
}

impl<B: BrokerAdapter> RetryingBroker<B> {
    pub fn new(inner_broker: B, rate_per_sec: u32, policy: RetryPolicy) -> Self {
        Self {
            inner_broker,
            bucket: TokenBucket::new(rate_per_sec),
            policy,
        }
    }

    pub fn with_default_policy(inner_broker: B, rate_per_sec: u32) -> Self {
        Self::new(inner_broker, rate_per_sec, RetryPolicy::default())
    }
}

#[async_trait]
impl<B: BrokerAdapter> BrokerAdapter for RetryingBroker<B> {
    async fn vendor_login(&self) -> Result<VendorLoginResponse, BrokerError> {
        retry_with_backoff(&self.policy, || async {
            self.bucket.acquire().await;
            self.inner_broker.vendor_login().await
        })
        .await
    }

    async fn client_login(
        &self,
        vendor: &VendorLoginResponse,
        credentials: &BrokerCredentials,
    ) -> Result<ClientLoginResponse, BrokerError> {
        retry_with_backoff(&self.policy, || async {
            self.bucket.acquire().await;
            self.inner_broker.client_login(vendor, credentials).await
        })
        .await
    }

    async fn place_order(
        &self,
        req: PlaceOrderRequest,
    ) -> Result<PlaceOrderResponse, BrokerError> {
        retry_with_backoff(&self.policy, || async {
            self.bucket.acquire().await;
            self.inner_broker.place_order(req.clone()).await
        })
        .await
    }

    async fn modify_order(
        &self,
        req: ModifyOrderRequest,
    ) -> Result<ModifyOrderResponse, BrokerError> {
        retry_with_backoff(&self.policy, || async {
            self.bucket.acquire().await;
            self.inner_broker.modify_order(req.clone()).await
        })
        .await
    }

    async fn cancel_order(
        &self,
        req: CancelOrderRequest,
    ) -> Result<CancelOrderResponse, BrokerError> {
        retry_with_backoff(&self.policy, || async {
            self.bucket.acquire().await;
            self.inner_broker.cancel_order(req.clone()).await
        })
        .await
    }

    async fn order_status(
        &self,
        req: OrderStatusRequest,
    ) -> Result<OrderStatusResponse, BrokerError> {
        retry_with_backoff(&self.policy, || async {
            self.bucket.acquire().await;
            self.inner_broker.order_status(req.clone()).await
        })
        .await
    }
}
