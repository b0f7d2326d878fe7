use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::adapter::BrokerAdapter;
use crate::error::BrokerError;
use crate::types::{
    BrokerCredentials, CancelOrderRequest, CancelOrderResponse, ClientLoginResponse,
    ModifyOrderRequest, ModifyOrderResponse, OrderStatusRequest, OrderStatusResponse,
    PlaceOrderRequest, PlaceOrderResponse, VendorLoginResponse,
};

/// A circuit breaker optionally wraps the client. The original IIFL client
/// had a circuit breaker class that was never actually wired up; this stays
/// an opt-in wrapper for the same reason. `replicon-broker-live`'s default
/// constructor does not apply it. Callers who want it wrap their adapter in
/// `CircuitBreakingBroker::new(adapter, threshold, cool_down)` explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Closed,
    Open,
    HalfOpen,
}

struct Inner {
    state: State,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

pub struct CircuitBreakingBroker<B> {
    inner_broker: B,
    failure_threshold: u32,
    cool_down: Duration,
    breaker: Arc<Mutex<Inner>>,
}

impl<B: BrokerAdapter> CircuitBreakingBroker<B> {
    pub fn new(inner_broker: B, failure_threshold: u32, cool_down: Duration) -> Self {
        Self {
            inner_broker,
            failure_threshold,
            cool_down,
            breaker: Arc::new(Mutex::new(Inner {
                state: State::Closed,
                consecutive_failures: 0,
                opened_at: None,
            })),
        }
    }

    /// Evaluate whether a call is currently permitted, transitioning Open ->
    /// HalfOpen once the cool-down has elapsed.
    async fn guard(&self) -> Result<(), BrokerError> {
        let mut st = self.breaker.lock().await;
        match st.state {
            State::Closed | State::HalfOpen => Ok(()),
            State::Open => {
                let elapsed = st.opened_at.map(|t| t.elapsed()).unwrap_or_default();
                if elapsed >= self.cool_down {
                    st.state = State::HalfOpen;
                    Ok(())
                } else {
                    Err(BrokerError::Transient(
                        "circuit breaker open; broker endpoint considered unhealthy".into(),
                    ))
                }
            }
        }
    }

    async fn record<T>(&self, result: Result<T, BrokerError>) -> Result<T, BrokerError> {
        let mut st = self.breaker.lock().await;
        match &result {
            Ok(_) => {
                st.state = State::Closed;
                st.consecutive_failures = 0;
                st.opened_at = None;
            }
            Err(e) if e.is_retryable() => {
                st.consecutive_failures += 1;
                if st.consecutive_failures >= self.failure_threshold {
                    st.state = State::Open;
                    st.opened_at = Some(Instant::now());
                }
            }
            Err(_) => {
                // Auth/Rejected/InvalidResponse do not count toward the
                // breaker — they are broker-business outcomes, not signs of
                // an unhealthy endpoint.
            }
        }
        result
    }
}

#[async_trait]
impl<B: BrokerAdapter + Send + Sync> BrokerAdapter for CircuitBreakingBroker<B> {
    async fn vendor_login(&self) -> Result<VendorLoginResponse, BrokerError> {
        self.guard().await?;
        let result = self.inner_broker.vendor_login().await;
        self.record(result).await
    }

    async fn client_login(
        &self,
        vendor: &VendorLoginResponse,
        credentials: &BrokerCredentials,
    ) -> Result<ClientLoginResponse, BrokerError> {
        self.guard().await?;
        let result = self.inner_broker.client_login(vendor, credentials).await;
        self.record(result).await
    }

    async fn place_order(
        &self,
        req: PlaceOrderRequest,
    ) -> Result<PlaceOrderResponse, BrokerError> {
        self.guard().await?;
        let result = self.inner_broker.place_order(req).await;
        self.record(result).await
    }

    async fn modify_order(
        &self,
        req: ModifyOrderRequest,
    ) -> Result<ModifyOrderResponse, BrokerError> {
        self.guard().await?;
        let result = self.inner_broker.modify_order(req).await;
        self.record(result).await
    }

    async fn cancel_order(
        &self,
        req: CancelOrderRequest,
    ) -> Result<CancelOrderResponse, BrokerError> {
        self.guard().await?;
        let result = self.inner_broker.cancel_order(req).await;
        self.record(result).await
    }

    async fn order_status(
        &self,
        req: OrderStatusRequest,
    ) -> Result<OrderStatusResponse, BrokerError> {
        self.guard().await?;
        let result = self.inner_broker.order_status(req).await;
        self.record(result).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct AlwaysTransient(AtomicU32);

    #[async_trait]
    impl BrokerAdapter for AlwaysTransient {
        async fn vendor_login(&self) -> Result<VendorLoginResponse, BrokerError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(BrokerError::Transient("down".into()))
        }
        async fn client_login(
            &self,
            _vendor: &VendorLoginResponse,
            _credentials: &BrokerCredentials,
        ) -> Result<ClientLoginResponse, BrokerError> {
            unimplemented!()
        }
        async fn place_order(
            &self,
            _req: PlaceOrderRequest,
        ) -> Result<PlaceOrderResponse, BrokerError> {
            unimplemented!()
        }
        async fn modify_order(
            &self,
            _req: ModifyOrderRequest,
        ) -> Result<ModifyOrderResponse, BrokerError> {
            unimplemented!()
        }
        async fn cancel_order(
            &self,
            _req: CancelOrderRequest,
        ) -> Result<CancelOrderResponse, BrokerError> {
            unimplemented!()
        }
        async fn order_status(
            &self,
            _req: OrderStatusRequest,
        ) -> Result<OrderStatusResponse, BrokerError> {
            unimplemented!()
        }
    }

    #[tokio::test]
    async fn opens_after_consecutive_failures_and_short_circuits() {
        let breaker =
            CircuitBreakingBroker::new(AlwaysTransient(AtomicU32::new(0)), 2, Duration::from_secs(60));

        assert!(breaker.vendor_login().await.is_err());
        assert!(breaker.vendor_login().await.is_err());
        // Breaker now open; this third call should short-circuit and never
        // reach the inner adapter.
        let calls_before = breaker.inner_broker.0.load(Ordering::SeqCst);
        assert!(breaker.vendor_login().await.is_err());
        assert_eq!(breaker.inner_broker.0.load(Ordering::SeqCst), calls_before);
    }
}
