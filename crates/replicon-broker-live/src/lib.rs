//! Live `BrokerAdapter` for the IIFL Normal REST API (Breeze/5Paisa-style
//! vendor+client two-stage auth, single `/OrderRequest` endpoint shared by
//! place/modify/cancel via `OrderFor`).

mod wire;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use rust_decimal::prelude::ToPrimitive;

use replicon_broker::{
    BrokerAdapter, BrokerCredentials, BrokerError, CancelOrderRequest, CancelOrderResponse,
    ClientLoginResponse, ModifyOrderRequest, ModifyOrderResponse, OrderStatusRequest,
    OrderStatusResponse, PlaceOrderRequest, PlaceOrderResponse, VendorLoginResponse,
};
use replicon_schemas::OrderType;

use wire::{
    ClientLoginBody, ClientLoginEnvelope, Envelope, Head, OrderRequestBody, OrderResponseEnvelope,
    OrderStatusBody, OrderStatusEnvelope, VendorLoginBody, VendorLoginEnvelope,
};

const APP_SOURCE: &str = "55026";

fn order_type_code(order_type: OrderType) -> &'static str {
    match order_type {
        OrderType::Market => "MARKET",
        OrderType::Limit => "LIMIT",
        OrderType::StopLoss => "SL",
        OrderType::StopLossMarket => "SLM",
    }
}

fn decimal_to_f64(value: Option<rust_decimal::Decimal>) -> f64 {
    value.and_then(|d| d.to_f64()).unwrap_or(0.0)
}

pub struct IiflLiveBroker {
    http: Client,
    base_url: String,
    vendor_key: String,
    vendor_code: String,
}

impl IiflLiveBroker {
    pub fn new(http: Client, base_url: String, vendor_key: String, vendor_code: String) -> Self {
        Self {
            http,
            base_url,
            vendor_key,
            vendor_code,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn post_json<B: serde::Serialize, R: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: B,
        bearer: Option<&str>,
    ) -> Result<R, BrokerError> {
        let envelope = Envelope {
            head: Head {
                key: &self.vendor_key,
            },
            body,
        };

        let mut req = self.http.post(self.endpoint(path)).json(&envelope);
        if let Some(token) = bearer {
            req = req.bearer_auth(token);
        }

        let response = req.send().await.map_err(|e| {
            BrokerError::Transient(format!("request to {path} failed: {e}"))
        })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(BrokerError::RateLimited(format!("{path} rate limited")));
        }
        if status.is_server_error() {
            return Err(BrokerError::Transient(format!(
                "{path} returned server error {status}"
            )));
        }
        if !status.is_success() {
            return Err(BrokerError::Rejected(format!(
                "{path} returned status {status}"
            )));
        }

        response
            .json::<R>()
            .await
            .map_err(|e| BrokerError::InvalidResponse(format!("{path} decode failed: {e}")))
    }
}

#[async_trait]
impl BrokerAdapter for IiflLiveBroker {
    async fn vendor_login(&self) -> Result<VendorLoginResponse, BrokerError> {
        let envelope: VendorLoginEnvelope = self
            .post_json(
                "/LoginRequestMobileNewbyVendor",
                VendorLoginBody {
                    vendor_code: &self.vendor_code,
                    vendor_key: &self.vendor_key,
                    local_ip: "127.0.0.1",
                    public_ip: "127.0.0.1",
                },
                None,
            )
            .await?;

        if !envelope.body.success {
            return Err(BrokerError::Auth(
                envelope
                    .body
                    .message
                    .unwrap_or_else(|| "vendor login failed".into()),
            ));
        }

        let encryption_key = envelope.body.encryption_key.ok_or_else(|| {
            BrokerError::InvalidResponse("vendor login succeeded without EncryptionKey".into())
        })?;

        Ok(VendorLoginResponse { encryption_key })
    }

    async fn client_login(
        &self,
        _vendor: &VendorLoginResponse,
        credentials: &BrokerCredentials,
    ) -> Result<ClientLoginResponse, BrokerError> {
        let envelope: ClientLoginEnvelope = self
            .post_json(
                "/LoginRequestMobileNew",
                ClientLoginBody {
                    client_code: &credentials.client_code,
                    password: &credentials.encrypted_secret,
                    hd_serial_number: "12345",
                    mac_address: "00:00:00:00:00:00",
                    machine_id: "1234",
                    version_no: "1.0",
                    request_no: "1",
                    my2pin: &credentials.encrypted_secret,
                    connection_type: "1",
                },
                None,
            )
            .await?;

        if !envelope.body.login_successful {
            return Err(BrokerError::Auth(
                envelope
                    .body
                    .message
                    .unwrap_or_else(|| "client login failed".into()),
            ));
        }

        let session_token = envelope.body.client_token.ok_or_else(|| {
            BrokerError::InvalidResponse("client login succeeded without ClientToken".into())
        })?;

        Ok(ClientLoginResponse { session_token })
    }

    async fn place_order(
        &self,
        req: PlaceOrderRequest,
    ) -> Result<PlaceOrderResponse, BrokerError> {
        let envelope: OrderResponseEnvelope = self
            .post_json(
                "/OrderRequest",
                OrderRequestBody {
                    client_code: &req.credentials.client_code,
                    order_for: "P",
                    exchange: Some(req.exchange.code()),
                    exchange_type: Some(req.exchange_type.code()),
                    scrip_code: req.scrip_code.as_deref(),
                    qty: Some(req.quantity),
                    price: Some(decimal_to_f64(req.price)),
                    order_type: Some(order_type_code(req.order_type)),
                    is_intraday: Some(req.is_intraday),
                    ahploss: Some(0.0),
                    ahptarget: Some(0.0),
                    order_validity: Some(0),
                    app_source: Some(APP_SOURCE),
                    dis_qty: Some(0),
                    public_ip: "127.0.0.1",
                    ..Default::default()
                },
                Some(&req.session_token),
            )
            .await?;

        if !envelope.body.success {
            return Err(BrokerError::Rejected(
                envelope
                    .body
                    .message
                    .unwrap_or_else(|| "order placement failed".into()),
            ));
        }

        let broker_order_id = envelope.body.broker_order_id.ok_or_else(|| {
            BrokerError::InvalidResponse("order accepted without BrokerOrderID".into())
        })?;

        Ok(PlaceOrderResponse {
            broker_order_id,
            exchange_order_id: envelope.body.exch_order_id,
        })
    }

    async fn modify_order(
        &self,
        req: ModifyOrderRequest,
    ) -> Result<ModifyOrderResponse, BrokerError> {
        let envelope: OrderResponseEnvelope = self
            .post_json(
                "/OrderRequest",
                OrderRequestBody {
                    client_code: &req.credentials.client_code,
                    order_for: "M",
                    broker_order_id: Some(&req.broker_order_id),
                    exch_order_id: req.exchange_order_id.as_deref(),
                    traded_qty: Some(req.traded_qty),
                    qty: Some(req.quantity),
                    price: Some(decimal_to_f64(req.price)),
                    exchange: Some(req.exchange.code()),
                    exchange_type: Some(req.exchange_type.code()),
                    scrip_code: req.scrip_code.as_deref(),
                    public_ip: "127.0.0.1",
                    ..Default::default()
                },
                Some(&req.session_token),
            )
            .await?;

        if !envelope.body.success {
            return Err(BrokerError::Rejected(
                envelope
                    .body
                    .message
                    .unwrap_or_else(|| "order modification failed".into()),
            ));
        }

        Ok(ModifyOrderResponse {
            broker_order_id: envelope
                .body
                .broker_order_id
                .unwrap_or(req.broker_order_id),
        })
    }

    async fn cancel_order(
        &self,
        req: CancelOrderRequest,
    ) -> Result<CancelOrderResponse, BrokerError> {
        let envelope: OrderResponseEnvelope = self
            .post_json(
                "/OrderRequest",
                OrderRequestBody {
                    client_code: &req.credentials.client_code,
                    order_for: "C",
                    broker_order_id: Some(&req.broker_order_id),
                    exchange: Some(req.exchange.code()),
                    exchange_type: Some(req.exchange_type.code()),
                    traded_qty: Some(0),
                    public_ip: "127.0.0.1",
                    ..Default::default()
                },
                Some(&req.session_token),
            )
            .await?;

        if !envelope.body.success {
            return Err(BrokerError::Rejected(
                envelope
                    .body
                    .message
                    .unwrap_or_else(|| "order cancellation failed".into()),
            ));
        }

        Ok(CancelOrderResponse {
            broker_order_id: envelope
                .body
                .broker_order_id
                .unwrap_or(req.broker_order_id),
        })
    }

    async fn order_status(
        &self,
        req: OrderStatusRequest,
    ) -> Result<OrderStatusResponse, BrokerError> {
        let envelope: OrderStatusEnvelope = self
            .post_json(
                "/OrderStatus",
                OrderStatusBody {
                    client_code: &req.credentials.client_code,
                    broker_order_id: &req.broker_order_id,
                },
                Some(&req.session_token),
            )
            .await?;

        let broker_order_id = envelope
            .body
            .broker_order_id
            .unwrap_or(req.broker_order_id);

        Ok(OrderStatusResponse {
            broker_order_id,
            exchange_order_id: envelope.body.exch_order_id,
            status: envelope.body.status.unwrap_or_else(|| "UNKNOWN".into()),
            filled_qty: envelope.body.filled_qty.unwrap_or(0),
            average_price: envelope.body.average_price,
        })
    }
}
