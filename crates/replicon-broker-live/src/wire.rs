//! IIFL Normal REST API wire shapes. Every request is `{head:{key}, body:{...}}`;
//! every response is `{body:{Success|LoginSuccessful, Message, ...}}`. Field
//! names are PascalCase exactly as the vendor API expects them.

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct Head<'a> {
    pub key: &'a str,
}

#[derive(Debug, Serialize)]
pub struct Envelope<'a, B> {
    pub head: Head<'a>,
    pub body: B,
}

// ---------------------------------------------------------------------------
// Vendor login
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct VendorLoginBody<'a> {
    #[serde(rename = "VendorCode")]
    pub vendor_code: &'a str,
    #[serde(rename = "VendorKey")]
    pub vendor_key: &'a str,
    #[serde(rename = "LocalIP")]
    pub local_ip: &'a str,
    #[serde(rename = "PublicIP")]
    pub public_ip: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct VendorLoginResponseBody {
    #[serde(rename = "Success")]
    pub success: bool,
    #[serde(rename = "Message")]
    pub message: Option<String>,
    #[serde(rename = "EncryptionKey")]
    pub encryption_key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VendorLoginEnvelope {
    pub body: VendorLoginResponseBody,
}

// ---------------------------------------------------------------------------
// Client login
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct ClientLoginBody<'a> {
    #[serde(rename = "ClientCode")]
    pub client_code: &'a str,
    #[serde(rename = "Password")]
    pub password: &'a str,
    #[serde(rename = "HDSerialNumber")]
    pub hd_serial_number: &'a str,
    #[serde(rename = "MACAddress")]
    pub mac_address: &'a str,
    #[serde(rename = "MachineID")]
    pub machine_id: &'a str,
    #[serde(rename = "VersionNo")]
    pub version_no: &'a str,
    #[serde(rename = "RequestNo")]
    pub request_no: &'a str,
    #[serde(rename = "My2PIN")]
    pub my2pin: &'a str,
    #[serde(rename = "ConnectionType")]
    pub connection_type: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct ClientLoginResponseBody {
    #[serde(rename = "LoginSuccessful")]
    pub login_successful: bool,
    #[serde(rename = "Message")]
    pub message: Option<String>,
    #[serde(rename = "ClientToken")]
    pub client_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ClientLoginEnvelope {
    pub body: ClientLoginResponseBody,
}

// ---------------------------------------------------------------------------
// Order request (place / modify / cancel share one endpoint, `OrderFor`
// selects the operation)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Default)]
pub struct OrderRequestBody<'a> {
    #[serde(rename = "ClientCode")]
    pub client_code: &'a str,
    #[serde(rename = "OrderFor")]
    pub order_for: &'a str,
    #[serde(rename = "Exchange", skip_serializing_if = "Option::is_none")]
    pub exchange: Option<&'a str>,
    #[serde(rename = "ExchangeType", skip_serializing_if = "Option::is_none")]
    pub exchange_type: Option<&'a str>,
    #[serde(rename = "ScripCode", skip_serializing_if = "Option::is_none")]
    pub scrip_code: Option<&'a str>,
    #[serde(rename = "Qty", skip_serializing_if = "Option::is_none")]
    pub qty: Option<i64>,
    #[serde(rename = "Price", skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(rename = "OrderType", skip_serializing_if = "Option::is_none")]
    pub order_type: Option<&'a str>,
    #[serde(rename = "IsIntraday", skip_serializing_if = "Option::is_none")]
    pub is_intraday: Option<bool>,
    #[serde(rename = "ahploss", skip_serializing_if = "Option::is_none")]
    pub ahploss: Option<f64>,
    #[serde(rename = "ahptarget", skip_serializing_if = "Option::is_none")]
    pub ahptarget: Option<f64>,
    #[serde(rename = "iOrderValidity", skip_serializing_if = "Option::is_none")]
    pub order_validity: Option<i32>,
    #[serde(rename = "AppSource", skip_serializing_if = "Option::is_none")]
    pub app_source: Option<&'a str>,
    #[serde(rename = "DisQty", skip_serializing_if = "Option::is_none")]
    pub dis_qty: Option<i64>,
    #[serde(rename = "BrokerOrderID", skip_serializing_if = "Option::is_none")]
    pub broker_order_id: Option<&'a str>,
    #[serde(rename = "ExchOrderID", skip_serializing_if = "Option::is_none")]
    pub exch_order_id: Option<&'a str>,
    #[serde(rename = "TradedQty", skip_serializing_if = "Option::is_none")]
    pub traded_qty: Option<i64>,
    #[serde(rename = "PublicIP")]
    pub public_ip: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct OrderResponseBody {
    #[serde(rename = "Success")]
    pub success: bool,
    #[serde(rename = "Message")]
    pub message: Option<String>,
    #[serde(rename = "BrokerOrderID")]
    pub broker_order_id: Option<String>,
    #[serde(rename = "ExchOrderID")]
    pub exch_order_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OrderResponseEnvelope {
    pub body: OrderResponseBody,
}

// ---------------------------------------------------------------------------
// Order status
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct OrderStatusBody<'a> {
    #[serde(rename = "ClientCode")]
    pub client_code: &'a str,
    #[serde(rename = "BrokerOrderID")]
    pub broker_order_id: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct OrderStatusResponseBody {
    #[serde(rename = "BrokerOrderID")]
    pub broker_order_id: Option<String>,
    #[serde(rename = "ExchOrderID")]
    pub exch_order_id: Option<String>,
    #[serde(rename = "Status")]
    pub status: Option<String>,
    #[serde(rename = "FilledQty")]
    pub filled_qty: Option<i64>,
    #[serde(rename = "AveragePrice")]
    pub average_price: Option<rust_decimal::Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct OrderStatusEnvelope {
    pub body: OrderStatusResponseBody,
}
