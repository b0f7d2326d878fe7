use serde::{Deserialize, Serialize};

/// A user's relationship to the replication pipeline. `Both` accounts are
/// followers of some masters and masters of others; the distinction is
/// carried at the `FollowerRelationship` level, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UserRole {
    Master,
    Follower,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    Market,
    Limit,
    StopLoss,
    StopLossMarket,
}

impl OrderType {
    /// Vendor webhook -> normalized order type.
    /// Unrecognized values fall back to `Limit` (the safest default: a
    /// limit order never fires at an unbounded price).
    pub fn from_vendor(raw: &str) -> Self {
        match raw.trim().to_uppercase().as_str() {
            "MARKET" | "MKT" => OrderType::Market,
            "LIMIT" | "LMT" => OrderType::Limit,
            "SL" | "STOPLOSS" => OrderType::StopLoss,
            "SLM" | "SL-M" => OrderType::StopLossMarket,
            _ => OrderType::Limit,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    Pending,
    Submitted,
    PartiallyFilled,
    Filled,
    Cancelled,
    Rejected,
    Failed,
}

impl OrderStatus {
    /// Vendor status string -> normalized status, used by the master-order
    /// upsert. Anything not recognized leaves the existing
    /// status unchanged (the caller must treat `None` as "no change").
    pub fn from_vendor(raw: &str) -> Option<Self> {
        match raw.trim().to_uppercase().as_str() {
            "COMPLETE" | "FILLED" => Some(OrderStatus::Filled),
            "CANCELLED" | "CANCELED" => Some(OrderStatus::Cancelled),
            "REJECTED" => Some(OrderStatus::Rejected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CopyStrategy {
    FixedRatio,
    Percentage,
    FixedQuantity,
}

/// Normalized event kind, see `NormalizedOrderEvent::event_kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventKind {
    New,
    Modify,
    Cancel,
    Fill,
}

impl EventKind {
    /// Unknown event_type defaults to NEW.
    pub fn from_vendor(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "order_placed" => EventKind::New,
            "order_modified" => EventKind::Modify,
            "order_cancelled" | "order_canceled" => EventKind::Cancel,
            "order_filled" => EventKind::Fill,
            _ => EventKind::New,
        }
    }

    /// The bus subject this event kind publishes under.
    pub fn subject(&self) -> &'static str {
        match self {
            EventKind::New => "orders.new",
            EventKind::Modify => "orders.modified",
            EventKind::Cancel => "orders.cancelled",
            EventKind::Fill => "orders.filled",
        }
    }
}

/// Single-letter exchange code as sent to the follower broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Exchange {
    #[serde(rename = "N")]
    Nse,
    #[serde(rename = "B")]
    Bse,
    #[serde(rename = "M")]
    Mcx,
}

impl Exchange {
    pub fn from_vendor(raw: &str) -> Self {
        match raw.trim().to_uppercase().as_str() {
            "NSE" | "NFO" => Exchange::Nse,
            "BSE" => Exchange::Bse,
            "MCX" => Exchange::Mcx,
            _ => Exchange::Nse,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Exchange::Nse => "N",
            Exchange::Bse => "B",
            Exchange::Mcx => "M",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExchangeType {
    #[serde(rename = "C")]
    Cash,
    #[serde(rename = "D")]
    Derivative,
}

impl ExchangeType {
    pub fn from_vendor(raw: &str) -> Self {
        match raw.trim().to_uppercase().as_str() {
            "CASH" => ExchangeType::Cash,
            "FO" | "FUTURES" | "OPTIONS" => ExchangeType::Derivative,
            _ => ExchangeType::Cash,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ExchangeType::Cash => "C",
            ExchangeType::Derivative => "D",
        }
    }
}

/// `is_intraday` is derived from the vendor `product` code.
pub fn is_intraday_product(product: &str) -> bool {
    matches!(
        product.trim().to_uppercase().as_str(),
        "INTRADAY" | "MIS" | "BO" | "CO"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_type_mapping_matches_vendor_table() {
        assert_eq!(OrderType::from_vendor("MKT"), OrderType::Market);
        assert_eq!(OrderType::from_vendor("lmt"), OrderType::Limit);
        assert_eq!(OrderType::from_vendor("SL"), OrderType::StopLoss);
        assert_eq!(OrderType::from_vendor("SL-M"), OrderType::StopLossMarket);
        assert_eq!(OrderType::from_vendor("whatever"), OrderType::Limit);
    }

    #[test]
    fn exchange_mapping_defaults_to_nse() {
        assert_eq!(Exchange::from_vendor("NFO"), Exchange::Nse);
        assert_eq!(Exchange::from_vendor("BSE"), Exchange::Bse);
        assert_eq!(Exchange::from_vendor("MCX"), Exchange::Mcx);
        assert_eq!(Exchange::from_vendor("garbage"), Exchange::Nse);
    }

    #[test]
    fn event_kind_unknown_defaults_to_new() {
        assert_eq!(EventKind::from_vendor("order_modified"), EventKind::Modify);
        assert_eq!(EventKind::from_vendor("something_else"), EventKind::New);
    }

    #[test]
    fn intraday_products() {
        assert!(is_intraday_product("MIS"));
        assert!(is_intraday_product("bo"));
        assert!(!is_intraday_product("NRML"));
    }
}
