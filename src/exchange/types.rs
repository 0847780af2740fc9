//! CLOB exchange types
//!
//! Typed orders, positions, and the raw wire records they are validated from.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::{ExchangeError, ExchangeResult};

// ======================= ENDPOINTS =======================

#[derive(Debug, Clone)]
pub struct ClobEndpoints {
    /// Order book / trading API
    pub clob_url: String,
    /// Account data API (positions)
    pub data_url: String,
}

impl Default for ClobEndpoints {
    fn default() -> Self {
        Self {
            clob_url: "https://clob.polymarket.com".to_string(),
            data_url: "https://data-api.polymarket.com".to_string(),
        }
    }
}

// ======================= ORDER SIDE =======================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }

    fn parse(raw: &str) -> ExchangeResult<Side> {
        match raw.to_ascii_uppercase().as_str() {
            "BUY" => Ok(Side::Buy),
            "SELL" => Ok(Side::Sell),
            other => Err(ExchangeError::Malformed(format!("unknown side '{}'", other))),
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ======================= TIME IN FORCE =======================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TimeInForce {
    #[default]
    GTC, // Good Till Cancelled
}

// ======================= DOMAIN RECORDS =======================

/// Opaque exchange-assigned order identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrderId(pub String);

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A resting order as reported by the exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenOrder {
    pub order_id: OrderId,
    pub side: Side,
    pub price: f64,
    /// Unfilled remainder
    pub size: f64,
}

/// Signed inventory for one token.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub size: f64,
}

/// A single order the maker wants on the book.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quote {
    pub side: Side,
    pub price: f64,
    pub size: f64,
}

// ======================= WIRE: MIDPOINT =======================

#[derive(Debug, Deserialize)]
pub struct MidpointResponse {
    pub mid: Option<Value>,
}

impl MidpointResponse {
    pub fn midpoint(&self) -> ExchangeResult<f64> {
        let mid = number_field("mid", self.mid.as_ref())?;
        if mid <= 0.0 || mid >= 1.0 {
            return Err(ExchangeError::Malformed(format!("midpoint {} outside (0, 1)", mid)));
        }
        Ok(mid)
    }
}

// ======================= WIRE: OPEN ORDERS =======================

#[derive(Debug, Clone, Deserialize)]
pub struct OpenOrderRecord {
    pub id: Option<String>,
    pub side: Option<String>,
    pub price: Option<Value>,
    pub original_size: Option<Value>,
    pub size_matched: Option<Value>,
}

impl OpenOrderRecord {
    /// Validate into a typed order. `size_matched` defaults to zero; every
    /// other field is required.
    pub fn into_order(self) -> ExchangeResult<OpenOrder> {
        let id = self
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ExchangeError::Malformed("order missing 'id'".into()))?;
        let side = Side::parse(
            self.side
                .as_deref()
                .ok_or_else(|| ExchangeError::Malformed(format!("order {} missing 'side'", id)))?,
        )?;
        let price = number_field("price", self.price.as_ref())?;
        let original = number_field("original_size", self.original_size.as_ref())?;
        let matched = match self.size_matched.as_ref() {
            Some(v) => number_field("size_matched", Some(v))?,
            None => 0.0,
        };
        Ok(OpenOrder {
            order_id: OrderId(id),
            side,
            price,
            size: (original - matched).max(0.0),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct OrdersPage {
    #[serde(default)]
    pub data: Vec<OpenOrderRecord>,
    pub next_cursor: Option<String>,
}

/// Cursor value the CLOB returns on the last page.
pub const END_CURSOR: &str = "LTE=";

// ======================= WIRE: POSITION =======================

#[derive(Debug, Deserialize)]
pub struct PositionValueRecord {
    pub value: Option<Value>,
}

impl PositionValueRecord {
    /// An empty list is a flat book, not a failure.
    pub fn position(records: &[PositionValueRecord]) -> ExchangeResult<Position> {
        match records.first() {
            None => Ok(Position::default()),
            Some(rec) => {
                let size = number_field("value", rec.value.as_ref())
                    .map_err(|e| ExchangeError::PositionQuery(e.to_string()))?;
                Ok(Position { size })
            }
        }
    }
}

// ======================= WIRE: ORDER SUBMISSION =======================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderArgs {
    pub token_id: String,
    pub price: String,
    pub size: String,
    pub side: Side,
}

impl OrderArgs {
    pub fn limit(token_id: &str, price: f64, size: f64, side: Side) -> Self {
        Self {
            token_id: token_id.to_string(),
            price: format!("{:.4}", price),
            size: format!("{:.2}", size),
            side,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostOrderRequest {
    pub order: OrderArgs,
    pub owner: String,
    pub order_type: TimeInForce,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostOrderResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(rename = "errorMsg", default)]
    pub error_msg: String,
    #[serde(rename = "orderID")]
    pub order_id: Option<String>,
}

impl PostOrderResponse {
    pub fn into_order_id(self) -> ExchangeResult<OrderId> {
        if !self.success {
            return Err(ExchangeError::OrderRejected(if self.error_msg.is_empty() {
                "submission not accepted".to_string()
            } else {
                self.error_msg
            }));
        }
        self.order_id
            .filter(|id| !id.is_empty())
            .map(OrderId)
            .ok_or_else(|| ExchangeError::Malformed("accepted order missing 'orderID'".into()))
    }
}

// ======================= WIRE: CANCEL =======================

#[derive(Debug, Clone, Serialize)]
pub struct CancelOrderRequest {
    #[serde(rename = "orderID")]
    pub order_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CancelMarketRequest {
    pub asset_id: String,
}

// ======================= HELPERS =======================

/// Numbers arrive either as JSON numbers or decimal strings.
fn number_field(name: &str, value: Option<&Value>) -> ExchangeResult<f64> {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => return Err(ExchangeError::Malformed(format!("missing '{}'", name))),
    };
    parsed
        .filter(|v| v.is_finite())
        .ok_or_else(|| ExchangeError::Malformed(format!("'{}' is not a number", name)))
}
