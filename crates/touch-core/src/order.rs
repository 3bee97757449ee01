//! Order-related types and identifiers.
//!
//! The engine never builds orders itself: callers supply a fully specified
//! [`OrderSpec`] and the engine only decides when to submit it.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::decimal::Price;
use crate::error::{CoreError, Result};

/// Order side: buy or sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Returns the opposite side.
    pub fn opposite(&self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "Buy"),
            Self::Sell => write!(f, "Sell"),
        }
    }
}

/// How the order price is interpreted by the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PriceType {
    /// Limit price.
    #[default]
    #[serde(rename = "LMT")]
    Limit,
    /// Market order.
    #[serde(rename = "MKT")]
    Market,
    /// Market order with protection range.
    #[serde(rename = "MKP")]
    MarketWithProtection,
}

impl fmt::Display for PriceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Limit => write!(f, "LMT"),
            Self::Market => write!(f, "MKT"),
            Self::MarketWithProtection => write!(f, "MKP"),
        }
    }
}

/// Time-in-force for orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TimeInForce {
    /// Rest of day.
    #[default]
    #[serde(rename = "ROD")]
    RestOfDay,
    /// Immediate-or-cancel.
    #[serde(rename = "IOC")]
    ImmediateOrCancel,
    /// Fill-or-kill.
    #[serde(rename = "FOK")]
    FillOrKill,
}

impl fmt::Display for TimeInForce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RestOfDay => write!(f, "ROD"),
            Self::ImmediateOrCancel => write!(f, "IOC"),
            Self::FillOrKill => write!(f, "FOK"),
        }
    }
}

/// A fully specified order waiting for its trigger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderSpec {
    pub action: OrderSide,
    /// Ignored by the exchange for market price types.
    #[serde(default)]
    pub price: Price,
    pub quantity: u32,
    #[serde(default)]
    pub price_type: PriceType,
    #[serde(default)]
    pub order_type: TimeInForce,
}

impl OrderSpec {
    /// Market order of `quantity` lots.
    pub fn market(action: OrderSide, quantity: u32) -> Self {
        Self {
            action,
            price: Price::ZERO,
            quantity,
            price_type: PriceType::Market,
            order_type: TimeInForce::RestOfDay,
        }
    }

    /// Limit order of `quantity` lots at `price`.
    pub fn limit(action: OrderSide, price: Price, quantity: u32) -> Self {
        Self {
            action,
            price,
            quantity,
            price_type: PriceType::Limit,
            order_type: TimeInForce::RestOfDay,
        }
    }
}

impl OrderSpec {
    /// Reject orders the broker could never accept.
    pub fn validate(&self) -> Result<()> {
        if self.quantity == 0 {
            return Err(CoreError::InvalidCondition(format!(
                "order quantity must be positive: {self}"
            )));
        }
        if self.price_type == PriceType::Limit && !self.price.is_positive() {
            return Err(CoreError::InvalidPrice(format!(
                "limit order needs a positive price: {self}"
            )));
        }
        Ok(())
    }
}

impl fmt::Display for OrderSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.price_type {
            PriceType::Limit => write!(
                f,
                "{} {} @ {} {} {}",
                self.action, self.quantity, self.price, self.price_type, self.order_type
            ),
            _ => write!(
                f,
                "{} {} {} {}",
                self.action, self.quantity, self.price_type, self.order_type
            ),
        }
    }
}

/// Client order ID for idempotency.
///
/// Every submission carries a fresh cloid so a broker retry can never
/// turn one trigger into two orders.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientOrderId(String);

impl ClientOrderId {
    /// Create a new unique client order ID.
    ///
    /// Format: `touch_{timestamp_ms}_{uuid_short}`
    pub fn new() -> Self {
        let ts = chrono::Utc::now().timestamp_millis();
        let uuid_short = &Uuid::new_v4().to_string()[..8];
        Self(format!("touch_{ts}_{uuid_short}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ClientOrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientOrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ClientOrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// What the broker hands back for an accepted submission.
///
/// `seqno` is the broker's sequence number; later acknowledgment and fill
/// events for the same order carry it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderReceipt {
    pub cloid: ClientOrderId,
    pub seqno: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_order_side_opposite() {
        assert_eq!(OrderSide::Buy.opposite(), OrderSide::Sell);
        assert_eq!(OrderSide::Sell.opposite(), OrderSide::Buy);
    }

    #[test]
    fn test_client_order_id_unique() {
        let id1 = ClientOrderId::new();
        let id2 = ClientOrderId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_client_order_id_format() {
        let id = ClientOrderId::new();
        assert!(id.as_str().starts_with("touch_"));
    }

    #[test]
    fn test_order_spec_wire_names() {
        let order: OrderSpec = serde_json::from_str(
            r#"{"action": "Buy", "price": "-1", "quantity": 1, "price_type": "MKT", "order_type": "ROD"}"#,
        )
        .unwrap();
        assert_eq!(order.action, OrderSide::Buy);
        assert_eq!(order.price_type, PriceType::Market);
        assert_eq!(order.order_type, TimeInForce::RestOfDay);
        assert_eq!(order.price, Price::new(dec!(-1)));
    }

    #[test]
    fn test_order_spec_validate() {
        assert!(OrderSpec::market(OrderSide::Buy, 1).validate().is_ok());
        assert!(OrderSpec::market(OrderSide::Buy, 0).validate().is_err());
        assert!(OrderSpec::limit(OrderSide::Buy, Price::ZERO, 1)
            .validate()
            .is_err());
    }

    #[test]
    fn test_order_spec_display() {
        let order = OrderSpec::limit(OrderSide::Sell, Price::new(dec!(9800)), 2);
        assert_eq!(order.to_string(), "Sell 2 @ 9800 LMT ROD");
    }
}
