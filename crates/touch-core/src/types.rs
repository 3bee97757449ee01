//! Inbound market-data and order-lifecycle messages.
//!
//! These are the typed forms of what the broker session delivers. The
//! `simulated` flag marks exchange test activity that must never move
//! state or trigger orders.

use crate::decimal::{Price, Size};
use crate::market::ContractMeta;
use crate::order::OrderSpec;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which side of the book a trade printed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TickSide {
    /// Traded at the ask.
    Ask,
    /// Traded at the bid.
    Bid,
    /// Side not reported.
    #[default]
    Unknown,
}

/// Trade tick for one contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickEvent {
    pub code: String,
    pub close: Price,
    pub high: Price,
    pub low: Price,
    /// Volume of this trade.
    pub volume: Size,
    /// Session volume so far.
    pub total_volume: Size,
    #[serde(default)]
    pub side: TickSide,
    /// Change from reference, when the feed reports it.
    #[serde(default)]
    pub change_price: Option<Price>,
    /// Percentage change from reference, when the feed reports it.
    #[serde(default)]
    pub change_rate: Option<Decimal>,
    #[serde(default)]
    pub simulated: bool,
}

/// Order-book quote for one contract, best level first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidAskEvent {
    pub code: String,
    pub bid_price: Vec<Price>,
    pub bid_volume: Vec<Size>,
    pub ask_price: Vec<Price>,
    pub ask_volume: Vec<Size>,
    #[serde(default)]
    pub simulated: bool,
}

impl BidAskEvent {
    pub fn best_bid(&self) -> Option<Price> {
        self.bid_price.first().copied()
    }

    pub fn best_ask(&self) -> Option<Price> {
        self.ask_price.first().copied()
    }

    /// The feed reports a zero ask volume when the book is crossed or
    /// empty; such quotes carry no usable prices.
    pub fn has_empty_level(&self) -> bool {
        self.ask_volume.iter().any(Size::is_zero)
    }
}

/// Stage an order has reached at the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderEventKind {
    /// Order accepted by the exchange.
    Acknowledged,
    /// Order (fully) filled.
    Filled,
}

impl fmt::Display for OrderEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Acknowledged => write!(f, "acknowledged"),
            Self::Filled => write!(f, "filled"),
        }
    }
}

/// Order lifecycle notification, correlated by broker sequence number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderEvent {
    pub kind: OrderEventKind,
    pub seqno: String,
    pub code: String,
    /// Contract the order traded, when the broker includes it.
    #[serde(default)]
    pub contract: Option<ContractMeta>,
    /// The order this event reports on, when the broker echoes it.
    #[serde(default)]
    pub order: Option<OrderSpec>,
}

impl OrderEvent {
    pub fn new(kind: OrderEventKind, seqno: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            kind,
            seqno: seqno.into(),
            code: code.into(),
            contract: None,
            order: None,
        }
    }

    pub fn with_contract(mut self, contract: ContractMeta) -> Self {
        self.contract = Some(contract);
        self
    }

    pub fn with_order(mut self, order: OrderSpec) -> Self {
        self.order = Some(order);
        self
    }
}
