//! Contract metadata and snapshot seed data.

use crate::decimal::{Price, Size};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Contract metadata from the instrument catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContractMeta {
    /// Instrument code, e.g. "TXFC0".
    pub code: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub name: String,
    pub limit_up: Price,
    pub limit_down: Price,
    /// Reference (previous settlement) price.
    pub reference: Price,
}

impl ContractMeta {
    pub fn new(code: impl Into<String>, limit_up: Price, limit_down: Price, reference: Price) -> Self {
        Self {
            code: code.into(),
            symbol: String::new(),
            name: String::new(),
            limit_up,
            limit_down,
            reference,
        }
    }
}

impl fmt::Display for ContractMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.symbol.is_empty() {
            write!(f, "{}", self.code)
        } else {
            write!(f, "{}({})", self.code, self.symbol)
        }
    }
}

/// One-shot market snapshot used to seed streaming state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub close: Price,
    #[serde(default)]
    pub buy_price: Price,
    #[serde(default)]
    pub sell_price: Price,
    #[serde(default)]
    pub high: Price,
    #[serde(default)]
    pub low: Price,
    #[serde(default)]
    pub change_price: Price,
    #[serde(default)]
    pub change_rate: Decimal,
    #[serde(default)]
    pub volume: Size,
    #[serde(default)]
    pub total_volume: Size,
}
