//! Core domain types for the touch-price trigger engine.
//!
//! This crate provides the types shared by the feed, engine and host:
//! - `Price`, `Size`: Precision-safe numeric types
//! - `Trend`: Threshold comparison direction
//! - `TriggerSpec`, `ThresholdSet`, `BracketPlan`: Conditions before and after resolution
//! - `ContractMeta`, `Snapshot`: Catalog and seed data
//! - `TickEvent`, `BidAskEvent`, `OrderEvent`: Inbound messages
//! - `OrderSpec`, `ClientOrderId`, `OrderReceipt`: Orders and their handles

pub mod condition;
pub mod decimal;
pub mod error;
pub mod market;
pub mod order;
pub mod trend;
pub mod types;

pub use condition::{
    Attribute, BracketPlan, PriceAttribute, PriceReference, PriceThresholdSpec,
    QuantityAttribute, QuantityThresholdSpec, ScopeAttribute, ScopeKind, ScopeSpec, Threshold,
    ThresholdSet, TriggerSpec,
};
pub use decimal::{Price, Size};
pub use error::{CoreError, Result};
pub use market::{ContractMeta, Snapshot};
pub use order::{ClientOrderId, OrderReceipt, OrderSide, OrderSpec, PriceType, TimeInForce};
pub use trend::Trend;
pub use types::{BidAskEvent, OrderEvent, OrderEventKind, TickEvent, TickSide};
