//! Broker session port.
//!
//! The engine never talks to an exchange directly. Contract lookup,
//! snapshots, subscriptions and order submission all go through this
//! trait so tests and hosts can plug in their own session.

use std::fmt;

use thiserror::Error;
use touch_core::{ClientOrderId, ContractMeta, OrderReceipt, OrderSpec, Snapshot};

/// Market-data channel of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuoteChannel {
    Tick,
    BidAsk,
}

impl fmt::Display for QuoteChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tick => write!(f, "tick"),
            Self::BidAsk => write!(f, "bidask"),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum BrokerError {
    #[error("Rejected: {0}")]
    Rejected(String),

    #[error("Unavailable: {0}")]
    Unavailable(String),
}

pub type BrokerResult<T> = Result<T, BrokerError>;

/// Broker and market-data session.
///
/// `submit_order` must return once the order is handed off; fills are
/// reported later as order events, never awaited here.
#[cfg_attr(test, mockall::automock)]
pub trait Broker: Send + Sync {
    /// Contract metadata for `code`, `None` when the catalog has no such code.
    fn lookup_contract(&self, code: &str) -> Option<ContractMeta>;

    /// One-shot snapshot used to seed streaming state.
    fn query_snapshot(&self, contract: &ContractMeta) -> BrokerResult<Snapshot>;

    fn subscribe(&self, contract: &ContractMeta, channel: QuoteChannel) -> BrokerResult<()>;

    fn unsubscribe(&self, contract: &ContractMeta, channel: QuoteChannel) -> BrokerResult<()>;

    fn submit_order(
        &self,
        contract: &ContractMeta,
        order: &OrderSpec,
        cloid: &ClientOrderId,
    ) -> BrokerResult<OrderReceipt>;
}
