//! Engine error types.

use thiserror::Error;

use crate::broker::BrokerError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Unknown contract: {0}")]
    UnknownContract(String),

    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),

    #[error("Invalid condition: {0}")]
    Core(#[from] touch_core::CoreError),

    #[error("Feed error: {0}")]
    Feed(#[from] touch_feed::FeedError),
}

pub type EngineResult<T> = Result<T, EngineError>;
