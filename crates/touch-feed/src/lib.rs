//! Market state cache and feed parsing for the touch-price engine.
//!
//! Keeps one derived [`MarketState`] per watched contract, seeded once
//! from a snapshot and then mutated in place by tick and quote events.

pub mod error;
pub mod market_state;
pub mod parser;

pub use error::{FeedError, FeedResult};
pub use market_state::{IngestOutcome, MarketState, MarketStateCache};
pub use parser::{FeedMessage, MessageParser};
