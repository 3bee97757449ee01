//! Conditional-order trigger engine.
//!
//! Callers register declarative conditions on a contract, each paired
//! with an order. The engine keeps per-contract market state from the
//! broker feed and submits each condition's order at most once, the
//! first time all of its thresholds are touched.
//!
//! - `ConditionCompiler`: symbolic price references to concrete thresholds
//! - `ConditionStore`: per-code conditions in evaluation order
//! - `Matcher`: AND-evaluation with an execute-once latch
//! - `BracketOrderManager`: stop-loss / take-profit armed on entry fill
//! - `TouchEngine`: the facade a host drives

pub mod bracket;
pub mod broker;
pub mod compiler;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod matcher;
pub mod store;

pub use bracket::{BracketOrderManager, BracketTransition};
pub use broker::{Broker, BrokerError, BrokerResult, QuoteChannel};
pub use compiler::ConditionCompiler;
pub use config::{ArmPolicy, EngineConfig};
pub use engine::TouchEngine;
pub use error::{EngineError, EngineResult};
pub use events::{EngineEvent, EventBus, FiringKind};
pub use matcher::{Firing, Matcher};
pub use store::{
    BracketCondition, BracketSide, CompiledCondition, ConditionId, ConditionStore,
    StoredCondition,
};
