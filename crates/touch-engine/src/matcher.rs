//! Condition matching with an execute-once latch.
//!
//! `touch` evaluates one code's conditions against its market state and
//! latches every match while holding that code's store entry. The caller
//! submits orders for the returned firings after the entry is released,
//! so a second `touch` on the same code can never see a matched
//! condition as still live.

use touch_core::{Attribute, BracketPlan, ContractMeta, OrderSpec, ThresholdSet};
use touch_feed::MarketState;
use tracing::info;

use crate::events::FiringKind;
use crate::store::{BracketCondition, BracketSide, ConditionId, ConditionStore, StoredCondition};

/// A latched condition whose order must now be submitted.
#[derive(Debug, Clone)]
pub struct Firing {
    pub condition_id: ConditionId,
    pub code: String,
    pub kind: FiringKind,
    pub contract: ContractMeta,
    pub order: OrderSpec,
    /// Exit to track once this order is acknowledged.
    pub bracket: Option<BracketPlan>,
}

/// True when every threshold is touched. An empty set never matches.
pub fn thresholds_match(thresholds: &ThresholdSet, state: &MarketState) -> bool {
    !thresholds.is_empty()
        && thresholds
            .iter()
            .all(|(attr, threshold)| threshold.is_touched(state.value_of(attr)))
}

/// Loss side first, then profit, both against close.
pub fn bracket_side(bracket: &BracketCondition, state: &MarketState) -> Option<BracketSide> {
    let close = state.value_of(Attribute::Close);
    if bracket.loss.is_some_and(|t| t.is_touched(close)) {
        return Some(BracketSide::Loss);
    }
    if bracket.profit.is_some_and(|t| t.is_touched(close)) {
        return Some(BracketSide::Profit);
    }
    None
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Matcher;

impl Matcher {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate `code`'s unexecuted conditions in store order and latch
    /// the ones that match.
    pub fn touch(&self, code: &str, state: &MarketState, store: &ConditionStore) -> Vec<Firing> {
        store
            .with_code_mut(code, |conditions| {
                conditions
                    .iter_mut()
                    .filter(|stored| !stored.is_executed())
                    .filter_map(|stored| self.evaluate(stored, state))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn evaluate(&self, stored: &mut StoredCondition, state: &MarketState) -> Option<Firing> {
        match stored {
            StoredCondition::Touch(condition) => {
                if !thresholds_match(&condition.thresholds, state) {
                    return None;
                }
                // Latch before anything is submitted.
                condition.executed = true;
                info!(
                    condition_id = %condition.id,
                    code = %condition.code,
                    close = %state.close,
                    order = %condition.order,
                    "Condition touched"
                );
                Some(Firing {
                    condition_id: condition.id,
                    code: condition.code.clone(),
                    kind: FiringKind::Touch,
                    contract: condition.contract.clone(),
                    order: condition.order.clone(),
                    bracket: condition.bracket.clone(),
                })
            }
            StoredCondition::Bracket(bracket) => {
                let side = bracket_side(bracket, state)?;
                bracket.executed = true;
                bracket.fired = Some(side);
                let (kind, order) = match side {
                    BracketSide::Loss => (FiringKind::BracketLoss, bracket.loss_order.clone()),
                    BracketSide::Profit => (FiringKind::BracketProfit, bracket.profit_order.clone()),
                };
                info!(
                    condition_id = %bracket.id,
                    code = %bracket.code,
                    entry_seqno = %bracket.entry_seqno,
                    side = ?side,
                    close = %state.close,
                    "Bracket touched"
                );
                Some(Firing {
                    condition_id: bracket.id,
                    code: bracket.code.clone(),
                    kind,
                    contract: bracket.contract.clone(),
                    order,
                    bracket: None,
                })
            }
        }
    }
}
