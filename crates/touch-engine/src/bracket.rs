//! Confirm-then-arm bracket protocol.
//!
//! An entry order that carries a [`BracketPlan`] is tracked by broker
//! sequence number from the moment it is submitted. Its acknowledgment
//! prepares the bracket (thresholds resolved against the traded
//! contract); its fill admits the bracket into the condition store.
//! Under [`ArmPolicy::OnAcknowledge`] the acknowledgment does both.
//! Events correlate by sequence number and instrument code, and the
//! bracket is keyed by the contract the fill reports.

use std::collections::HashMap;

use parking_lot::Mutex;
use touch_core::{BracketPlan, ContractMeta, OrderEvent, OrderEventKind};
use tracing::{debug, info};

use crate::compiler::ConditionCompiler;
use crate::config::ArmPolicy;
use crate::error::EngineResult;
use crate::store::{BracketCondition, ConditionId, ConditionStore};

#[derive(Debug, Clone)]
enum Stage {
    /// Entry submitted, nothing compiled yet.
    Pending,
    /// Entry acknowledged, bracket compiled but not monitored.
    Prepared(BracketCondition),
}

#[derive(Debug, Clone)]
struct TrackedEntry {
    contract: ContractMeta,
    plan: BracketPlan,
    stage: Stage,
}

/// Result of feeding an order event to the manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BracketTransition {
    /// Not a tracked entry, or nothing to do at this stage.
    Ignored,
    Prepared { code: String },
    Armed {
        id: ConditionId,
        contract: ContractMeta,
    },
}

pub struct BracketOrderManager {
    policy: ArmPolicy,
    compiler: ConditionCompiler,
    entries: Mutex<HashMap<String, TrackedEntry>>,
}

impl BracketOrderManager {
    pub fn new(policy: ArmPolicy) -> Self {
        Self {
            policy,
            compiler: ConditionCompiler::new(),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> ArmPolicy {
        self.policy
    }

    /// Start tracking a submitted entry. Empty plans are not tracked.
    pub fn track(&self, seqno: &str, contract: &ContractMeta, plan: &BracketPlan) -> bool {
        if plan.is_empty() {
            return false;
        }
        debug!(seqno = %seqno, code = %contract.code, "Tracking bracket entry");
        self.entries.lock().insert(
            seqno.to_string(),
            TrackedEntry {
                contract: contract.clone(),
                plan: plan.clone(),
                stage: Stage::Pending,
            },
        );
        true
    }

    pub fn is_tracking(&self, seqno: &str) -> bool {
        self.entries.lock().contains_key(seqno)
    }

    /// Entries submitted but not yet armed.
    pub fn pending_count(&self) -> usize {
        self.entries.lock().len()
    }

    /// Advance the entry correlated with `event.seqno`.
    ///
    /// The bracket is keyed by the contract on the event when the broker
    /// supplies one, otherwise by the contract the entry was sent on.
    pub fn on_order_event(
        &self,
        event: &OrderEvent,
        store: &ConditionStore,
    ) -> EngineResult<BracketTransition> {
        let mut entries = self.entries.lock();
        let Some(mut entry) = entries.remove(&event.seqno) else {
            return Ok(BracketTransition::Ignored);
        };
        if !correlates(event, &entry.contract) {
            debug!(
                seqno = %event.seqno,
                code = %event.code,
                tracked = %entry.contract.code,
                "Order event code does not match tracked entry"
            );
            entries.insert(event.seqno.clone(), entry);
            return Ok(BracketTransition::Ignored);
        }

        let arm_now = match event.kind {
            OrderEventKind::Filled => true,
            OrderEventKind::Acknowledged => self.policy == ArmPolicy::OnAcknowledge,
        };

        let prepared = match std::mem::replace(&mut entry.stage, Stage::Pending) {
            Stage::Prepared(bracket) if arm_now => match &event.contract {
                // Filled on another contract than the one acknowledged.
                Some(filled) if filled.code != bracket.code => {
                    debug!(
                        seqno = %event.seqno,
                        prepared = %bracket.code,
                        filled = %filled.code,
                        "Recompiling bracket for filled contract"
                    );
                    let Some(compiled) =
                        self.compiler
                            .compile_bracket(&entry.plan, filled, &event.seqno)?
                    else {
                        return Ok(BracketTransition::Ignored);
                    };
                    compiled
                }
                _ => bracket,
            },
            Stage::Prepared(bracket) => {
                entry.stage = Stage::Prepared(bracket);
                entries.insert(event.seqno.clone(), entry);
                return Ok(BracketTransition::Ignored);
            }
            Stage::Pending => {
                let contract = event.contract.as_ref().unwrap_or(&entry.contract);
                // A failed compile drops the entry; it can never succeed later.
                let Some(compiled) =
                    self.compiler
                        .compile_bracket(&entry.plan, contract, &event.seqno)?
                else {
                    return Ok(BracketTransition::Ignored);
                };
                if !arm_now {
                    let code = compiled.code.clone();
                    info!(seqno = %event.seqno, code = %code, "Bracket prepared");
                    entry.stage = Stage::Prepared(compiled);
                    entries.insert(event.seqno.clone(), entry);
                    return Ok(BracketTransition::Prepared { code });
                }
                compiled
            }
        };

        drop(entries);

        let contract = prepared.contract.clone();
        let id = store.admit_bracket(prepared);
        info!(
            seqno = %event.seqno,
            code = %contract.code,
            condition_id = %id,
            "Bracket armed"
        );
        Ok(BracketTransition::Armed { id, contract })
    }
}

/// Events correlate by seqno and code. A differing code is accepted only
/// when the event names the contract it traded.
fn correlates(event: &OrderEvent, tracked: &ContractMeta) -> bool {
    event.code == tracked.code
        || event
            .contract
            .as_ref()
            .is_some_and(|contract| contract.code == event.code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoredCondition;
    use rust_decimal_macros::dec;
    use touch_core::{OrderSide, OrderSpec, Price, PriceThresholdSpec, Trend};

    fn contract(code: &str) -> ContractMeta {
        ContractMeta::new(
            code,
            Price::new(dec!(10805)),
            Price::new(dec!(8841)),
            Price::new(dec!(9823)),
        )
    }

    fn plan() -> BracketPlan {
        BracketPlan {
            loss: Some(PriceThresholdSpec::explicit(Price::new(dec!(9800)), Trend::Down)),
            profit: Some(PriceThresholdSpec::limit_up(Trend::Up)),
            loss_order: OrderSpec::market(OrderSide::Sell, 1),
            profit_order: OrderSpec::market(OrderSide::Sell, 1),
        }
    }

    #[test]
    fn test_ack_prepares_fill_arms() {
        let manager = BracketOrderManager::new(ArmPolicy::OnFill);
        let store = ConditionStore::new();
        assert!(manager.track("S1", &contract("TXFC0"), &plan()));

        let ack = OrderEvent::new(OrderEventKind::Acknowledged, "S1", "TXFC0");
        assert_eq!(
            manager.on_order_event(&ack, &store).unwrap(),
            BracketTransition::Prepared {
                code: "TXFC0".to_string()
            }
        );
        assert!(!store.has_conditions("TXFC0"));
        assert!(manager.is_tracking("S1"));

        let fill = OrderEvent::new(OrderEventKind::Filled, "S1", "TXFC0");
        let BracketTransition::Armed { id, contract } = manager.on_order_event(&fill, &store).unwrap()
        else {
            panic!("Expected Armed");
        };
        assert_eq!(contract.code, "TXFC0");
        assert!(!manager.is_tracking("S1"));

        let stored = store.list("TXFC0");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id(), id);
        let StoredCondition::Bracket(bracket) = &stored[0] else {
            panic!("Expected bracket");
        };
        assert_eq!(bracket.profit.unwrap().value, dec!(10805));
    }

    #[test]
    fn test_ack_arms_under_acknowledge_policy() {
        let manager = BracketOrderManager::new(ArmPolicy::OnAcknowledge);
        let store = ConditionStore::new();
        manager.track("S1", &contract("TXFC0"), &plan());

        let ack = OrderEvent::new(OrderEventKind::Acknowledged, "S1", "TXFC0");
        assert!(matches!(
            manager.on_order_event(&ack, &store).unwrap(),
            BracketTransition::Armed { .. }
        ));
        assert_eq!(store.list("TXFC0").len(), 1);

        // The later fill finds nothing left to do.
        let fill = OrderEvent::new(OrderEventKind::Filled, "S1", "TXFC0");
        assert_eq!(
            manager.on_order_event(&fill, &store).unwrap(),
            BracketTransition::Ignored
        );
        assert_eq!(store.list("TXFC0").len(), 1);
    }

    #[test]
    fn test_fill_without_ack_arms() {
        let manager = BracketOrderManager::new(ArmPolicy::OnFill);
        let store = ConditionStore::new();
        manager.track("S1", &contract("TXFC0"), &plan());

        let fill = OrderEvent::new(OrderEventKind::Filled, "S1", "TXFC0");
        assert!(matches!(
            manager.on_order_event(&fill, &store).unwrap(),
            BracketTransition::Armed { .. }
        ));
    }

    #[test]
    fn test_unknown_seqno_ignored() {
        let manager = BracketOrderManager::new(ArmPolicy::OnFill);
        let store = ConditionStore::new();
        manager.track("S1", &contract("TXFC0"), &plan());

        let fill = OrderEvent::new(OrderEventKind::Filled, "S9", "TXFC0");
        assert_eq!(
            manager.on_order_event(&fill, &store).unwrap(),
            BracketTransition::Ignored
        );
        assert!(manager.is_tracking("S1"));
    }

    #[test]
    fn test_duplicate_ack_ignored() {
        let manager = BracketOrderManager::new(ArmPolicy::OnFill);
        let store = ConditionStore::new();
        manager.track("S1", &contract("TXFC0"), &plan());

        let ack = OrderEvent::new(OrderEventKind::Acknowledged, "S1", "TXFC0");
        manager.on_order_event(&ack, &store).unwrap();
        assert_eq!(
            manager.on_order_event(&ack, &store).unwrap(),
            BracketTransition::Ignored
        );
    }

    #[test]
    fn test_keyed_by_event_contract() {
        let manager = BracketOrderManager::new(ArmPolicy::OnFill);
        let store = ConditionStore::new();
        manager.track("S1", &contract("TXFC0"), &plan());

        let mut fill = OrderEvent::new(OrderEventKind::Filled, "S1", "TXFF0");
        fill.contract = Some(contract("TXFF0"));
        manager.on_order_event(&fill, &store).unwrap();

        assert!(store.has_conditions("TXFF0"));
        assert!(!store.has_conditions("TXFC0"));
    }

    #[test]
    fn test_fill_on_other_contract_rekeys_prepared_bracket() {
        let manager = BracketOrderManager::new(ArmPolicy::OnFill);
        let store = ConditionStore::new();
        manager.track("S1", &contract("TXFC0"), &plan());

        let ack = OrderEvent::new(OrderEventKind::Acknowledged, "S1", "TXFC0");
        manager.on_order_event(&ack, &store).unwrap();

        let mut fill = OrderEvent::new(OrderEventKind::Filled, "S1", "TXFF0");
        fill.contract = Some(contract("TXFF0"));
        let BracketTransition::Armed { contract, .. } =
            manager.on_order_event(&fill, &store).unwrap()
        else {
            panic!("Expected Armed");
        };
        assert_eq!(contract.code, "TXFF0");

        assert!(store.has_conditions("TXFF0"));
        assert!(!store.has_conditions("TXFC0"));
        let StoredCondition::Bracket(bracket) = &store.list("TXFF0")[0] else {
            panic!("Expected bracket");
        };
        assert_eq!(bracket.code, "TXFF0");
        assert_eq!(bracket.contract.code, "TXFF0");
    }

    #[test]
    fn test_event_for_other_code_ignored() {
        let manager = BracketOrderManager::new(ArmPolicy::OnFill);
        let store = ConditionStore::new();
        manager.track("S1", &contract("TXFC0"), &plan());

        let stray = OrderEvent::new(OrderEventKind::Filled, "S1", "MXFC0");
        assert_eq!(
            manager.on_order_event(&stray, &store).unwrap(),
            BracketTransition::Ignored
        );
        assert!(manager.is_tracking("S1"));
        assert!(!store.has_conditions("MXFC0"));
        assert!(!store.has_conditions("TXFC0"));

        // The matching fill still arms it.
        let fill = OrderEvent::new(OrderEventKind::Filled, "S1", "TXFC0");
        assert!(matches!(
            manager.on_order_event(&fill, &store).unwrap(),
            BracketTransition::Armed { .. }
        ));
    }

    #[test]
    fn test_empty_plan_not_tracked() {
        let manager = BracketOrderManager::new(ArmPolicy::OnFill);
        let empty = BracketPlan {
            loss: None,
            profit: None,
            loss_order: OrderSpec::market(OrderSide::Sell, 1),
            profit_order: OrderSpec::market(OrderSide::Sell, 1),
        };
        assert!(!manager.track("S1", &contract("TXFC0"), &empty));
        assert_eq!(manager.pending_count(), 0);
    }
}
