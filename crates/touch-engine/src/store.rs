//! Condition storage.
//!
//! Conditions are kept per contract code in insertion order; that order
//! is both the evaluation order and the order in which deletes match.
//! Holding a code's entry serializes the match-then-latch sequence for
//! that code.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde::Serialize;
use touch_core::{BracketPlan, ContractMeta, OrderReceipt, OrderSpec, Threshold, ThresholdSet};

/// Engine-assigned condition identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub struct ConditionId(u64);

impl ConditionId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConditionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A resolved trigger paired with the order it submits.
#[derive(Debug, Clone, Serialize)]
pub struct CompiledCondition {
    pub(crate) id: ConditionId,
    pub code: String,
    pub thresholds: ThresholdSet,
    pub contract: ContractMeta,
    pub order: OrderSpec,
    /// Exit to arm once this condition's order fills.
    pub bracket: Option<BracketPlan>,
    pub(crate) executed: bool,
    pub(crate) execution: Option<OrderReceipt>,
}

impl CompiledCondition {
    pub fn new(thresholds: ThresholdSet, contract: ContractMeta, order: OrderSpec) -> Self {
        Self {
            id: ConditionId::default(),
            code: contract.code.clone(),
            thresholds,
            contract,
            order,
            bracket: None,
            executed: false,
            execution: None,
        }
    }

    #[must_use]
    pub fn with_bracket(mut self, plan: BracketPlan) -> Self {
        self.bracket = Some(plan);
        self
    }

    pub fn id(&self) -> ConditionId {
        self.id
    }

    pub fn is_executed(&self) -> bool {
        self.executed
    }

    /// Broker receipt of the submitted order, once fired and accepted.
    pub fn execution(&self) -> Option<&OrderReceipt> {
        self.execution.as_ref()
    }

    /// Structural equality used for deletes: same thresholds, order,
    /// contract and bracket. Identity and latch state are ignored.
    pub fn same_as(&self, other: &CompiledCondition) -> bool {
        self.code == other.code
            && self.contract.code == other.contract.code
            && self.thresholds == other.thresholds
            && self.order == other.order
            && self.bracket == other.bracket
    }
}

/// Which side of a bracket fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BracketSide {
    Loss,
    Profit,
}

/// Armed stop-loss / take-profit pair guarding one filled entry.
#[derive(Debug, Clone, Serialize)]
pub struct BracketCondition {
    pub(crate) id: ConditionId,
    pub code: String,
    /// Sequence number of the entry order that armed this bracket.
    pub entry_seqno: String,
    pub loss: Option<Threshold>,
    pub profit: Option<Threshold>,
    pub contract: ContractMeta,
    pub loss_order: OrderSpec,
    pub profit_order: OrderSpec,
    pub(crate) executed: bool,
    pub(crate) fired: Option<BracketSide>,
    pub(crate) execution: Option<OrderReceipt>,
}

impl BracketCondition {
    pub fn id(&self) -> ConditionId {
        self.id
    }

    pub fn is_executed(&self) -> bool {
        self.executed
    }

    pub fn fired_side(&self) -> Option<BracketSide> {
        self.fired
    }

    pub fn execution(&self) -> Option<&OrderReceipt> {
        self.execution.as_ref()
    }
}

/// Anything the store can hold.
#[derive(Debug, Clone, Serialize)]
pub enum StoredCondition {
    Touch(CompiledCondition),
    Bracket(BracketCondition),
}

impl StoredCondition {
    pub fn id(&self) -> ConditionId {
        match self {
            Self::Touch(c) => c.id,
            Self::Bracket(b) => b.id,
        }
    }

    pub fn code(&self) -> &str {
        match self {
            Self::Touch(c) => &c.code,
            Self::Bracket(b) => &b.code,
        }
    }

    pub fn is_executed(&self) -> bool {
        match self {
            Self::Touch(c) => c.executed,
            Self::Bracket(b) => b.executed,
        }
    }

    fn set_execution(&mut self, receipt: OrderReceipt) {
        match self {
            Self::Touch(c) => c.execution = Some(receipt),
            Self::Bracket(b) => b.execution = Some(receipt),
        }
    }
}

/// Conditions per contract code.
pub struct ConditionStore {
    conditions: DashMap<String, Vec<StoredCondition>>,
    next_id: AtomicU64,
}

impl ConditionStore {
    pub fn new() -> Self {
        Self {
            conditions: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    fn allocate_id(&self) -> ConditionId {
        ConditionId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Append a condition under its code. Duplicates are kept.
    pub fn add(&self, mut condition: CompiledCondition) -> ConditionId {
        let id = self.allocate_id();
        condition.id = id;
        condition.executed = false;
        condition.execution = None;
        self.conditions
            .entry(condition.code.clone())
            .or_default()
            .push(StoredCondition::Touch(condition));
        id
    }

    /// Admit an armed bracket. Only the bracket manager calls this.
    pub(crate) fn admit_bracket(&self, mut bracket: BracketCondition) -> ConditionId {
        let id = self.allocate_id();
        bracket.id = id;
        self.conditions
            .entry(bracket.code.clone())
            .or_default()
            .push(StoredCondition::Bracket(bracket));
        id
    }

    /// Remove the first unexecuted condition structurally equal to
    /// `condition`. Returns its id, or `None` when nothing matched.
    pub fn remove(&self, code: &str, condition: &CompiledCondition) -> Option<ConditionId> {
        let mut entry = self.conditions.get_mut(code)?;
        let position = entry.iter().position(|stored| match stored {
            StoredCondition::Touch(c) => !c.executed && c.same_as(condition),
            StoredCondition::Bracket(_) => false,
        })?;
        Some(entry.remove(position).id())
    }

    /// Conditions for `code` in insertion order.
    pub fn list(&self, code: &str) -> Vec<StoredCondition> {
        self.conditions
            .get(code)
            .map(|entry| entry.clone())
            .unwrap_or_default()
    }

    /// Every code's conditions, codes sorted.
    pub fn list_all(&self) -> BTreeMap<String, Vec<StoredCondition>> {
        self.conditions
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Number of unexecuted conditions for `code`.
    pub fn live_count(&self, code: &str) -> usize {
        self.conditions
            .get(code)
            .map(|entry| entry.iter().filter(|c| !c.is_executed()).count())
            .unwrap_or(0)
    }

    pub fn has_conditions(&self, code: &str) -> bool {
        self.conditions
            .get(code)
            .map(|entry| !entry.is_empty())
            .unwrap_or(false)
    }

    /// Run `f` with exclusive access to `code`'s conditions.
    pub(crate) fn with_code_mut<R>(
        &self,
        code: &str,
        f: impl FnOnce(&mut Vec<StoredCondition>) -> R,
    ) -> Option<R> {
        let mut entry = self.conditions.get_mut(code)?;
        Some(f(entry.value_mut()))
    }

    /// Attach the broker receipt to an already latched condition.
    pub(crate) fn record_execution(&self, code: &str, id: ConditionId, receipt: OrderReceipt) {
        self.with_code_mut(code, |conditions| {
            if let Some(stored) = conditions.iter_mut().find(|c| c.id() == id) {
                stored.set_execution(receipt);
            }
        });
    }
}

impl Default for ConditionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use touch_core::{
        ClientOrderId, OrderSide, Price, PriceAttribute, QuantityAttribute, Trend,
    };

    fn contract(code: &str) -> ContractMeta {
        ContractMeta::new(
            code,
            Price::new(dec!(10805)),
            Price::new(dec!(8841)),
            Price::new(dec!(9823)),
        )
    }

    fn condition(code: &str, price: rust_decimal::Decimal) -> CompiledCondition {
        let mut thresholds = ThresholdSet::new();
        thresholds.insert(PriceAttribute::Close, Threshold::new(price, Trend::Up));
        CompiledCondition::new(
            thresholds,
            contract(code),
            OrderSpec::market(OrderSide::Buy, 1),
        )
    }

    #[test]
    fn test_add_preserves_order_and_duplicates() {
        let store = ConditionStore::new();
        let a = store.add(condition("TXFC0", dec!(9985)));
        let b = store.add(condition("TXFC0", dec!(9985)));
        let c = store.add(condition("TXFC0", dec!(9990)));

        let ids: Vec<ConditionId> = store.list("TXFC0").iter().map(|s| s.id()).collect();
        assert_eq!(ids, vec![a, b, c]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_remove_first_structural_match() {
        let store = ConditionStore::new();
        let first = store.add(condition("TXFC0", dec!(9985)));
        let second = store.add(condition("TXFC0", dec!(9985)));

        let removed = store.remove("TXFC0", &condition("TXFC0", dec!(9985)));
        assert_eq!(removed, Some(first));

        let remaining: Vec<ConditionId> = store.list("TXFC0").iter().map(|s| s.id()).collect();
        assert_eq!(remaining, vec![second]);
    }

    #[test]
    fn test_remove_skips_executed() {
        let store = ConditionStore::new();
        store.add(condition("TXFC0", dec!(9985)));
        store.with_code_mut("TXFC0", |conditions| {
            if let StoredCondition::Touch(c) = &mut conditions[0] {
                c.executed = true;
            }
        });

        assert!(store
            .remove("TXFC0", &condition("TXFC0", dec!(9985)))
            .is_none());
        assert_eq!(store.list("TXFC0").len(), 1);
    }

    #[test]
    fn test_remove_unknown_code_is_noop() {
        let store = ConditionStore::new();
        store.add(condition("TXFD0", dec!(9985)));

        assert!(store
            .remove("TXFC0", &condition("TXFC0", dec!(9985)))
            .is_none());
        assert_eq!(store.list("TXFD0").len(), 1);
    }

    #[test]
    fn test_structural_equality_covers_all_thresholds() {
        let mut with_volume = condition("TXFC0", dec!(9985));
        with_volume.thresholds.insert(
            QuantityAttribute::Volume,
            Threshold::new(dec!(5), Trend::Equal),
        );
        assert!(!condition("TXFC0", dec!(9985)).same_as(&with_volume));
    }

    #[test]
    fn test_live_count_and_record_execution() {
        let store = ConditionStore::new();
        let id = store.add(condition("TXFC0", dec!(9985)));
        store.add(condition("TXFC0", dec!(9990)));
        assert_eq!(store.live_count("TXFC0"), 2);

        store.with_code_mut("TXFC0", |conditions| {
            if let StoredCondition::Touch(c) = &mut conditions[0] {
                c.executed = true;
            }
        });
        let receipt = OrderReceipt {
            cloid: ClientOrderId::new(),
            seqno: "S1".to_string(),
        };
        store.record_execution("TXFC0", id, receipt.clone());

        assert_eq!(store.live_count("TXFC0"), 1);
        let StoredCondition::Touch(first) = &store.list("TXFC0")[0] else {
            panic!("Expected touch condition");
        };
        assert_eq!(first.execution(), Some(&receipt));
    }

    #[test]
    fn test_list_all_sorted_by_code() {
        let store = ConditionStore::new();
        store.add(condition("TXFD0", dec!(1)));
        store.add(condition("TXFC0", dec!(1)));

        let codes: Vec<String> = store.list_all().into_keys().collect();
        assert_eq!(codes, vec!["TXFC0".to_string(), "TXFD0".to_string()]);
    }
}
