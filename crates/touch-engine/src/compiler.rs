//! Trigger compilation.
//!
//! Turns symbolic price references into concrete thresholds using the
//! contract's catalog prices. Pure: no broker calls, no state.

use touch_core::{
    Attribute, BracketPlan, ContractMeta, CoreError, OrderSpec, Price, PriceReference,
    PriceThresholdSpec, Result, Threshold, ThresholdSet, TriggerSpec,
};

use crate::store::{BracketCondition, CompiledCondition, ConditionId};

#[derive(Debug, Clone, Copy, Default)]
pub struct ConditionCompiler;

impl ConditionCompiler {
    pub fn new() -> Self {
        Self
    }

    /// Resolve every set attribute of `spec`.
    ///
    /// Returns `Ok(None)` for an empty spec.
    pub fn resolve(&self, spec: &TriggerSpec, contract: &ContractMeta) -> Result<Option<ThresholdSet>> {
        let mut thresholds = ThresholdSet::new();

        for (attr, price_spec) in spec.price_specs() {
            thresholds.insert(attr, self.resolve_price(Attribute::from(attr), price_spec, contract)?);
        }
        for (attr, qty_spec) in spec.quantity_specs() {
            thresholds.insert(attr, Threshold::new(qty_spec.qty.inner(), qty_spec.trend));
        }
        for (attr, scope_spec) in spec.scope_specs() {
            thresholds.insert(attr, scope_spec.to_threshold());
        }

        if thresholds.is_empty() {
            return Ok(None);
        }
        Ok(Some(thresholds))
    }

    /// Compile `spec` and pair it with `order`.
    pub fn compile(
        &self,
        spec: &TriggerSpec,
        contract: &ContractMeta,
        order: &OrderSpec,
    ) -> Result<Option<CompiledCondition>> {
        Ok(self
            .resolve(spec, contract)?
            .map(|thresholds| CompiledCondition::new(thresholds, contract.clone(), order.clone())))
    }

    /// Build the exit pair for a filled entry. `None` when the plan has
    /// neither side.
    pub fn compile_bracket(
        &self,
        plan: &BracketPlan,
        contract: &ContractMeta,
        entry_seqno: &str,
    ) -> Result<Option<BracketCondition>> {
        if plan.is_empty() {
            return Ok(None);
        }
        let loss = plan
            .loss
            .as_ref()
            .map(|spec| self.resolve_price(Attribute::Close, spec, contract))
            .transpose()?;
        let profit = plan
            .profit
            .as_ref()
            .map(|spec| self.resolve_price(Attribute::Close, spec, contract))
            .transpose()?;

        Ok(Some(BracketCondition {
            id: ConditionId::default(),
            code: contract.code.clone(),
            entry_seqno: entry_seqno.to_string(),
            loss,
            profit,
            contract: contract.clone(),
            loss_order: plan.loss_order.clone(),
            profit_order: plan.profit_order.clone(),
            executed: false,
            fired: None,
            execution: None,
        }))
    }

    fn resolve_price(
        &self,
        attr: Attribute,
        spec: &PriceThresholdSpec,
        contract: &ContractMeta,
    ) -> Result<Threshold> {
        let price = match spec.reference {
            PriceReference::Explicit => return Ok(Threshold::new(spec.price.inner(), spec.trend)),
            PriceReference::LimitUp => contract.limit_up,
            PriceReference::LimitDown => contract.limit_down,
            PriceReference::Unchanged => contract.reference,
        };
        // A zero catalog price means the contract has no such limit.
        if price == Price::ZERO {
            return Err(CoreError::InvalidPrice(format!(
                "{}: {attr} refers to {:?} but the contract has none",
                contract.code, spec.reference
            )));
        }
        Ok(Threshold::new(price.inner(), spec.trend))
    }
}
