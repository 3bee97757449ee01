//! Declarative trigger specifications and their resolved thresholds.
//!
//! A [`TriggerSpec`] is what a caller registers: a contract code plus a
//! set of optional per-attribute thresholds, some of which may refer to
//! contract prices symbolically (limit-up, limit-down, reference). The
//! engine resolves it into a [`ThresholdSet`] of directly comparable
//! values.

use crate::decimal::{Price, Size};
use crate::order::OrderSpec;
use crate::trend::Trend;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// Attributes
// ============================================================================

/// Price-type attributes of the market state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceAttribute {
    Close,
    BuyPrice,
    SellPrice,
    High,
    Low,
}

/// Volume-type attributes. Never resolved against contract prices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantityAttribute {
    Volume,
    TotalVolume,
    AskVolume,
    BidVolume,
}

/// Change-from-reference attributes used by scope conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeAttribute {
    /// Absolute change from the reference price.
    ChangePrice,
    /// Percentage change from the reference price.
    ChangeRate,
}

/// Every attribute a compiled threshold can watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    Close,
    BuyPrice,
    SellPrice,
    High,
    Low,
    ChangePrice,
    ChangeRate,
    Volume,
    TotalVolume,
    AskVolume,
    BidVolume,
}

impl From<PriceAttribute> for Attribute {
    fn from(attr: PriceAttribute) -> Self {
        match attr {
            PriceAttribute::Close => Self::Close,
            PriceAttribute::BuyPrice => Self::BuyPrice,
            PriceAttribute::SellPrice => Self::SellPrice,
            PriceAttribute::High => Self::High,
            PriceAttribute::Low => Self::Low,
        }
    }
}

impl From<QuantityAttribute> for Attribute {
    fn from(attr: QuantityAttribute) -> Self {
        match attr {
            QuantityAttribute::Volume => Self::Volume,
            QuantityAttribute::TotalVolume => Self::TotalVolume,
            QuantityAttribute::AskVolume => Self::AskVolume,
            QuantityAttribute::BidVolume => Self::BidVolume,
        }
    }
}

impl From<ScopeAttribute> for Attribute {
    fn from(attr: ScopeAttribute) -> Self {
        match attr {
            ScopeAttribute::ChangePrice => Self::ChangePrice,
            ScopeAttribute::ChangeRate => Self::ChangeRate,
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Close => "close",
            Self::BuyPrice => "buy_price",
            Self::SellPrice => "sell_price",
            Self::High => "high",
            Self::Low => "low",
            Self::ChangePrice => "change_price",
            Self::ChangeRate => "change_rate",
            Self::Volume => "volume",
            Self::TotalVolume => "total_volume",
            Self::AskVolume => "ask_volume",
            Self::BidVolume => "bid_volume",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Threshold specs (input form)
// ============================================================================

/// How a price threshold's numeric value is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PriceReference {
    /// Use the supplied price as-is.
    #[default]
    #[serde(alias = "LimitPrice")]
    Explicit,
    /// The contract's limit-up price.
    LimitUp,
    /// The contract's limit-down price.
    LimitDown,
    /// The contract's reference (previous settlement) price.
    Unchanged,
}

/// Price threshold as supplied by a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PriceThresholdSpec {
    /// Ignored unless `reference` is `Explicit`.
    #[serde(default)]
    pub price: Price,
    #[serde(default)]
    pub trend: Trend,
    #[serde(default)]
    pub reference: PriceReference,
}

impl PriceThresholdSpec {
    pub fn explicit(price: Price, trend: Trend) -> Self {
        Self {
            price,
            trend,
            reference: PriceReference::Explicit,
        }
    }

    pub fn limit_up(trend: Trend) -> Self {
        Self::symbolic(PriceReference::LimitUp, trend)
    }

    pub fn limit_down(trend: Trend) -> Self {
        Self::symbolic(PriceReference::LimitDown, trend)
    }

    pub fn unchanged(trend: Trend) -> Self {
        Self::symbolic(PriceReference::Unchanged, trend)
    }

    fn symbolic(reference: PriceReference, trend: Trend) -> Self {
        Self {
            price: Price::ZERO,
            trend,
            reference,
        }
    }
}

/// Volume threshold as supplied by a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuantityThresholdSpec {
    pub qty: Size,
    #[serde(default)]
    pub trend: Trend,
}

impl QuantityThresholdSpec {
    pub fn new(qty: impl Into<Size>, trend: Trend) -> Self {
        Self {
            qty: qty.into(),
            trend,
        }
    }
}

/// Direction and bound of a move away from the reference price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScopeKind {
    /// Risen by at least `scope`.
    UpAbove,
    /// Risen by at most `scope` (or fallen).
    UpBelow,
    /// Fallen by at least `scope`.
    DownAbove,
    /// Fallen by at most `scope` (or risen).
    DownBelow,
}

/// Scope (change) threshold as supplied by a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopeSpec {
    pub scope: Decimal,
    pub kind: ScopeKind,
}

impl ScopeSpec {
    pub fn new(scope: Decimal, kind: ScopeKind) -> Self {
        Self { scope, kind }
    }

    /// Signed threshold and trend this scope compiles to.
    pub fn to_threshold(&self) -> Threshold {
        let magnitude = self.scope.abs();
        match self.kind {
            ScopeKind::UpAbove => Threshold::new(magnitude, Trend::Up),
            ScopeKind::UpBelow => Threshold::new(magnitude, Trend::Down),
            ScopeKind::DownAbove => Threshold::new(-magnitude, Trend::Down),
            ScopeKind::DownBelow => Threshold::new(-magnitude, Trend::Up),
        }
    }
}

/// Declarative trigger on one contract.
///
/// Unset attributes are not part of the match. An empty spec is legal and
/// compiles to nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TriggerSpec {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub close: Option<PriceThresholdSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buy_price: Option<PriceThresholdSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sell_price: Option<PriceThresholdSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high: Option<PriceThresholdSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low: Option<PriceThresholdSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_price: Option<ScopeSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_rate: Option<ScopeSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<QuantityThresholdSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_volume: Option<QuantityThresholdSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ask_volume: Option<QuantityThresholdSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bid_volume: Option<QuantityThresholdSpec>,
}

impl TriggerSpec {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_price(mut self, attr: PriceAttribute, spec: PriceThresholdSpec) -> Self {
        let slot = match attr {
            PriceAttribute::Close => &mut self.close,
            PriceAttribute::BuyPrice => &mut self.buy_price,
            PriceAttribute::SellPrice => &mut self.sell_price,
            PriceAttribute::High => &mut self.high,
            PriceAttribute::Low => &mut self.low,
        };
        *slot = Some(spec);
        self
    }

    #[must_use]
    pub fn with_quantity(mut self, attr: QuantityAttribute, spec: QuantityThresholdSpec) -> Self {
        let slot = match attr {
            QuantityAttribute::Volume => &mut self.volume,
            QuantityAttribute::TotalVolume => &mut self.total_volume,
            QuantityAttribute::AskVolume => &mut self.ask_volume,
            QuantityAttribute::BidVolume => &mut self.bid_volume,
        };
        *slot = Some(spec);
        self
    }

    #[must_use]
    pub fn with_scope(mut self, attr: ScopeAttribute, spec: ScopeSpec) -> Self {
        let slot = match attr {
            ScopeAttribute::ChangePrice => &mut self.change_price,
            ScopeAttribute::ChangeRate => &mut self.change_rate,
        };
        *slot = Some(spec);
        self
    }

    /// Price thresholds that are set, in attribute order.
    pub fn price_specs(&self) -> impl Iterator<Item = (PriceAttribute, &PriceThresholdSpec)> {
        [
            (PriceAttribute::Close, &self.close),
            (PriceAttribute::BuyPrice, &self.buy_price),
            (PriceAttribute::SellPrice, &self.sell_price),
            (PriceAttribute::High, &self.high),
            (PriceAttribute::Low, &self.low),
        ]
        .into_iter()
        .filter_map(|(attr, spec)| spec.as_ref().map(|s| (attr, s)))
    }

    pub fn quantity_specs(
        &self,
    ) -> impl Iterator<Item = (QuantityAttribute, &QuantityThresholdSpec)> {
        [
            (QuantityAttribute::Volume, &self.volume),
            (QuantityAttribute::TotalVolume, &self.total_volume),
            (QuantityAttribute::AskVolume, &self.ask_volume),
            (QuantityAttribute::BidVolume, &self.bid_volume),
        ]
        .into_iter()
        .filter_map(|(attr, spec)| spec.as_ref().map(|s| (attr, s)))
    }

    pub fn scope_specs(&self) -> impl Iterator<Item = (ScopeAttribute, &ScopeSpec)> {
        [
            (ScopeAttribute::ChangePrice, &self.change_price),
            (ScopeAttribute::ChangeRate, &self.change_rate),
        ]
        .into_iter()
        .filter_map(|(attr, spec)| spec.as_ref().map(|s| (attr, s)))
    }

    /// True when no attribute is set.
    pub fn is_empty(&self) -> bool {
        self.price_specs().next().is_none()
            && self.quantity_specs().next().is_none()
            && self.scope_specs().next().is_none()
    }
}

// ============================================================================
// Resolved thresholds
// ============================================================================

/// A concrete, directly comparable threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Threshold {
    pub value: Decimal,
    pub trend: Trend,
}

impl Threshold {
    pub fn new(value: Decimal, trend: Trend) -> Self {
        Self { value, trend }
    }

    #[inline]
    pub fn is_touched(&self, live: Decimal) -> bool {
        self.trend.is_touched(self.value, live)
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.trend, self.value)
    }
}

/// Resolved thresholds keyed by attribute.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThresholdSet(BTreeMap<Attribute, Threshold>);

impl ThresholdSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, attr: impl Into<Attribute>, threshold: Threshold) {
        self.0.insert(attr.into(), threshold);
    }

    pub fn get(&self, attr: Attribute) -> Option<&Threshold> {
        self.0.get(&attr)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Attribute, &Threshold)> {
        self.0.iter().map(|(attr, t)| (*attr, t))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ============================================================================
// Bracket plan
// ============================================================================

/// Stop-loss / take-profit exit to arm once an entry order is filled.
///
/// Both sides are evaluated against `close`. The loss side is checked
/// first; whichever side fires consumes the whole bracket.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BracketPlan {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loss: Option<PriceThresholdSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profit: Option<PriceThresholdSpec>,
    pub loss_order: OrderSpec,
    pub profit_order: OrderSpec,
}

impl BracketPlan {
    /// True when neither side has a threshold.
    pub fn is_empty(&self) -> bool {
        self.loss.is_none() && self.profit.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_empty_spec() {
        assert!(TriggerSpec::new("TXFC0").is_empty());
    }

    #[test]
    fn test_builder_sets_fields() {
        let spec = TriggerSpec::new("TXFC0")
            .with_price(
                PriceAttribute::Close,
                PriceThresholdSpec::explicit(Price::new(dec!(11)), Trend::Up),
            )
            .with_quantity(
                QuantityAttribute::Volume,
                QuantityThresholdSpec::new(2u64, Trend::Up),
            );

        assert!(!spec.is_empty());
        assert_eq!(spec.price_specs().count(), 1);
        assert_eq!(spec.quantity_specs().count(), 1);
        assert_eq!(spec.scope_specs().count(), 0);
        assert!(spec.close.is_some());
        assert!(spec.volume.is_some());
    }

    #[test]
    fn test_scope_thresholds() {
        let up_above = ScopeSpec::new(dec!(3), ScopeKind::UpAbove).to_threshold();
        assert_eq!(up_above, Threshold::new(dec!(3), Trend::Up));

        let up_below = ScopeSpec::new(dec!(7), ScopeKind::UpBelow).to_threshold();
        assert_eq!(up_below, Threshold::new(dec!(7), Trend::Down));

        let down_above = ScopeSpec::new(dec!(3.5), ScopeKind::DownAbove).to_threshold();
        assert_eq!(down_above, Threshold::new(dec!(-3.5), Trend::Down));

        let down_below = ScopeSpec::new(dec!(3), ScopeKind::DownBelow).to_threshold();
        assert_eq!(down_below, Threshold::new(dec!(-3), Trend::Up));
    }

    #[test]
    fn test_down_above_scope_touch() {
        let threshold = ScopeSpec::new(dec!(3), ScopeKind::DownAbove).to_threshold();
        assert!(threshold.is_touched(dec!(-3.2)));
        assert!(!threshold.is_touched(dec!(-2.9)));
    }

    #[test]
    fn test_legacy_limit_price_alias() {
        let spec: PriceThresholdSpec =
            serde_json::from_str(r#"{"price": "11", "trend": "Up", "reference": "LimitPrice"}"#)
                .unwrap();
        assert_eq!(spec.reference, PriceReference::Explicit);
        assert_eq!(spec.price, Price::new(dec!(11)));
    }

    #[test]
    fn test_threshold_set_ordering() {
        let mut set = ThresholdSet::new();
        set.insert(QuantityAttribute::Volume, Threshold::new(dec!(5), Trend::Up));
        set.insert(PriceAttribute::Close, Threshold::new(dec!(100), Trend::Down));

        let attrs: Vec<Attribute> = set.iter().map(|(a, _)| a).collect();
        assert_eq!(attrs, vec![Attribute::Close, Attribute::Volume]);
    }
}
