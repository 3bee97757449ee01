//! Per-contract market state.
//!
//! A contract gets a [`MarketState`] the first time a condition is
//! registered on it, seeded from exactly one snapshot query. After that,
//! only tick and quote events move it.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, trace};
use touch_core::{
    Attribute, BidAskEvent, ContractMeta, Price, Size, Snapshot, TickEvent, TickSide,
};

/// Latest known state of one contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarketState {
    pub code: String,
    pub close: Price,
    pub buy_price: Price,
    pub sell_price: Price,
    pub high: Price,
    pub low: Price,
    pub change_price: Price,
    pub change_rate: Decimal,
    pub volume: Size,
    pub total_volume: Size,
    /// Volume traded at the ask since the last bid-side trade.
    pub ask_volume: Size,
    /// Volume traded at the bid since the last ask-side trade.
    pub bid_volume: Size,
    /// Reference price used to derive change fields.
    pub reference: Price,
    pub created_at: DateTime<Utc>,
    pub last_update: DateTime<Utc>,
}

impl MarketState {
    /// Build the initial state from a snapshot.
    pub fn from_snapshot(contract: &ContractMeta, snapshot: &Snapshot) -> Self {
        let now = Utc::now();
        Self {
            code: contract.code.clone(),
            close: snapshot.close,
            buy_price: snapshot.buy_price,
            sell_price: snapshot.sell_price,
            high: snapshot.high,
            low: snapshot.low,
            change_price: snapshot.change_price,
            change_rate: snapshot.change_rate,
            volume: snapshot.volume,
            total_volume: snapshot.total_volume,
            ask_volume: Size::ZERO,
            bid_volume: Size::ZERO,
            reference: contract.reference,
            created_at: now,
            last_update: now,
        }
    }

    /// Live value of an attribute, for threshold comparison.
    pub fn value_of(&self, attr: Attribute) -> Decimal {
        match attr {
            Attribute::Close => self.close.inner(),
            Attribute::BuyPrice => self.buy_price.inner(),
            Attribute::SellPrice => self.sell_price.inner(),
            Attribute::High => self.high.inner(),
            Attribute::Low => self.low.inner(),
            Attribute::ChangePrice => self.change_price.inner(),
            Attribute::ChangeRate => self.change_rate,
            Attribute::Volume => self.volume.inner(),
            Attribute::TotalVolume => self.total_volume.inner(),
            Attribute::AskVolume => self.ask_volume.inner(),
            Attribute::BidVolume => self.bid_volume.inner(),
        }
    }

    fn apply_tick(&mut self, tick: &TickEvent) {
        self.close = tick.close;
        self.high = tick.high;
        self.low = tick.low;
        self.volume = tick.volume;
        self.total_volume = tick.total_volume;

        self.change_price = tick.change_price.unwrap_or(tick.close - self.reference);
        self.change_rate = tick
            .change_rate
            .or_else(|| tick.close.pct_from(self.reference))
            .unwrap_or(Decimal::ZERO);

        // Directional volume counts since the opposite side last traded.
        match tick.side {
            TickSide::Ask => {
                self.ask_volume = self.ask_volume + tick.volume;
                self.bid_volume = Size::ZERO;
            }
            TickSide::Bid => {
                self.bid_volume = self.bid_volume + tick.volume;
                self.ask_volume = Size::ZERO;
            }
            TickSide::Unknown => {}
        }

        self.last_update = Utc::now();
    }

    fn apply_bidask(&mut self, bid: Price, ask: Price) {
        self.buy_price = bid;
        self.sell_price = ask;
        self.last_update = Utc::now();
    }
}

/// What happened to an inbound event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// State updated; conditions should be evaluated.
    Applied,
    /// Exchange simulation message, dropped.
    Simulated,
    /// No state for this code, nobody is watching it.
    Unwatched,
    /// Quote with an empty best level, dropped.
    EmptyBook,
}

impl IngestOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }

    /// Label for metrics and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::Simulated => "simulated",
            Self::Unwatched => "unwatched",
            Self::EmptyBook => "empty_book",
        }
    }
}

type StateEntry = Arc<RwLock<MarketState>>;

/// Market state per contract code.
pub struct MarketStateCache {
    markets: DashMap<String, StateEntry>,
}

impl MarketStateCache {
    pub fn new() -> Self {
        Self {
            markets: DashMap::new(),
        }
    }

    /// Seed state for `contract` unless it already exists.
    ///
    /// `fetch` runs at most once per code for the lifetime of the cache.
    /// Returns `Ok(true)` when this call created the entry.
    ///
    /// `fetch` runs while the code's shard is write-locked, so ticks for
    /// other codes in the same shard wait for it. This is what keeps
    /// seeding at most once when registrations race.
    pub fn ensure_seeded<F, E>(&self, contract: &ContractMeta, fetch: F) -> Result<bool, E>
    where
        F: FnOnce(&ContractMeta) -> Result<Snapshot, E>,
    {
        match self.markets.entry(contract.code.clone()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(vacant) => {
                let snapshot = fetch(contract)?;
                let state = MarketState::from_snapshot(contract, &snapshot);
                debug!(
                    code = %contract.code,
                    close = %state.close,
                    total_volume = %state.total_volume,
                    "Market state seeded from snapshot"
                );
                vacant.insert(Arc::new(RwLock::new(state)));
                Ok(true)
            }
        }
    }

    /// Copy of the current state for `code`.
    pub fn get(&self, code: &str) -> Option<MarketState> {
        self.markets.get(code).map(|entry| entry.read().clone())
    }

    pub fn contains(&self, code: &str) -> bool {
        self.markets.contains_key(code)
    }

    /// Apply a trade tick.
    pub fn apply_tick(&self, tick: &TickEvent) -> IngestOutcome {
        if tick.simulated {
            trace!(code = %tick.code, "Simulated tick ignored");
            return IngestOutcome::Simulated;
        }
        let Some(entry) = self.entry(&tick.code) else {
            return IngestOutcome::Unwatched;
        };
        entry.write().apply_tick(tick);
        IngestOutcome::Applied
    }

    /// Apply a quote update.
    pub fn apply_bidask(&self, quote: &BidAskEvent) -> IngestOutcome {
        if quote.simulated {
            trace!(code = %quote.code, "Simulated quote ignored");
            return IngestOutcome::Simulated;
        }
        let Some(entry) = self.entry(&quote.code) else {
            return IngestOutcome::Unwatched;
        };
        if quote.has_empty_level() {
            debug!(code = %quote.code, "Quote with empty level ignored");
            return IngestOutcome::EmptyBook;
        }
        let (Some(bid), Some(ask)) = (quote.best_bid(), quote.best_ask()) else {
            debug!(code = %quote.code, "Quote without best level ignored");
            return IngestOutcome::EmptyBook;
        };
        entry.write().apply_bidask(bid, ask);
        IngestOutcome::Applied
    }

    /// All watched codes.
    pub fn codes(&self) -> Vec<String> {
        self.markets.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.markets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markets.is_empty()
    }

    fn entry(&self, code: &str) -> Option<StateEntry> {
        self.markets.get(code).map(|entry| entry.value().clone())
    }
}

impl Default for MarketStateCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::cell::Cell;
    use std::convert::Infallible;

    fn contract() -> ContractMeta {
        ContractMeta::new(
            "TXFC0",
            Price::new(dec!(10805)),
            Price::new(dec!(8841)),
            Price::new(dec!(9823)),
        )
    }

    fn snapshot() -> Snapshot {
        Snapshot {
            close: Price::new(dec!(9900)),
            buy_price: Price::new(dec!(9899)),
            sell_price: Price::new(dec!(9900)),
            high: Price::new(dec!(9950)),
            low: Price::new(dec!(9850)),
            total_volume: Size::from(1200),
            ..Snapshot::default()
        }
    }

    fn seeded() -> MarketStateCache {
        let cache = MarketStateCache::new();
        cache
            .ensure_seeded(&contract(), |_| Ok::<_, Infallible>(snapshot()))
            .unwrap();
        cache
    }

    fn tick(close: Decimal, volume: u64, side: TickSide) -> TickEvent {
        TickEvent {
            code: "TXFC0".to_string(),
            close: Price::new(close),
            high: Price::new(dec!(9990)),
            low: Price::new(dec!(9850)),
            volume: Size::from(volume),
            total_volume: Size::from(1300),
            side,
            change_price: None,
            change_rate: None,
            simulated: false,
        }
    }

    fn quote(ask_volume: Vec<Size>) -> BidAskEvent {
        BidAskEvent {
            code: "TXFC0".to_string(),
            bid_price: vec![Price::new(dec!(9984))],
            bid_volume: vec![Size::from(4)],
            ask_price: vec![Price::new(dec!(9985))],
            ask_volume,
            simulated: false,
        }
    }

    #[test]
    fn test_seed_runs_fetch_once() {
        let cache = MarketStateCache::new();
        let calls = Cell::new(0);
        for _ in 0..3 {
            cache
                .ensure_seeded(&contract(), |_| {
                    calls.set(calls.get() + 1);
                    Ok::<_, Infallible>(snapshot())
                })
                .unwrap();
        }
        assert_eq!(calls.get(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_seed_failure_leaves_no_entry() {
        let cache = MarketStateCache::new();
        let result = cache.ensure_seeded(&contract(), |_| Err("snapshot down"));
        assert!(result.is_err());
        assert!(!cache.contains("TXFC0"));
    }

    #[test]
    fn test_seed_copies_snapshot_fields() {
        let state = seeded().get("TXFC0").unwrap();
        assert_eq!(state.close, Price::new(dec!(9900)));
        assert_eq!(state.total_volume, Size::from(1200));
        assert_eq!(state.reference, Price::new(dec!(9823)));
        assert_eq!(state.ask_volume, Size::ZERO);
    }

    #[test]
    fn test_tick_updates_prices_and_change() {
        let cache = seeded();
        let outcome = cache.apply_tick(&tick(dec!(10805.3), 2, TickSide::Unknown));
        assert_eq!(outcome, IngestOutcome::Applied);

        let state = cache.get("TXFC0").unwrap();
        assert_eq!(state.close, Price::new(dec!(10805.3)));
        assert_eq!(state.volume, Size::from(2));
        assert_eq!(state.total_volume, Size::from(1300));
        assert_eq!(state.change_price, Price::new(dec!(982.3)));
        assert_eq!(state.change_rate, dec!(10));
    }

    #[test]
    fn test_tick_reported_change_wins() {
        let cache = seeded();
        let mut t = tick(dec!(9900), 1, TickSide::Unknown);
        t.change_price = Some(Price::new(dec!(77)));
        t.change_rate = Some(dec!(0.78));
        cache.apply_tick(&t);

        let state = cache.get("TXFC0").unwrap();
        assert_eq!(state.change_price, Price::new(dec!(77)));
        assert_eq!(state.change_rate, dec!(0.78));
    }

    #[test]
    fn test_directional_volume_resets_on_side_flip() {
        let cache = seeded();

        cache.apply_tick(&tick(dec!(9900), 2, TickSide::Ask));
        cache.apply_tick(&tick(dec!(9901), 3, TickSide::Ask));
        let state = cache.get("TXFC0").unwrap();
        assert_eq!(state.ask_volume, Size::from(5));
        assert_eq!(state.bid_volume, Size::ZERO);

        cache.apply_tick(&tick(dec!(9899), 4, TickSide::Bid));
        let state = cache.get("TXFC0").unwrap();
        assert_eq!(state.ask_volume, Size::ZERO);
        assert_eq!(state.bid_volume, Size::from(4));

        cache.apply_tick(&tick(dec!(9898), 1, TickSide::Bid));
        let state = cache.get("TXFC0").unwrap();
        assert_eq!(state.bid_volume, Size::from(5));
    }

    #[test]
    fn test_simulated_tick_ignored() {
        let cache = seeded();
        let mut t = tick(dec!(1), 99, TickSide::Ask);
        t.simulated = true;

        assert_eq!(cache.apply_tick(&t), IngestOutcome::Simulated);
        let state = cache.get("TXFC0").unwrap();
        assert_eq!(state.close, Price::new(dec!(9900)));
        assert_eq!(state.ask_volume, Size::ZERO);
    }

    #[test]
    fn test_unwatched_code_ignored() {
        let cache = seeded();
        let mut t = tick(dec!(100), 1, TickSide::Ask);
        t.code = "TXFD0".to_string();

        assert_eq!(cache.apply_tick(&t), IngestOutcome::Unwatched);
        assert!(!cache.contains("TXFD0"));
    }

    #[test]
    fn test_quote_updates_best_prices() {
        let cache = seeded();
        assert_eq!(
            cache.apply_bidask(&quote(vec![Size::from(2)])),
            IngestOutcome::Applied
        );

        let state = cache.get("TXFC0").unwrap();
        assert_eq!(state.buy_price, Price::new(dec!(9984)));
        assert_eq!(state.sell_price, Price::new(dec!(9985)));
    }

    #[test]
    fn test_quote_with_zero_ask_volume_ignored() {
        let cache = seeded();
        assert_eq!(
            cache.apply_bidask(&quote(vec![Size::ZERO])),
            IngestOutcome::EmptyBook
        );

        let state = cache.get("TXFC0").unwrap();
        assert_eq!(state.buy_price, Price::new(dec!(9899)));
        assert_eq!(state.sell_price, Price::new(dec!(9900)));
    }

    #[test]
    fn test_value_of_maps_attributes() {
        let state = seeded().get("TXFC0").unwrap();
        assert_eq!(state.value_of(Attribute::Close), dec!(9900));
        assert_eq!(state.value_of(Attribute::High), dec!(9950));
        assert_eq!(state.value_of(Attribute::TotalVolume), dec!(1200));
        assert_eq!(state.value_of(Attribute::BidVolume), Decimal::ZERO);
    }
}
