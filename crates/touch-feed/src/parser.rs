//! Message parsing for the broker feed.
//!
//! Each line of the feed is a JSON envelope:
//! `{"channel": "tick" | "bidask" | "order", "data": {...}}`.
//! Tick and quote payloads use the broker's field names (`tick_type`,
//! `simtrade`, `price_chg`, ...); order payloads are [`OrderEvent`]s as-is.

use crate::error::{FeedError, FeedResult};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use touch_core::{BidAskEvent, OrderEvent, Price, Size, TickEvent, TickSide};
use tracing::debug;

/// Counters for parsed and skipped messages.
#[derive(Debug, Default)]
pub struct ParseStats {
    parsed: AtomicU64,
    skipped: AtomicU64,
}

impl ParseStats {
    fn record_parsed(&self) {
        self.parsed.fetch_add(1, Ordering::Relaxed);
    }

    fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn parsed(&self) -> u64 {
        self.parsed.load(Ordering::Relaxed)
    }

    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }
}

/// Feed envelope.
#[derive(Debug, Deserialize)]
struct RawEnvelope {
    channel: String,
    data: serde_json::Value,
}

/// Raw tick payload.
#[derive(Debug, Deserialize)]
pub struct RawTick {
    pub code: String,
    pub close: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub volume: Decimal,
    pub total_volume: Decimal,
    /// 1 = traded at ask, 2 = traded at bid, anything else = unknown.
    #[serde(default)]
    pub tick_type: i32,
    #[serde(default)]
    pub price_chg: Option<Decimal>,
    #[serde(default)]
    pub pct_chg: Option<Decimal>,
    /// Boolean or 0/1 depending on the feed version.
    #[serde(default)]
    pub simtrade: serde_json::Value,
}

/// Raw quote payload.
#[derive(Debug, Deserialize)]
pub struct RawBidAsk {
    pub code: String,
    pub bid_price: Vec<Decimal>,
    pub bid_volume: Vec<Decimal>,
    pub ask_price: Vec<Decimal>,
    pub ask_volume: Vec<Decimal>,
    #[serde(default)]
    pub simtrade: serde_json::Value,
}

/// Parsed feed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedMessage {
    Tick(TickEvent),
    BidAsk(BidAskEvent),
    Order(OrderEvent),
}

impl FeedMessage {
    pub fn code(&self) -> &str {
        match self {
            Self::Tick(t) => &t.code,
            Self::BidAsk(q) => &q.code,
            Self::Order(o) => &o.code,
        }
    }
}

/// Feed line parser.
#[derive(Debug, Default)]
pub struct MessageParser {
    stats: ParseStats,
}

impl MessageParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> &ParseStats {
        &self.stats
    }

    /// Parse one feed line.
    ///
    /// Blank lines and unknown channels yield `Ok(None)`.
    pub fn parse_line(&self, line: &str) -> FeedResult<Option<FeedMessage>> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let envelope: RawEnvelope = serde_json::from_str(line)?;
        let message = match envelope.channel.as_str() {
            "tick" => FeedMessage::Tick(self.parse_tick(envelope.data)?),
            "bidask" => FeedMessage::BidAsk(self.parse_bidask(envelope.data)?),
            "order" => FeedMessage::Order(
                serde_json::from_value(envelope.data)
                    .map_err(|e| FeedError::ParseError(format!("Invalid order event: {e}")))?,
            ),
            other => {
                self.stats.record_skipped();
                debug!(channel = %other, "Unknown channel, ignoring");
                return Ok(None);
            }
        };

        self.stats.record_parsed();
        Ok(Some(message))
    }

    fn parse_tick(&self, data: serde_json::Value) -> FeedResult<TickEvent> {
        let raw: RawTick = serde_json::from_value(data)
            .map_err(|e| FeedError::ParseError(format!("Invalid tick: {e}")))?;

        let side = match raw.tick_type {
            1 => TickSide::Ask,
            2 => TickSide::Bid,
            _ => TickSide::Unknown,
        };

        Ok(TickEvent {
            code: raw.code,
            close: Price::new(raw.close),
            high: Price::new(raw.high),
            low: Price::new(raw.low),
            volume: Size::new(raw.volume),
            total_volume: Size::new(raw.total_volume),
            side,
            change_price: raw.price_chg.map(Price::new),
            change_rate: raw.pct_chg,
            simulated: is_flag_set(&raw.simtrade),
        })
    }

    fn parse_bidask(&self, data: serde_json::Value) -> FeedResult<BidAskEvent> {
        let raw: RawBidAsk = serde_json::from_value(data)
            .map_err(|e| FeedError::ParseError(format!("Invalid bidask: {e}")))?;

        if raw.bid_price.len() != raw.bid_volume.len() || raw.ask_price.len() != raw.ask_volume.len()
        {
            return Err(FeedError::InvalidData(format!(
                "{}: price/volume level count mismatch",
                raw.code
            )));
        }

        Ok(BidAskEvent {
            simulated: is_flag_set(&raw.simtrade),
            code: raw.code,
            bid_price: raw.bid_price.into_iter().map(Price::new).collect(),
            bid_volume: raw.bid_volume.into_iter().map(Size::new).collect(),
            ask_price: raw.ask_price.into_iter().map(Price::new).collect(),
            ask_volume: raw.ask_volume.into_iter().map(Size::new).collect(),
        })
    }
}

fn is_flag_set(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => n.as_i64().is_some_and(|v| v != 0),
        _ => false,
    }
}
