//! Prometheus metrics for the trigger engine.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()`. A registration failure means a
//! duplicate metric name, which is a startup bug; it can only happen
//! during lazy static initialization.

use crate::error::{TelemetryError, TelemetryResult};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_int_gauge_vec, CounterVec, Encoder, IntGaugeVec, TextEncoder,
};

/// Conditions registered, by contract code.
pub static CONDITIONS_REGISTERED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "touch_conditions_registered_total",
        "Total trigger conditions registered",
        &["code"]
    )
    .unwrap()
});

/// Conditions removed before firing, by contract code.
pub static CONDITIONS_REMOVED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "touch_conditions_removed_total",
        "Total trigger conditions removed before firing",
        &["code"]
    )
    .unwrap()
});

/// Conditions that fired, by code and kind (touch/loss/profit/entry).
pub static TRIGGERS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "touch_triggers_total",
        "Total conditions fired",
        &["code", "kind"]
    )
    .unwrap()
});

/// Order submissions rejected by the broker.
pub static SUBMIT_FAILED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "touch_submit_failed_total",
        "Total order submissions rejected by the broker",
        &["code"]
    )
    .unwrap()
});

/// Feed events dropped without touching state.
pub static FEED_IGNORED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "touch_feed_ignored_total",
        "Total feed events ignored",
        &["channel", "reason"]
    )
    .unwrap()
});

/// Brackets admitted for monitoring.
pub static BRACKETS_ARMED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "touch_brackets_armed_total",
        "Total bracket conditions armed",
        &["code"]
    )
    .unwrap()
});

/// Unexecuted conditions currently stored.
pub static LIVE_CONDITIONS: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "touch_live_conditions",
        "Unexecuted conditions currently stored",
        &["code"]
    )
    .unwrap()
});

/// Metrics facade.
pub struct Metrics;

impl Metrics {
    pub fn condition_registered(code: &str) {
        CONDITIONS_REGISTERED_TOTAL.with_label_values(&[code]).inc();
    }

    pub fn condition_removed(code: &str) {
        CONDITIONS_REMOVED_TOTAL.with_label_values(&[code]).inc();
    }

    pub fn trigger_fired(code: &str, kind: &str) {
        TRIGGERS_TOTAL.with_label_values(&[code, kind]).inc();
    }

    pub fn submit_failed(code: &str) {
        SUBMIT_FAILED_TOTAL.with_label_values(&[code]).inc();
    }

    pub fn feed_ignored(channel: &str, reason: &str) {
        FEED_IGNORED_TOTAL
            .with_label_values(&[channel, reason])
            .inc();
    }

    pub fn bracket_armed(code: &str) {
        BRACKETS_ARMED_TOTAL.with_label_values(&[code]).inc();
    }

    pub fn live_conditions(code: &str, count: usize) {
        LIVE_CONDITIONS
            .with_label_values(&[code])
            .set(count as i64);
    }

    /// Render all registered metrics in the Prometheus text format.
    pub fn render() -> TelemetryResult<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&prometheus::gather(), &mut buffer)
            .map_err(|e| TelemetryError::Metrics(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| TelemetryError::Metrics(e.to_string()))
    }
}
