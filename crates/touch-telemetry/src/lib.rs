//! Prometheus metrics and structured logging for the touch-price engine.
//!
//! - Prometheus counters for registrations, triggers, ignored feed events
//!   and bracket arming
//! - Structured logging with tracing (JSON in production)

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{init_logging, init_logging_with, LogFormat};
pub use metrics::Metrics;
