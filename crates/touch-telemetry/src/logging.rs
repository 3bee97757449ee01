//! Structured logging initialization.

use crate::error::{TelemetryError, TelemetryResult};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "info,touch=debug";

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per event, with span context.
    Json,
    /// Human-readable multi-line output.
    Pretty,
}

impl LogFormat {
    /// Format for a `RUST_ENV` value: JSON in production only.
    pub fn for_env(rust_env: Option<&str>) -> Self {
        match rust_env {
            Some("production") => Self::Json,
            _ => Self::Pretty,
        }
    }
}

/// Install the global subscriber, with the format chosen by `RUST_ENV`.
/// `RUST_LOG` overrides the default filter.
pub fn init_logging() -> TelemetryResult<()> {
    let format = LogFormat::for_env(std::env::var("RUST_ENV").ok().as_deref());
    init_logging_with(format)
}

pub fn init_logging_with(format: LogFormat) -> TelemetryResult<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(true))
            .try_init(),
        LogFormat::Pretty => registry.with(fmt::layer().pretty()).try_init(),
    };
    installed.map_err(|e| TelemetryError::LoggingInit(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_only_in_production() {
        assert_eq!(LogFormat::for_env(Some("production")), LogFormat::Json);
        assert_eq!(LogFormat::for_env(Some("staging")), LogFormat::Pretty);
        assert_eq!(LogFormat::for_env(None), LogFormat::Pretty);
    }

    #[test]
    fn test_second_init_is_an_error() {
        // Whichever call installs first, a second global subscriber is refused.
        let _ = init_logging_with(LogFormat::Pretty);
        assert!(matches!(
            init_logging_with(LogFormat::Json),
            Err(TelemetryError::LoggingInit(_))
        ));
    }
}
