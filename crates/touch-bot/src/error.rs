//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Engine error: {0}")]
    Engine(#[from] touch_engine::EngineError),

    #[error("Feed error: {0}")]
    Feed(#[from] touch_feed::FeedError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] touch_telemetry::TelemetryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
