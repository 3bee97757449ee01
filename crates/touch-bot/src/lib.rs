//! Touch-price trigger bot.
//!
//! Host application around the trigger engine:
//! - TOML configuration of contracts, snapshots and startup conditions
//! - In-process paper broker
//! - JSON-lines feed replay

pub mod app;
pub mod config;
pub mod error;
pub mod paper;

pub use app::{Application, ReplayStats};
pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use paper::PaperBroker;
