//! Application configuration.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use touch_core::{BracketPlan, ContractMeta, OrderSpec, Snapshot, TriggerSpec};
use touch_engine::EngineConfig;

use crate::error::{AppError, AppResult};

/// Paper broker behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperConfig {
    /// Emit an acknowledgment for every accepted order. Default: true.
    #[serde(default = "default_true")]
    pub auto_ack: bool,
    /// Emit a fill for every accepted order. Default: true.
    #[serde(default = "default_true")]
    pub auto_fill: bool,
}

fn default_true() -> bool {
    true
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            auto_ack: true,
            auto_fill: true,
        }
    }
}

/// A condition registered at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionConfig {
    pub trigger: TriggerSpec,
    pub order: OrderSpec,
    /// Exit armed once `order` fills.
    #[serde(default)]
    pub bracket: Option<BracketPlan>,
}

/// An entry placed at startup with its exit bracket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BracketEntryConfig {
    pub code: String,
    pub entry: OrderSpec,
    pub plan: BracketPlan,
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,

    /// JSON-lines feed to replay.
    #[serde(default = "default_feed_path")]
    pub feed_path: String,

    /// Log the Prometheus text dump after the replay.
    #[serde(default)]
    pub print_metrics: bool,

    #[serde(default)]
    pub paper: PaperConfig,

    /// Instrument catalog served by the paper broker.
    #[serde(default)]
    pub contracts: Vec<ContractMeta>,

    /// Snapshot seed per contract code.
    #[serde(default)]
    pub snapshots: HashMap<String, Snapshot>,

    #[serde(default)]
    pub conditions: Vec<ConditionConfig>,

    #[serde(default)]
    pub brackets: Vec<BracketEntryConfig>,
}

fn default_feed_path() -> String {
    "config/sample_feed.jsonl".to_string()
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> AppResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Every referenced code must be in the catalog.
    fn validate(&self) -> AppResult<()> {
        let known = |code: &str| self.contracts.iter().any(|c| c.code == code);

        let referenced = self
            .conditions
            .iter()
            .map(|c| c.trigger.code.as_str())
            .chain(self.brackets.iter().map(|b| b.code.as_str()));
        for code in referenced {
            if !known(code) {
                return Err(AppError::Config(format!(
                    "Code {code} is not in [[contracts]]"
                )));
            }
        }
        Ok(())
    }
}
