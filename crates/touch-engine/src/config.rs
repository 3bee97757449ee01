//! Engine configuration.

use serde::{Deserialize, Serialize};

/// When a prepared bracket starts being monitored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArmPolicy {
    /// Acknowledgment prepares the bracket; the fill arms it.
    #[default]
    OnFill,
    /// Acknowledgment prepares and arms the bracket at once.
    OnAcknowledge,
}

/// Engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Bracket arming policy. Default: on fill.
    #[serde(default)]
    pub arm_policy: ArmPolicy,
    /// Event bus buffer before slow receivers lag. Default: 1024.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
    /// Subscribe the quote channel alongside ticks. Default: true.
    #[serde(default = "default_subscribe_quotes")]
    pub subscribe_quotes: bool,
}

fn default_event_capacity() -> usize {
    1024
}

fn default_subscribe_quotes() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            arm_policy: ArmPolicy::default(),
            event_capacity: default_event_capacity(),
            subscribe_quotes: default_subscribe_quotes(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_json() {
        let config: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.arm_policy, ArmPolicy::OnFill);
        assert_eq!(config.event_capacity, 1024);
        assert!(config.subscribe_quotes);
    }

    #[test]
    fn test_arm_policy_wire_name() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"arm_policy": "on_acknowledge"}"#).unwrap();
        assert_eq!(config.arm_policy, ArmPolicy::OnAcknowledge);
    }
}
