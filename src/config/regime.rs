//! Declarative regime-classification configuration.
//!
//! Rule blocks stay as raw JSON here; the regime engine compiles them into
//! structured conditions at load. Keeping the blocks opaque lets operators
//! add regimes without touching code.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::ConfigError;

/// Regime classifier configuration, loaded once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegimeSettings {
    /// Returned when no regime's condition block passes.
    #[serde(default = "default_regime_label")]
    pub default_regime: String,
    /// Regimes are evaluated in this order; the first match wins.
    #[serde(default)]
    pub regime_evaluation_order: Vec<String>,
    /// Regime name to raw condition block. Blocks are arbitrary JSON objects
    /// compiled by the rule parser.
    #[serde(default)]
    pub regime_rules: BTreeMap<String, Value>,
}

impl Default for RegimeSettings {
    fn default() -> Self {
        Self {
            default_regime: default_regime_label(),
            regime_evaluation_order: Vec::new(),
            regime_rules: BTreeMap::new(),
        }
    }
}

impl RegimeSettings {
    /// Parse settings from a JSON document.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(raw).map_err(|err| ConfigError::json(&err))
    }
}

fn default_regime_label() -> String {
    "REGIME_UNCLEAR_OR_TRANSITIONING".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_settings() {
        let raw = r#"{
            "default_regime": "REGIME_NEUTRAL",
            "regime_evaluation_order": ["REGIME_A", "REGIME_B"],
            "regime_rules": {
                "REGIME_A": {"gib_oi_based_und_lt": "-50e9"},
                "REGIME_B": {"_any_of": [{"price_gt": 100}]}
            }
        }"#;
        let settings = RegimeSettings::from_json_str(raw).unwrap();
        assert_eq!(settings.default_regime, "REGIME_NEUTRAL");
        assert_eq!(settings.regime_evaluation_order.len(), 2);
        assert!(settings.regime_rules.contains_key("REGIME_A"));
    }

    #[test]
    fn empty_document_gets_defaults() {
        let settings = RegimeSettings::from_json_str("{}").unwrap();
        assert_eq!(settings.default_regime, "REGIME_UNCLEAR_OR_TRANSITIONING");
        assert!(settings.regime_evaluation_order.is_empty());
        assert!(settings.regime_rules.is_empty());
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        assert!(RegimeSettings::from_json_str("{not json").is_err());
    }
}
