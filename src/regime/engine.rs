//! Regime engine: compiled rule blocks plus the classification walk.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::config::RegimeSettings;

use super::condition::Condition;
use super::EvalContext;

/// Compiled regime classifier. Built once from [`RegimeSettings`]; cheap to
/// query every cycle.
pub struct RegimeEngine {
    default_regime: String,
    evaluation_order: Vec<String>,
    rules: BTreeMap<String, Condition>,
}

impl RegimeEngine {
    pub fn new(settings: &RegimeSettings) -> Self {
        let mut rules = BTreeMap::new();
        for (name, block) in &settings.regime_rules {
            match block.as_object() {
                Some(obj) if !obj.is_empty() => {
                    rules.insert(name.clone(), Condition::compile(obj));
                }
                Some(_) => {
                    warn!(regime = %name, "empty rule block, regime can never match");
                }
                None => {
                    warn!(regime = %name, "rule block is not an object, regime can never match");
                }
            }
        }
        for name in &settings.regime_evaluation_order {
            if !rules.contains_key(name) {
                warn!(regime = %name, "no usable rule block for ordered regime");
            }
        }
        info!(
            regimes = rules.len(),
            ordered = settings.regime_evaluation_order.len(),
            default = %settings.default_regime,
            "regime engine loaded"
        );
        RegimeEngine {
            default_regime: settings.default_regime.clone(),
            evaluation_order: settings.regime_evaluation_order.clone(),
            rules,
        }
    }

    pub fn default_regime(&self) -> &str {
        &self.default_regime
    }

    /// First regime in the evaluation order whose condition passes, or the
    /// default. Never errors; unresolvable conditions simply fail to match.
    pub fn classify(&self, ctx: &EvalContext<'_>) -> String {
        for name in &self.evaluation_order {
            let Some(condition) = self.rules.get(name) else {
                continue;
            };
            if condition.evaluate(ctx) {
                info!(symbol = %ctx.underlying.symbol, regime = %name, "regime matched");
                return name.clone();
            }
        }
        debug!(
            symbol = %ctx.underlying.symbol,
            default = %self.default_regime,
            "no regime matched"
        );
        self.default_regime.clone()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::chain::StrikeTable;
    use crate::regime::ContextValue;
    use crate::types::{UnderlyingMetrics, UnderlyingSnapshot};

    use super::*;

    fn settings(raw: serde_json::Value) -> RegimeSettings {
        serde_json::from_value(raw).unwrap()
    }

    fn underlying() -> UnderlyingMetrics {
        let snap = UnderlyingSnapshot {
            symbol: "SPY".to_string(),
            price: 100.0,
            day_open_price: None,
            prev_day_close_price: None,
            implied_volatility: 0.2,
            deltas_buy: 0.0,
            deltas_sell: 0.0,
            gammas_call_buy: 0.0,
            gammas_put_buy: 0.0,
            gammas_call_sell: 0.0,
            gammas_put_sell: 0.0,
            vegas_buy: 0.0,
            vegas_sell: 0.0,
            thetas_buy: 0.0,
            thetas_sell: 0.0,
            call_gxoi: 0.0,
            put_gxoi: 0.0,
            prior_regime: None,
        };
        UnderlyingMetrics::from_snapshot(&snap)
    }

    struct Ctx {
        underlying: UnderlyingMetrics,
        strikes: StrikeTable,
        flags: BTreeMap<String, ContextValue>,
        thresholds: BTreeMap<String, f64>,
    }

    impl Ctx {
        fn new(underlying: UnderlyingMetrics) -> Self {
            Ctx {
                underlying,
                strikes: StrikeTable::default(),
                flags: BTreeMap::new(),
                thresholds: BTreeMap::new(),
            }
        }

        fn eval(&self) -> EvalContext<'_> {
            EvalContext {
                underlying: &self.underlying,
                strikes: &self.strikes,
                context_flags: &self.flags,
                dynamic_thresholds: &self.thresholds,
            }
        }
    }

    #[test]
    fn first_matching_regime_in_order_wins() {
        let engine = RegimeEngine::new(&settings(json!({
            "default_regime": "REGIME_UNCLEAR",
            "regime_evaluation_order": ["REGIME_A", "REGIME_B"],
            "regime_rules": {
                "REGIME_A": { "vapi_fa_z_score_und_gt": 1.0 },
                "REGIME_B": { "vapi_fa_z_score_und_gt": 0.5 },
            }
        })));

        let mut ctx = Ctx::new(underlying());
        ctx.underlying.vapi_fa_z_score_und = 2.0;
        // Both match; order breaks the tie.
        assert_eq!(engine.classify(&ctx.eval()), "REGIME_A");

        ctx.underlying.vapi_fa_z_score_und = 0.7;
        assert_eq!(engine.classify(&ctx.eval()), "REGIME_B");
    }

    #[test]
    fn no_match_returns_the_default() {
        let engine = RegimeEngine::new(&settings(json!({
            "default_regime": "REGIME_UNCLEAR",
            "regime_evaluation_order": ["REGIME_A"],
            "regime_rules": {
                "REGIME_A": { "vapi_fa_z_score_und_gt": 1.0 },
            }
        })));
        let ctx = Ctx::new(underlying());
        assert_eq!(engine.classify(&ctx.eval()), "REGIME_UNCLEAR");
    }

    #[test]
    fn empty_and_missing_blocks_can_never_match() {
        let engine = RegimeEngine::new(&settings(json!({
            "default_regime": "REGIME_UNCLEAR",
            "regime_evaluation_order": ["REGIME_EMPTY", "REGIME_MISSING", "REGIME_SCALAR"],
            "regime_rules": {
                "REGIME_EMPTY": {},
                "REGIME_SCALAR": 42,
            }
        })));
        let mut ctx = Ctx::new(underlying());
        ctx.underlying.vapi_fa_z_score_und = 99.0;
        assert_eq!(engine.classify(&ctx.eval()), "REGIME_UNCLEAR");
    }

    #[test]
    fn classification_is_deterministic() {
        let engine = RegimeEngine::new(&settings(json!({
            "default_regime": "REGIME_UNCLEAR",
            "regime_evaluation_order": ["REGIME_A"],
            "regime_rules": {
                "REGIME_A": {
                    "_any_of": [
                        { "gib_oi_based_und_lt": "-50e9" },
                        { "vapi_fa_z_score_und_abs_gt": 2.0 },
                    ]
                },
            }
        })));
        let mut ctx = Ctx::new(underlying());
        ctx.underlying.gib_oi_based_und = -60e9;
        let first = engine.classify(&ctx.eval());
        let second = engine.classify(&ctx.eval());
        assert_eq!(first, "REGIME_A");
        assert_eq!(first, second);
    }

    #[test]
    fn rules_not_in_the_order_are_ignored() {
        let engine = RegimeEngine::new(&settings(json!({
            "default_regime": "REGIME_UNCLEAR",
            "regime_evaluation_order": ["REGIME_A"],
            "regime_rules": {
                "REGIME_A": { "vapi_fa_z_score_und_gt": 5.0 },
                "REGIME_UNLISTED": { "vapi_fa_z_score_und_gt": 0.0 },
            }
        })));
        let mut ctx = Ctx::new(underlying());
        ctx.underlying.vapi_fa_z_score_und = 1.0;
        // REGIME_UNLISTED would pass but is not in the evaluation order.
        assert_eq!(engine.classify(&ctx.eval()), "REGIME_UNCLEAR");
    }

    #[test]
    fn default_regime_accessor_reports_the_configured_label() {
        let engine = RegimeEngine::new(&settings(json!({
            "default_regime": "REGIME_CUSTOM_DEFAULT",
            "regime_evaluation_order": [],
            "regime_rules": {}
        })));
        assert_eq!(engine.default_regime(), "REGIME_CUSTOM_DEFAULT");
    }
}
