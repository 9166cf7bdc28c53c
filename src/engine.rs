//! Top-level analysis engine: one metric pipeline plus one compiled regime
//! classifier.
//!
//! `run_cycle` is the whole public ceremony: feed it the fetched chain and
//! snapshot plus the per-cycle context, get back the enriched tables with
//! the final regime label stamped on the underlying. It never fails;
//! degraded inputs produce degraded (zeroed/empty) outputs instead.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;

use crate::cache::IntradayStore;
use crate::chain::StrikeTable;
use crate::config::{AnalyticsConfig, RegimeSettings};
use crate::pipeline::{MetricsPipeline, OhlcvProvider};
use crate::regime::{ContextValue, EvalContext, RegimeEngine};
use crate::types::{ContractRow, UnderlyingMetrics, UnderlyingSnapshot};

/// Everything one analysis cycle consumes.
pub struct CycleInput<'a> {
    pub contracts: &'a [ContractRow],
    pub snapshot: &'a UnderlyingSnapshot,
    /// Cycle clock: session arithmetic and intraday cache dating.
    pub now: NaiveDateTime,
    /// Upper DTE bound the chain was fetched with; sizes the ATR lookback.
    pub dte_max: u32,
    pub context_flags: &'a BTreeMap<String, ContextValue>,
    pub dynamic_thresholds: &'a BTreeMap<String, f64>,
}

/// Everything one analysis cycle produces.
pub struct CycleOutput {
    pub strikes: StrikeTable,
    pub underlying: UnderlyingMetrics,
    /// The classified regime, also stamped on `underlying`.
    pub regime: String,
}

/// Engine facade over the metric pipeline and the regime classifier.
pub struct AnalyticsEngine<S: IntradayStore> {
    pipeline: MetricsPipeline<S>,
    regime: RegimeEngine,
}

impl<S: IntradayStore> AnalyticsEngine<S> {
    pub fn new(config: AnalyticsConfig, regime_settings: &RegimeSettings, store: S) -> Self {
        AnalyticsEngine {
            pipeline: MetricsPipeline::new(config, store),
            regime: RegimeEngine::new(regime_settings),
        }
    }

    pub fn config(&self) -> &AnalyticsConfig {
        self.pipeline.config()
    }

    /// Run one full cycle: metrics, then classification, then stamp the
    /// label.
    pub fn run_cycle(&mut self, input: CycleInput<'_>, history: &dyn OhlcvProvider) -> CycleOutput {
        let (strikes, mut underlying) = self.pipeline.calculate_all(
            input.contracts,
            input.snapshot,
            input.now,
            input.dte_max,
            history,
        );
        let regime = self.regime.classify(&EvalContext {
            underlying: &underlying,
            strikes: &strikes,
            context_flags: input.context_flags,
            dynamic_thresholds: input.dynamic_thresholds,
        });
        underlying.current_market_regime = regime.clone();
        CycleOutput {
            strikes,
            underlying,
            regime,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use serde_json::json;

    use crate::cache::MemoryStore;
    use crate::pipeline::EmptyHistory;
    use crate::types::OptionKind;

    use super::*;

    fn snapshot() -> UnderlyingSnapshot {
        UnderlyingSnapshot {
            symbol: "SPY".to_string(),
            price: 100.0,
            day_open_price: Some(99.0),
            prev_day_close_price: Some(98.5),
            implied_volatility: 0.2,
            deltas_buy: 1000.0,
            deltas_sell: 400.0,
            gammas_call_buy: 50.0,
            gammas_put_buy: 30.0,
            gammas_call_sell: 20.0,
            gammas_put_sell: 10.0,
            vegas_buy: 600.0,
            vegas_sell: 100.0,
            thetas_buy: 300.0,
            thetas_sell: 50.0,
            call_gxoi: 2_000_000.0,
            put_gxoi: 500_000.0,
            prior_regime: None,
        }
    }

    fn contract(strike: f64) -> ContractRow {
        ContractRow {
            strike,
            kind: OptionKind::Call,
            dte: 10.0,
            dxoi: 500.0,
            gxoi: 1500.0,
            vxoi: 100.0,
            txoi: -40.0,
            charmxoi: 5.0,
            vannaxoi: 12.0,
            vommaxoi: 3.0,
            value_bs: 10_000.0,
            volm_bs: 250.0,
        }
    }

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 2)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn regime_settings(raw: serde_json::Value) -> RegimeSettings {
        serde_json::from_value(raw).unwrap()
    }

    #[test]
    fn cycle_classifies_from_freshly_computed_metrics() {
        let settings = regime_settings(json!({
            "default_regime": "REGIME_UNCLEAR",
            "regime_evaluation_order": ["REGIME_POSITIVE_GIB"],
            "regime_rules": {
                "REGIME_POSITIVE_GIB": { "gib_oi_based_und_gt": 1_000_000.0 },
            }
        }));
        let mut engine =
            AnalyticsEngine::new(AnalyticsConfig::default(), &settings, MemoryStore::new());

        let contracts = vec![contract(95.0), contract(100.0), contract(105.0)];
        let snap = snapshot();
        let flags = BTreeMap::new();
        let thresholds = BTreeMap::new();
        let out = engine.run_cycle(
            CycleInput {
                contracts: &contracts,
                snapshot: &snap,
                now: noon(),
                dte_max: 45,
                context_flags: &flags,
                dynamic_thresholds: &thresholds,
            },
            &EmptyHistory,
        );

        // GIB = 1.5e6 from the snapshot OI split, so the rule fires.
        assert_eq!(out.regime, "REGIME_POSITIVE_GIB");
        assert_eq!(out.underlying.current_market_regime, "REGIME_POSITIVE_GIB");
        assert_eq!(out.strikes.len(), 3);
    }

    #[test]
    fn no_matching_rule_stamps_the_default() {
        let settings = regime_settings(json!({
            "default_regime": "REGIME_UNCLEAR",
            "regime_evaluation_order": [],
            "regime_rules": {}
        }));
        let mut engine =
            AnalyticsEngine::new(AnalyticsConfig::default(), &settings, MemoryStore::new());

        let snap = snapshot();
        let flags = BTreeMap::new();
        let thresholds = BTreeMap::new();
        let out = engine.run_cycle(
            CycleInput {
                contracts: &[],
                snapshot: &snap,
                now: noon(),
                dte_max: 45,
                context_flags: &flags,
                dynamic_thresholds: &thresholds,
            },
            &EmptyHistory,
        );

        assert!(out.strikes.is_empty());
        assert_eq!(out.underlying.current_market_regime, "REGIME_UNCLEAR");
    }

    #[test]
    fn context_flags_reach_classification() {
        let settings = regime_settings(json!({
            "default_regime": "REGIME_UNCLEAR",
            "regime_evaluation_order": ["REGIME_EOD"],
            "regime_rules": {
                "REGIME_EOD": {
                    "time_is_final_hour_eq": "true",
                    "gib_oi_based_und_gt": 0,
                }
            }
        }));
        let mut engine =
            AnalyticsEngine::new(AnalyticsConfig::default(), &settings, MemoryStore::new());

        let snap = snapshot();
        let thresholds = BTreeMap::new();
        let mut flags = BTreeMap::new();

        let contracts = vec![contract(100.0)];
        let out = engine.run_cycle(
            CycleInput {
                contracts: &contracts,
                snapshot: &snap,
                now: noon(),
                dte_max: 45,
                context_flags: &flags,
                dynamic_thresholds: &thresholds,
            },
            &EmptyHistory,
        );
        assert_eq!(out.regime, "REGIME_UNCLEAR");

        flags.insert("time_is_final_hour".to_string(), ContextValue::Flag(true));
        let out = engine.run_cycle(
            CycleInput {
                contracts: &contracts,
                snapshot: &snap,
                now: noon(),
                dte_max: 45,
                context_flags: &flags,
                dynamic_thresholds: &thresholds,
            },
            &EmptyHistory,
        );
        assert_eq!(out.regime, "REGIME_EOD");
    }
}
