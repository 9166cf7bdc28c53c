//! Core data model: raw inputs from the fetch boundary and the enriched
//! underlying aggregate the pipeline produces.
//!
//! Raw types (`ContractRow`, `UnderlyingSnapshot`, `OhlcvBar`) are immutable
//! once handed to the pipeline. `UnderlyingMetrics` starts as a projection of
//! the snapshot and is extended in place by each calculation stage; the rule
//! engine reads it through the by-name accessors so regime rules can address
//! any field without the engine knowing the struct layout.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Regime label assumed when no prior cycle has classified one.
pub(crate) const NEUTRAL_REGIME: &str = "REGIME_NEUTRAL";

/// Implied volatility assumed when the snapshot carries none.
pub(crate) const DEFAULT_IV: f64 = 0.20;

/// Option contract side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionKind {
    Call,
    Put,
}

/// One option observation from the chain fetcher.
///
/// Greek exposure fields arrive pre-multiplied by open interest (a dealer
/// exposure proxy, not a price). Absent fields deserialize to zero so a
/// sparse upstream payload degrades instead of failing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractRow {
    pub strike: f64,
    pub kind: OptionKind,
    /// Calendar days to expiry (0.0 for same-day expiry).
    #[serde(default)]
    pub dte: f64,
    /// Delta x open interest.
    #[serde(default)]
    pub dxoi: f64,
    /// Gamma x open interest.
    #[serde(default)]
    pub gxoi: f64,
    /// Vega x open interest.
    #[serde(default)]
    pub vxoi: f64,
    /// Theta x open interest.
    #[serde(default)]
    pub txoi: f64,
    /// Charm x open interest.
    #[serde(default)]
    pub charmxoi: f64,
    /// Vanna x open interest.
    #[serde(default)]
    pub vannaxoi: f64,
    /// Vomma x open interest.
    #[serde(default)]
    pub vommaxoi: f64,
    /// Net signed premium flow for the contract (bought minus sold), dollars.
    #[serde(default)]
    pub value_bs: f64,
    /// Net signed volume flow for the contract (bought minus sold), contracts.
    #[serde(default)]
    pub volm_bs: f64,
}

/// Scalar market state for one symbol at one instant, as fetched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnderlyingSnapshot {
    pub symbol: String,
    /// Current spot price.
    pub price: f64,
    /// Session open, when the fetcher supplies it.
    #[serde(default)]
    pub day_open_price: Option<f64>,
    /// Prior session close, when the fetcher supplies it.
    #[serde(default)]
    pub prev_day_close_price: Option<f64>,
    /// Underlying implied volatility (0.20 means 20%). Zero reads as unset.
    #[serde(default)]
    pub implied_volatility: f64,
    /// Customer delta bought today, across the chain.
    #[serde(default)]
    pub deltas_buy: f64,
    #[serde(default)]
    pub deltas_sell: f64,
    /// Customer gamma flow, split by side and option kind.
    #[serde(default)]
    pub gammas_call_buy: f64,
    #[serde(default)]
    pub gammas_put_buy: f64,
    #[serde(default)]
    pub gammas_call_sell: f64,
    #[serde(default)]
    pub gammas_put_sell: f64,
    #[serde(default)]
    pub vegas_buy: f64,
    #[serde(default)]
    pub vegas_sell: f64,
    #[serde(default)]
    pub thetas_buy: f64,
    #[serde(default)]
    pub thetas_sell: f64,
    /// Gamma x open interest summed over calls.
    #[serde(default)]
    pub call_gxoi: f64,
    /// Gamma x open interest summed over puts.
    #[serde(default)]
    pub put_gxoi: f64,
    /// Regime label produced by the prior cycle, if any. Feeds the adaptive
    /// alpha multipliers before this cycle's own classification runs.
    #[serde(default)]
    pub prior_regime: Option<String>,
}

impl UnderlyingSnapshot {
    /// Implied volatility with the unset-zero convention applied.
    pub fn iv_or_default(&self) -> f64 {
        if self.implied_volatility == 0.0 {
            DEFAULT_IV
        } else {
            self.implied_volatility
        }
    }
}

/// One daily OHLCV bar from a history provider, oldest-first ordering
/// expected by the ATR calculator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OhlcvBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// The enriched underlying aggregate: every underlying-level derived metric
/// for one cycle, plus the regime label once classification has run.
///
/// Field names double as the rule-engine metric namespace; see
/// [`UnderlyingMetrics::value`].
#[derive(Debug, Clone, Serialize)]
pub struct UnderlyingMetrics {
    pub symbol: String,
    pub price: f64,

    // ===== Foundational: net customer Greek flows =====
    pub net_cust_delta_flow_und: f64,
    pub net_cust_gamma_flow_und: f64,
    pub net_cust_vega_flow_und: f64,
    pub net_cust_theta_flow_und: f64,

    // ===== Aggregates over the strike table =====
    pub total_delta_flow: f64,
    pub total_gamma_flow: f64,
    pub total_vega_flow: f64,
    pub total_theta_flow: f64,
    pub total_delta_exposure: f64,
    pub total_gamma_exposure: f64,
    pub total_vega_exposure: f64,
    pub total_theta_exposure: f64,
    pub a_dag_und_aggregate: f64,
    pub vri_2_0_und_aggregate: f64,
    /// Mean of the strictly positive 3-sigma-normalized A-DAG values.
    pub a_sai_und_avg: f64,
    /// Mean of the strictly negative 3-sigma-normalized A-DAG values.
    pub a_ssi_und_avg: f64,
    pub total_nvp: f64,
    pub total_nvp_vol: f64,
    pub total_0dte_gamma: f64,
    pub total_0dte_delta: f64,
    pub total_0dte_vanna: f64,
    pub vapi_fa_und_aggregate: f64,
    pub dwfd_und_aggregate: f64,
    pub tw_laf_und_aggregate: f64,

    // ===== GIB family =====
    pub gib_oi_based_und: f64,
    pub hp_eod_und: f64,
    pub td_gib_und: f64,

    // ===== Enhanced flow =====
    pub vapi_fa_raw_und: f64,
    pub vapi_fa_z_score_und: f64,
    pub vapi_fa_pvr_5m_und: f64,
    pub vapi_fa_flow_accel_5m_und: f64,
    pub dwfd_raw_und: f64,
    pub dwfd_z_score_und: f64,
    pub dwfd_fvd_und: f64,
    pub tw_laf_raw_und: f64,
    pub tw_laf_z_score_und: f64,
    pub tw_laf_liquidity_factor_5m_und: f64,
    pub tw_laf_time_weighted_sum_und: f64,

    // ===== Volatility =====
    pub atr_und: f64,

    /// Prior cycle's regime label until this cycle's classification
    /// overwrites it.
    pub current_market_regime: String,
}

impl UnderlyingMetrics {
    /// Project a snapshot into a zeroed metrics record, carrying the prior
    /// regime label (or the neutral default) for the adaptive stage.
    pub fn from_snapshot(snapshot: &UnderlyingSnapshot) -> Self {
        UnderlyingMetrics {
            symbol: snapshot.symbol.clone(),
            price: snapshot.price,
            net_cust_delta_flow_und: 0.0,
            net_cust_gamma_flow_und: 0.0,
            net_cust_vega_flow_und: 0.0,
            net_cust_theta_flow_und: 0.0,
            total_delta_flow: 0.0,
            total_gamma_flow: 0.0,
            total_vega_flow: 0.0,
            total_theta_flow: 0.0,
            total_delta_exposure: 0.0,
            total_gamma_exposure: 0.0,
            total_vega_exposure: 0.0,
            total_theta_exposure: 0.0,
            a_dag_und_aggregate: 0.0,
            vri_2_0_und_aggregate: 0.0,
            a_sai_und_avg: 0.0,
            a_ssi_und_avg: 0.0,
            total_nvp: 0.0,
            total_nvp_vol: 0.0,
            total_0dte_gamma: 0.0,
            total_0dte_delta: 0.0,
            total_0dte_vanna: 0.0,
            vapi_fa_und_aggregate: 0.0,
            dwfd_und_aggregate: 0.0,
            tw_laf_und_aggregate: 0.0,
            gib_oi_based_und: 0.0,
            hp_eod_und: 0.0,
            td_gib_und: 0.0,
            vapi_fa_raw_und: 0.0,
            vapi_fa_z_score_und: 0.0,
            vapi_fa_pvr_5m_und: 0.0,
            vapi_fa_flow_accel_5m_und: 0.0,
            dwfd_raw_und: 0.0,
            dwfd_z_score_und: 0.0,
            dwfd_fvd_und: 0.0,
            tw_laf_raw_und: 0.0,
            tw_laf_z_score_und: 0.0,
            tw_laf_liquidity_factor_5m_und: 0.0,
            tw_laf_time_weighted_sum_und: 0.0,
            atr_und: 0.0,
            current_market_regime: snapshot
                .prior_regime
                .clone()
                .unwrap_or_else(|| NEUTRAL_REGIME.to_string()),
        }
    }

    /// Numeric field lookup by rule-engine name. Unknown names return `None`
    /// so the caller can treat the condition as unresolvable.
    pub fn value(&self, name: &str) -> Option<f64> {
        let v = match name {
            "price" => self.price,
            "net_cust_delta_flow_und" => self.net_cust_delta_flow_und,
            "net_cust_gamma_flow_und" => self.net_cust_gamma_flow_und,
            "net_cust_vega_flow_und" => self.net_cust_vega_flow_und,
            "net_cust_theta_flow_und" => self.net_cust_theta_flow_und,
            "total_delta_flow" => self.total_delta_flow,
            "total_gamma_flow" => self.total_gamma_flow,
            "total_vega_flow" => self.total_vega_flow,
            "total_theta_flow" => self.total_theta_flow,
            "total_delta_exposure" => self.total_delta_exposure,
            "total_gamma_exposure" => self.total_gamma_exposure,
            "total_vega_exposure" => self.total_vega_exposure,
            "total_theta_exposure" => self.total_theta_exposure,
            "a_dag_und_aggregate" => self.a_dag_und_aggregate,
            "vri_2_0_und_aggregate" => self.vri_2_0_und_aggregate,
            "a_sai_und_avg" => self.a_sai_und_avg,
            "a_ssi_und_avg" => self.a_ssi_und_avg,
            "total_nvp" => self.total_nvp,
            "total_nvp_vol" => self.total_nvp_vol,
            "total_0dte_gamma" => self.total_0dte_gamma,
            "total_0dte_delta" => self.total_0dte_delta,
            "total_0dte_vanna" => self.total_0dte_vanna,
            "vapi_fa_und_aggregate" => self.vapi_fa_und_aggregate,
            "dwfd_und_aggregate" => self.dwfd_und_aggregate,
            "tw_laf_und_aggregate" => self.tw_laf_und_aggregate,
            "gib_oi_based_und" => self.gib_oi_based_und,
            "hp_eod_und" => self.hp_eod_und,
            "td_gib_und" => self.td_gib_und,
            "vapi_fa_raw_und" => self.vapi_fa_raw_und,
            "vapi_fa_z_score_und" => self.vapi_fa_z_score_und,
            "vapi_fa_pvr_5m_und" => self.vapi_fa_pvr_5m_und,
            "vapi_fa_flow_accel_5m_und" => self.vapi_fa_flow_accel_5m_und,
            "dwfd_raw_und" => self.dwfd_raw_und,
            "dwfd_z_score_und" => self.dwfd_z_score_und,
            "dwfd_fvd_und" => self.dwfd_fvd_und,
            "tw_laf_raw_und" => self.tw_laf_raw_und,
            "tw_laf_z_score_und" => self.tw_laf_z_score_und,
            "tw_laf_liquidity_factor_5m_und" => self.tw_laf_liquidity_factor_5m_und,
            "tw_laf_time_weighted_sum_und" => self.tw_laf_time_weighted_sum_und,
            "atr_und" => self.atr_und,
            _ => return None,
        };
        Some(v)
    }

    /// Text field lookup by rule-engine name, for `_contains`/`_eq` rules
    /// over non-numeric fields.
    pub fn text(&self, name: &str) -> Option<&str> {
        match name {
            "symbol" => Some(&self.symbol),
            "current_market_regime" => Some(&self.current_market_regime),
            _ => None,
        }
    }

    /// All numeric fields with their names, for the sanitization pass.
    pub(crate) fn numeric_fields_mut(&mut self) -> Vec<(&'static str, &mut f64)> {
        vec![
            ("price", &mut self.price),
            ("net_cust_delta_flow_und", &mut self.net_cust_delta_flow_und),
            ("net_cust_gamma_flow_und", &mut self.net_cust_gamma_flow_und),
            ("net_cust_vega_flow_und", &mut self.net_cust_vega_flow_und),
            ("net_cust_theta_flow_und", &mut self.net_cust_theta_flow_und),
            ("total_delta_flow", &mut self.total_delta_flow),
            ("total_gamma_flow", &mut self.total_gamma_flow),
            ("total_vega_flow", &mut self.total_vega_flow),
            ("total_theta_flow", &mut self.total_theta_flow),
            ("total_delta_exposure", &mut self.total_delta_exposure),
            ("total_gamma_exposure", &mut self.total_gamma_exposure),
            ("total_vega_exposure", &mut self.total_vega_exposure),
            ("total_theta_exposure", &mut self.total_theta_exposure),
            ("a_dag_und_aggregate", &mut self.a_dag_und_aggregate),
            ("vri_2_0_und_aggregate", &mut self.vri_2_0_und_aggregate),
            ("a_sai_und_avg", &mut self.a_sai_und_avg),
            ("a_ssi_und_avg", &mut self.a_ssi_und_avg),
            ("total_nvp", &mut self.total_nvp),
            ("total_nvp_vol", &mut self.total_nvp_vol),
            ("total_0dte_gamma", &mut self.total_0dte_gamma),
            ("total_0dte_delta", &mut self.total_0dte_delta),
            ("total_0dte_vanna", &mut self.total_0dte_vanna),
            ("vapi_fa_und_aggregate", &mut self.vapi_fa_und_aggregate),
            ("dwfd_und_aggregate", &mut self.dwfd_und_aggregate),
            ("tw_laf_und_aggregate", &mut self.tw_laf_und_aggregate),
            ("gib_oi_based_und", &mut self.gib_oi_based_und),
            ("hp_eod_und", &mut self.hp_eod_und),
            ("td_gib_und", &mut self.td_gib_und),
            ("vapi_fa_raw_und", &mut self.vapi_fa_raw_und),
            ("vapi_fa_z_score_und", &mut self.vapi_fa_z_score_und),
            ("vapi_fa_pvr_5m_und", &mut self.vapi_fa_pvr_5m_und),
            (
                "vapi_fa_flow_accel_5m_und",
                &mut self.vapi_fa_flow_accel_5m_und,
            ),
            ("dwfd_raw_und", &mut self.dwfd_raw_und),
            ("dwfd_z_score_und", &mut self.dwfd_z_score_und),
            ("dwfd_fvd_und", &mut self.dwfd_fvd_und),
            ("tw_laf_raw_und", &mut self.tw_laf_raw_und),
            ("tw_laf_z_score_und", &mut self.tw_laf_z_score_und),
            (
                "tw_laf_liquidity_factor_5m_und",
                &mut self.tw_laf_liquidity_factor_5m_und,
            ),
            (
                "tw_laf_time_weighted_sum_und",
                &mut self.tw_laf_time_weighted_sum_und,
            ),
            ("atr_und", &mut self.atr_und),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> UnderlyingSnapshot {
        UnderlyingSnapshot {
            symbol: "TEST".to_string(),
            price: 100.5,
            day_open_price: None,
            prev_day_close_price: None,
            implied_volatility: 0.0,
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
        }
    }

    #[test]
    fn from_snapshot_zeroes_metrics_and_defaults_regime() {
        let und = UnderlyingMetrics::from_snapshot(&snapshot());
        assert_eq!(und.symbol, "TEST");
        assert_eq!(und.price, 100.5);
        assert_eq!(und.gib_oi_based_und, 0.0);
        assert_eq!(und.current_market_regime, NEUTRAL_REGIME);
    }

    #[test]
    fn from_snapshot_carries_prior_regime() {
        let mut snap = snapshot();
        snap.prior_regime = Some("REGIME_VOL_EXPANSION".to_string());
        let und = UnderlyingMetrics::from_snapshot(&snap);
        assert_eq!(und.current_market_regime, "REGIME_VOL_EXPANSION");
    }

    #[test]
    fn value_resolves_known_fields_and_rejects_unknown() {
        let mut und = UnderlyingMetrics::from_snapshot(&snapshot());
        und.gib_oi_based_und = -60e9;
        assert_eq!(und.value("gib_oi_based_und"), Some(-60e9));
        assert_eq!(und.value("price"), Some(100.5));
        assert_eq!(und.value("no_such_metric"), None);
    }

    #[test]
    fn text_resolves_symbol_and_regime_only() {
        let und = UnderlyingMetrics::from_snapshot(&snapshot());
        assert_eq!(und.text("symbol"), Some("TEST"));
        assert_eq!(und.text("current_market_regime"), Some(NEUTRAL_REGIME));
        assert_eq!(und.text("price"), None);
    }

    #[test]
    fn iv_default_applies_only_when_unset() {
        let mut snap = snapshot();
        assert_eq!(snap.iv_or_default(), DEFAULT_IV);
        snap.implied_volatility = 0.35;
        assert_eq!(snap.iv_or_default(), 0.35);
    }

    #[test]
    fn contract_row_missing_fields_default_to_zero() {
        let row: ContractRow =
            serde_json::from_str(r#"{"strike": 100.0, "kind": "call"}"#).unwrap();
        assert_eq!(row.gxoi, 0.0);
        assert_eq!(row.value_bs, 0.0);
        assert_eq!(row.dte, 0.0);
    }
}
