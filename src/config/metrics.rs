//! Tunable parameters for the metric pipeline.
//!
//! Every parameter carries a serde default so a partial (or empty) JSON
//! config deserializes to the stock behavior. Calculators read these through
//! [`AnalyticsConfig`]; nothing in the pipeline hard-codes a threshold that
//! lives here.

use std::collections::BTreeMap;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    #[serde(default)]
    pub adaptive: AdaptiveParams,
    #[serde(default)]
    pub flow: FlowParams,
    #[serde(default)]
    pub heatmap: HeatmapParams,
    #[serde(default)]
    pub session: SessionParams,
}

/// Alignment coefficients for the adaptive alpha: chosen by whether dealer
/// exposure and customer flow point the same way.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlignmentCoeffs {
    #[serde(default = "default_aligned_coeff")]
    pub aligned: f64,
    #[serde(default = "default_opposed_coeff")]
    pub opposed: f64,
    #[serde(default)]
    pub neutral: f64,
}

impl Default for AlignmentCoeffs {
    fn default() -> Self {
        Self {
            aligned: default_aligned_coeff(),
            opposed: default_opposed_coeff(),
            neutral: 0.0,
        }
    }
}

/// Scaling applied to adaptive exposures by the table's average DTE bucket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DteScaling {
    #[serde(default = "default_zero_dte_scale")]
    pub zero_dte: f64,
    #[serde(default = "default_short_dte_scale")]
    pub short: f64,
    #[serde(default = "default_normal_dte_scale")]
    pub normal: f64,
    #[serde(default = "default_long_dte_scale")]
    pub long: f64,
}

impl Default for DteScaling {
    fn default() -> Self {
        Self {
            zero_dte: default_zero_dte_scale(),
            short: default_short_dte_scale(),
            normal: default_normal_dte_scale(),
            long: default_long_dte_scale(),
        }
    }
}

/// Parameters for the adaptive per-strike calculators (A-DAG and friends).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptiveParams {
    /// Base alignment coefficients before regime/volatility scaling.
    #[serde(default)]
    pub base_alpha_coeffs: AlignmentCoeffs,
    /// Per-regime-label multiplier on the alpha. Unlisted regimes read 1.0.
    #[serde(default)]
    pub regime_alpha_multipliers: BTreeMap<String, f64>,
    /// Per-volatility-context multiplier on the alpha (keys HIGH_VOL /
    /// NORMAL_VOL / LOW_VOL). Unlisted contexts read 1.0.
    #[serde(default)]
    pub volatility_alpha_multipliers: BTreeMap<String, f64>,
    #[serde(default)]
    pub dte_scaling: DteScaling,
    /// IV above this is the high-volatility context.
    #[serde(default = "default_high_vol_threshold")]
    pub high_vol_threshold: f64,
    /// IV below this is the low-volatility context.
    #[serde(default = "default_low_vol_threshold")]
    pub low_vol_threshold: f64,
    /// Contracts with DTE at or below this count toward the 0DTE suite.
    #[serde(default = "default_zero_dte_threshold")]
    pub zero_dte_threshold: f64,
}

impl Default for AdaptiveParams {
    fn default() -> Self {
        Self {
            base_alpha_coeffs: AlignmentCoeffs::default(),
            regime_alpha_multipliers: BTreeMap::new(),
            volatility_alpha_multipliers: BTreeMap::new(),
            dte_scaling: DteScaling::default(),
            high_vol_threshold: default_high_vol_threshold(),
            low_vol_threshold: default_low_vol_threshold(),
            zero_dte_threshold: default_zero_dte_threshold(),
        }
    }
}

/// Parameters for the intraday enhanced-flow metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowParams {
    /// Cap on the per-metric intraday history window.
    #[serde(default = "default_intraday_window")]
    pub intraday_window: usize,
    /// Weight of the flow-value divergence inside DWFD.
    #[serde(default = "default_dwfd_weight_factor")]
    pub dwfd_weight_factor: f64,
    /// Minimum intraday samples before DWFD trusts a z-score.
    #[serde(default = "default_min_z_samples")]
    pub min_z_samples: usize,
}

impl Default for FlowParams {
    fn default() -> Self {
        Self {
            intraday_window: default_intraday_window(),
            dwfd_weight_factor: default_dwfd_weight_factor(),
            min_z_samples: default_min_z_samples(),
        }
    }
}

/// Per-Greek weights for the UGCH confluence score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UgchWeights {
    #[serde(default = "default_ugch_dxoi")]
    pub dxoi: f64,
    #[serde(default = "default_ugch_gxoi")]
    pub gxoi: f64,
    #[serde(default = "default_ugch_vxoi")]
    pub vxoi: f64,
    #[serde(default = "default_ugch_txoi")]
    pub txoi: f64,
    #[serde(default = "default_ugch_charm")]
    pub charmxoi: f64,
    #[serde(default = "default_ugch_vanna")]
    pub vannaxoi: f64,
}

impl Default for UgchWeights {
    fn default() -> Self {
        Self {
            dxoi: default_ugch_dxoi(),
            gxoi: default_ugch_gxoi(),
            vxoi: default_ugch_vxoi(),
            txoi: default_ugch_txoi(),
            charmxoi: default_ugch_charm(),
            vannaxoi: default_ugch_vanna(),
        }
    }
}

/// Parameters for the enhanced heatmap scores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeatmapParams {
    /// Width of the SGDHP price-proximity kernel, as a fraction of spot.
    #[serde(default = "default_proximity_sensitivity")]
    pub proximity_sensitivity: f64,
    #[serde(default)]
    pub ugch_weights: UgchWeights,
}

impl Default for HeatmapParams {
    fn default() -> Self {
        Self {
            proximity_sensitivity: default_proximity_sensitivity(),
            ugch_weights: UgchWeights::default(),
        }
    }
}

/// Trading-session clock for the end-of-day hedging metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionParams {
    #[serde(default = "default_session_open")]
    pub open: NaiveTime,
    #[serde(default = "default_session_close")]
    pub close: NaiveTime,
}

impl Default for SessionParams {
    fn default() -> Self {
        Self {
            open: default_session_open(),
            close: default_session_close(),
        }
    }
}

impl SessionParams {
    /// Session length in minutes (390 for a standard equity session).
    pub fn session_minutes(&self) -> f64 {
        (self.close - self.open).num_minutes() as f64
    }
}

fn default_aligned_coeff() -> f64 {
    1.0
}
fn default_opposed_coeff() -> f64 {
    -0.5
}
fn default_zero_dte_scale() -> f64 {
    1.5
}
fn default_short_dte_scale() -> f64 {
    1.2
}
fn default_normal_dte_scale() -> f64 {
    1.0
}
fn default_long_dte_scale() -> f64 {
    0.8
}
fn default_high_vol_threshold() -> f64 {
    0.30
}
fn default_low_vol_threshold() -> f64 {
    0.15
}
fn default_zero_dte_threshold() -> f64 {
    1.0
}
fn default_intraday_window() -> usize {
    200
}
fn default_dwfd_weight_factor() -> f64 {
    0.5
}
fn default_min_z_samples() -> usize {
    10
}
fn default_proximity_sensitivity() -> f64 {
    0.05
}
fn default_ugch_dxoi() -> f64 {
    1.5
}
fn default_ugch_gxoi() -> f64 {
    2.0
}
fn default_ugch_vxoi() -> f64 {
    1.2
}
fn default_ugch_txoi() -> f64 {
    0.8
}
fn default_ugch_charm() -> f64 {
    0.6
}
fn default_ugch_vanna() -> f64 {
    1.0
}
fn default_session_open() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 30, 0).unwrap_or(NaiveTime::MIN)
}
fn default_session_close() -> NaiveTime {
    NaiveTime::from_hms_opt(16, 0, 0).unwrap_or(NaiveTime::MIN)
}
