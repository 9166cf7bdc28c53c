//! Adaptive stage: per-strike exposure scores that scale with market
//! context (prior regime, volatility, time to expiry).
//!
//! A-DAG is the anchor metric: dealer gamma exposure signed by strike side
//! and amplified when customer flow aligns with dealer positioning. E-SDAG,
//! D-TDPI and VRI 2.0 follow the same shape with different Greek inputs.
//! The 0DTE suite adds concentration indices over expiring exposure.

use tracing::debug;

use crate::chain::StrikeTable;
use crate::config::AdaptiveParams;
use crate::normalize::{mean, FlowNormalizer};
use crate::types::{UnderlyingMetrics, UnderlyingSnapshot};

use super::{sign, DteContext, VolContext};

pub(crate) fn calculate(
    strikes: &mut StrikeTable,
    und: &UnderlyingMetrics,
    snapshot: &UnderlyingSnapshot,
    params: &AdaptiveParams,
    normalizer: &mut FlowNormalizer,
) {
    let vol_context = VolContext::from_iv(snapshot.iv_or_default(), params);
    let avg_dte_values: Vec<f64> = strikes.rows().iter().map(|r| r.avg_dte).collect();
    let dte_context = DteContext::from_avg_dte(mean(&avg_dte_values));

    let regime_mult = params
        .regime_alpha_multipliers
        .get(&und.current_market_regime)
        .copied()
        .unwrap_or(1.0);
    let vol_mult = params
        .volatility_alpha_multipliers
        .get(vol_context.key())
        .copied()
        .unwrap_or(1.0);
    let dte_scale = dte_context.scaling(&params.dte_scaling);

    debug!(
        symbol = %snapshot.symbol,
        vol_context = vol_context.key(),
        regime_mult,
        vol_mult,
        dte_scale,
        "adaptive context"
    );

    a_dag(strikes, snapshot.price, params, regime_mult * vol_mult, dte_scale);
    e_sdag(strikes, &snapshot.symbol, normalizer);
    d_tdpi(strikes, &snapshot.symbol, normalizer);
    vri_2_0(strikes, &snapshot.symbol, normalizer);
    zero_dte_suite(strikes, params.zero_dte_threshold);
}

/// A-DAG: gamma exposure signed by strike side, scaled by flow alignment.
///
/// `context_mult` is the combined regime and volatility multiplier applied
/// to the base alignment coefficient.
fn a_dag(strikes: &mut StrikeTable, price: f64, params: &AdaptiveParams, context_mult: f64, dte_scale: f64) {
    let coeffs = &params.base_alpha_coeffs;
    for row in strikes.rows_mut() {
        let delta_align = sign(row.total_dxoi) * sign(row.net_cust_delta_flow);
        let gamma_align = sign(row.total_gxoi) * sign(row.net_cust_gamma_flow);
        let combined = (delta_align + gamma_align) / 2.0;

        let base = if combined > 0.3 {
            coeffs.aligned
        } else if combined < -0.3 {
            coeffs.opposed
        } else {
            coeffs.neutral
        };
        let alpha = base * context_mult;

        let flow_alignment = if row.total_gxoi.abs() > 0.0 {
            (row.net_cust_delta_flow + row.net_cust_gamma_flow) / (row.total_gxoi.abs() + 1e-6)
        } else {
            0.0
        };

        // Strikes above spot act as resistance, below as support.
        let direction = if row.strike > price { -1.0 } else { 1.0 };

        row.a_dag_exposure =
            row.total_gxoi * direction * (1.0 + alpha * flow_alignment) * dte_scale;
        row.a_dag_adaptive_alpha = alpha;
        row.a_dag_flow_alignment = flow_alignment;
        row.a_dag_directional_multiplier = direction;
    }
}

/// E-SDAG: four views of gamma exposure scaled by z-normalized delta OI.
fn e_sdag(strikes: &mut StrikeTable, symbol: &str, normalizer: &mut FlowNormalizer) {
    let dxoi: Vec<f64> = strikes.rows().iter().map(|r| r.total_dxoi).collect();
    let z = normalizer.normalize(symbol, "dxoi", &dxoi);
    for (row, z) in strikes.rows_mut().iter_mut().zip(z) {
        row.e_sdag_mult = row.total_gxoi * (1.0 + z * 0.5);
        row.e_sdag_dir = row.total_gxoi * sign(z);
        row.e_sdag_w = row.total_gxoi * z.abs();
        row.e_sdag_vf = row.total_gxoi + z * 0.3;
    }
}

/// D-TDPI: charm exposure signed by theta OI, scaled by z-normalized
/// per-strike theta flow.
fn d_tdpi(strikes: &mut StrikeTable, symbol: &str, normalizer: &mut FlowNormalizer) {
    let theta_flow: Vec<f64> = strikes
        .rows()
        .iter()
        .map(|r| r.net_cust_theta_flow)
        .collect();
    let z = normalizer.normalize(symbol, "theta_flow", &theta_flow);
    for (row, z) in strikes.rows_mut().iter_mut().zip(z) {
        row.d_tdpi = row.total_charmxoi * sign(row.total_txoi) * (1.0 + z * 0.4);
    }
}

/// VRI 2.0: vega exposure weighted by vanna/vomma structure, decayed by the
/// strike's term. The z-normalized series collapses to its mean, stored on
/// every row as the table-wide volatility regime reading.
fn vri_2_0(strikes: &mut StrikeTable, symbol: &str, normalizer: &mut FlowNormalizer) {
    let scaled: Vec<f64> = strikes
        .rows()
        .iter()
        .map(|r| {
            let base =
                r.total_vxoi * (0.4 * r.total_vannaxoi + 0.3 * r.total_vommaxoi + 0.3);
            base * (-r.avg_dte / 365.0).exp()
        })
        .collect();
    let z = normalizer.normalize(symbol, "vri_2_0", &scaled);
    let value = mean(&z);
    for row in strikes.rows_mut() {
        row.vri_2_0 = value;
    }
}

/// Herfindahl concentration of absolute weight across `values`; zero when
/// nothing is exposed.
fn herfindahl(values: &[f64]) -> f64 {
    let total: f64 = values.iter().map(|v| v.abs()).sum();
    if total <= 0.0 {
        return 0.0;
    }
    values
        .iter()
        .map(|v| {
            let w = v.abs() / total;
            w * w
        })
        .sum()
}

/// 0DTE suite: concentration indices over strikes carrying same-day expiry
/// exposure. Needs more than one such strike to be meaningful; contributing
/// rows share the index, others stay zero.
fn zero_dte_suite(strikes: &mut StrikeTable, threshold: f64) {
    let mask: Vec<bool> = strikes
        .rows()
        .iter()
        .map(|r| r.min_dte <= threshold)
        .collect();
    if mask.iter().filter(|m| **m).count() <= 1 {
        return;
    }

    let masked = |f: fn(&crate::chain::StrikeRow) -> f64| -> Vec<f64> {
        strikes
            .rows()
            .iter()
            .zip(&mask)
            .filter(|(_, m)| **m)
            .map(|(r, _)| f(r))
            .collect()
    };
    let vci = herfindahl(&masked(|r| r.vanna_0dte));
    let gci = herfindahl(&masked(|r| r.gamma_0dte));
    let dci = herfindahl(&masked(|r| r.delta_0dte));

    for (row, flagged) in strikes.rows_mut().iter_mut().zip(&mask) {
        if *flagged {
            row.vci_0dte = vci;
            row.gci_0dte = gci;
            row.dci_0dte = dci;
        }
    }
}
