//! Enhanced heatmap stage: composite per-strike structure scores.
//!
//! Three z-normalized exposure intensities (gamma, delta, vanna) are each
//! adjusted by a flow-alignment factor and combined with a z-normalized
//! customer-flow component into the `sgdhp_data` / `ivsdh_data` /
//! `ugch_data` columns. On top of those sit two standalone scores: SGDHP
//! (gamma walls near spot, confirmed by delta OI) and UGCH (weighted
//! z-score consensus across all six Greek OI columns).

use crate::chain::StrikeTable;
use crate::config::HeatmapParams;
use crate::normalize::{mean, sample_std, FlowNormalizer};
use crate::types::UnderlyingSnapshot;

use super::sign;

const GAMMA_WEIGHT: f64 = 0.4;
const DELTA_WEIGHT: f64 = 0.3;
const VANNA_WEIGHT: f64 = 0.2;
const FLOW_WEIGHT: f64 = 0.1;

pub(crate) fn calculate(
    strikes: &mut StrikeTable,
    snapshot: &UnderlyingSnapshot,
    params: &HeatmapParams,
    normalizer: &mut FlowNormalizer,
) {
    composite_data(strikes, &snapshot.symbol, normalizer);
    sgdhp_score(strikes, snapshot.price, params.proximity_sensitivity);
    ugch_score(strikes, params);
}

/// Alignment factor: flow confirming the exposure's sign amplifies it.
fn flow_factor(exposure: f64, flow: f64) -> f64 {
    if sign(exposure) == sign(flow) {
        1.2
    } else {
        0.8
    }
}

fn composite_data(strikes: &mut StrikeTable, symbol: &str, normalizer: &mut FlowNormalizer) {
    let gxoi: Vec<f64> = strikes.rows().iter().map(|r| r.total_gxoi).collect();
    let dxoi: Vec<f64> = strikes.rows().iter().map(|r| r.total_dxoi).collect();
    let vannaxoi: Vec<f64> = strikes.rows().iter().map(|r| r.total_vannaxoi).collect();
    // Per-strike vanna flow has no source feed, so the combined flow is the
    // gamma and delta legs only.
    let combined: Vec<f64> = strikes
        .rows()
        .iter()
        .map(|r| r.net_cust_gamma_flow + r.net_cust_delta_flow)
        .collect();

    let gamma_z = normalizer.normalize(symbol, "gamma", &gxoi);
    let delta_z = normalizer.normalize(symbol, "delta", &dxoi);
    let vanna_z = normalizer.normalize(symbol, "vanna", &vannaxoi);
    let flow_z = normalizer.normalize(symbol, "combined_flow", &combined);

    for (i, row) in strikes.rows_mut().iter_mut().enumerate() {
        let gamma_c =
            gamma_z[i] * GAMMA_WEIGHT * flow_factor(row.total_gxoi, row.net_cust_gamma_flow);
        let delta_c =
            delta_z[i] * DELTA_WEIGHT * flow_factor(row.total_dxoi, row.net_cust_delta_flow);
        let vanna_c = vanna_z[i] * VANNA_WEIGHT * flow_factor(row.total_vannaxoi, 0.0);
        let flow_c = flow_z[i] * FLOW_WEIGHT;

        row.heatmap_gamma_component = gamma_c;
        row.heatmap_delta_component = delta_c;
        row.heatmap_vanna_component = vanna_c;
        row.heatmap_flow_component = flow_c;
        row.sgdhp_data = gamma_c + delta_c + vanna_c + flow_c;
        row.ivsdh_data = vanna_c;
        row.ugch_data = delta_c;
        row.heatmap_regime_scaling = 1.0;
    }
}

/// Super gamma-delta hedging pressure: gamma OI discounted by a Gaussian
/// distance-from-spot kernel and signed/weighted by delta OI.
fn sgdhp_score(strikes: &mut StrikeTable, price: f64, sensitivity: f64) {
    if price <= 0.0 {
        for row in strikes.rows_mut() {
            row.sgdhp_score = 0.0;
        }
        return;
    }
    let max_abs_dxoi = strikes
        .rows()
        .iter()
        .map(|r| r.total_dxoi.abs())
        .fold(0.0_f64, f64::max);

    for row in strikes.rows_mut() {
        let moneyness = (row.strike - price) / price;
        let proximity = (-(moneyness * moneyness) / (2.0 * sensitivity * sensitivity)).exp();
        let dxoi_impact = if max_abs_dxoi > 0.0 {
            row.total_dxoi.abs() / (max_abs_dxoi + 1e-6)
        } else {
            0.0
        };
        // The trailing 1.1 is the fixed recent-flow confirmation term.
        row.sgdhp_score = row.total_gxoi * proximity * sign(row.total_dxoi) * dxoi_impact * 1.1;
    }
}

/// Ultimate Greek confluence: weighted sum of per-column z-scores, so a
/// strike only scores high when several Greeks concentrate there at once.
fn ugch_score(strikes: &mut StrikeTable, params: &HeatmapParams) {
    let z_column = |values: Vec<f64>| -> Vec<f64> {
        let m = mean(&values);
        let s = sample_std(&values);
        if s > 0.0 {
            values.iter().map(|v| (v - m) / s).collect()
        } else {
            vec![0.0; values.len()]
        }
    };

    let z_dxoi = z_column(strikes.rows().iter().map(|r| r.total_dxoi).collect());
    let z_gxoi = z_column(strikes.rows().iter().map(|r| r.total_gxoi).collect());
    let z_vxoi = z_column(strikes.rows().iter().map(|r| r.total_vxoi).collect());
    let z_txoi = z_column(strikes.rows().iter().map(|r| r.total_txoi).collect());
    let z_charm = z_column(strikes.rows().iter().map(|r| r.total_charmxoi).collect());
    let z_vanna = z_column(strikes.rows().iter().map(|r| r.total_vannaxoi).collect());

    let w = &params.ugch_weights;
    for (i, row) in strikes.rows_mut().iter_mut().enumerate() {
        row.ugch_score = w.dxoi * z_dxoi[i]
            + w.gxoi * z_gxoi[i]
            + w.vxoi * z_vxoi[i]
            + w.txoi * z_txoi[i]
            + w.charmxoi * z_charm[i]
            + w.vannaxoi * z_vanna[i];
    }
}
