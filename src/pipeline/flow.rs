//! Enhanced flow stage: VAPI-FA, DWFD and TW-LAF.
//!
//! All three derive a raw reading from the cycle's premium/volume flow
//! totals, append it to the symbol's intraday cache, and report the
//! percentile gauge of the reading against that history as their z-score
//! field. The 15m/30m interval flows are fixed proxies of the 5m total
//! until real interval feeds exist.

use chrono::NaiveDate;
use tracing::debug;

use crate::cache::{CacheKey, CacheKind, IntradayStore};
use crate::config::FlowParams;
use crate::normalize::{mean, percentile_gauge, population_std};
use crate::types::{UnderlyingMetrics, UnderlyingSnapshot};

pub(crate) fn calculate<S: IntradayStore>(
    und: &mut UnderlyingMetrics,
    snapshot: &UnderlyingSnapshot,
    date: NaiveDate,
    store: &mut S,
    params: &FlowParams,
) {
    vapi_fa(und, snapshot, date, store, params);
    dwfd(und, snapshot, date, store, params);
    tw_laf(und, snapshot, date, store, params);
}

fn key(metric: &str, symbol: &str, date: NaiveDate) -> CacheKey {
    CacheKey::new(metric, symbol, CacheKind::History, date)
}

/// Z-score of `current` against `history` (which already contains it), with
/// the std floored so a flat history cannot blow the score up to infinity.
fn history_z(history: &[f64], current: f64, min_samples: usize) -> f64 {
    if history.len() < min_samples {
        return 0.0;
    }
    let std = population_std(history).max(0.001);
    (current - mean(history)) / std
}

/// Volatility-adjusted premium-intensity and flow-acceleration product.
fn vapi_fa<S: IntradayStore>(
    und: &mut UnderlyingMetrics,
    snapshot: &UnderlyingSnapshot,
    date: NaiveDate,
    store: &mut S,
    params: &FlowParams,
) {
    let value_5m = und.total_nvp;
    let vol_5m = und.total_nvp_vol;
    let vol_15m = vol_5m * 2.8;
    let iv = snapshot.iv_or_default();

    let pvr_5m = if vol_5m.abs() > 0.001 {
        value_5m / vol_5m.abs()
    } else {
        0.0
    };
    let vol_adjusted_pvr = pvr_5m * iv;
    // Acceleration: the last 5m flow against the implied prior 5-to-10m leg.
    let flow_accel_5m = vol_5m - (vol_15m - vol_5m) / 2.0;
    let raw = vol_adjusted_pvr * flow_accel_5m;

    let history = store.append(
        &key("vapi_fa", &snapshot.symbol, date),
        raw,
        params.intraday_window,
    );
    und.vapi_fa_raw_und = raw;
    und.vapi_fa_z_score_und = percentile_gauge(&history, raw);
    und.vapi_fa_pvr_5m_und = pvr_5m;
    und.vapi_fa_flow_accel_5m_und = flow_accel_5m;

    debug!(
        symbol = %snapshot.symbol,
        raw,
        z_score = und.vapi_fa_z_score_und,
        history = history.len(),
        "vapi-fa"
    );
}

/// Delta-weighted flow divergence: volume flow discounted by how far the
/// premium and volume flows have diverged from their intraday histories.
fn dwfd<S: IntradayStore>(
    und: &mut UnderlyingMetrics,
    snapshot: &UnderlyingSnapshot,
    date: NaiveDate,
    store: &mut S,
    params: &FlowParams,
) {
    let value_flow = und.total_nvp;
    let vol_flow = und.total_nvp_vol;

    let value_history = store.append(
        &key("net_value_flow", &snapshot.symbol, date),
        value_flow,
        params.intraday_window,
    );
    let vol_history = store.append(
        &key("net_vol_flow", &snapshot.symbol, date),
        vol_flow,
        params.intraday_window,
    );
    let value_z = history_z(&value_history, value_flow, params.min_z_samples);
    let vol_z = history_z(&vol_history, vol_flow, params.min_z_samples);
    let fvd = value_z - vol_z;

    let raw = vol_flow - params.dwfd_weight_factor * fvd;
    let history = store.append(&key("dwfd", &snapshot.symbol, date), raw, params.intraday_window);
    und.dwfd_raw_und = raw;
    und.dwfd_z_score_und = percentile_gauge(&history, raw);
    und.dwfd_fvd_und = fvd;

    debug!(
        symbol = %snapshot.symbol,
        raw,
        fvd,
        z_score = und.dwfd_z_score_und,
        "dwfd"
    );
}

/// Time-weighted liquidity-adjusted flow over the 5/15/30m intervals.
fn tw_laf<S: IntradayStore>(
    und: &mut UnderlyingMetrics,
    snapshot: &UnderlyingSnapshot,
    date: NaiveDate,
    store: &mut S,
    params: &FlowParams,
) {
    let vol_5m = und.total_nvp_vol;
    let vol_15m = vol_5m * 2.5;
    let vol_30m = vol_5m * 4.0;

    // Spread-derived liquidity factors; older intervals assume wider spreads.
    let base_spread = 0.02;
    let liq_5m = 1.0 / (base_spread * 1.0 + 0.001);
    let liq_15m = 1.0 / (base_spread * 1.2 + 0.001);
    let liq_30m = 1.0 / (base_spread * 1.5 + 0.001);

    let raw = 1.0 * liq_5m * vol_5m + 0.8 * liq_15m * vol_15m + 0.6 * liq_30m * vol_30m;

    let history = store.append(
        &key("tw_laf", &snapshot.symbol, date),
        raw,
        params.intraday_window,
    );
    und.tw_laf_raw_und = raw;
    und.tw_laf_z_score_und = percentile_gauge(&history, raw);
    und.tw_laf_liquidity_factor_5m_und = liq_5m;
    und.tw_laf_time_weighted_sum_und = raw;

    debug!(
        symbol = %snapshot.symbol,
        raw,
        z_score = und.tw_laf_z_score_und,
        "tw-laf"
    );
}
