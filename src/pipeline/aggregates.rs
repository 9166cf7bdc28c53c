//! Aggregates stage: roll the strike table up into underlying-level totals,
//! then derive the gamma-imbalance (GIB) family from them.
//!
//! GIB prefers the snapshot's call/put gamma OI split; when that split is
//! missing or degenerate it falls back through table-derived proxies. The
//! end-of-day hedging pressure (HP_EOD) and time-decayed GIB (TD_GIB)
//! readings are session-clock dependent and read zero outside trading hours.

use chrono::{NaiveDateTime, Timelike};
use tracing::debug;

use crate::chain::{StrikeRow, StrikeTable};
use crate::config::SessionParams;
use crate::normalize::{mean, sample_std};
use crate::types::{UnderlyingMetrics, UnderlyingSnapshot};

pub(crate) fn calculate(und: &mut UnderlyingMetrics, strikes: &StrikeTable) {
    let rows = strikes.rows();
    let sum = |f: fn(&StrikeRow) -> f64| -> f64 { rows.iter().map(f).sum() };

    und.total_delta_flow = sum(|r| r.net_cust_delta_flow);
    und.total_gamma_flow = sum(|r| r.net_cust_gamma_flow);
    und.total_vega_flow = sum(|r| r.net_cust_vega_flow);
    und.total_theta_flow = sum(|r| r.net_cust_theta_flow);
    und.total_delta_exposure = sum(|r| r.total_dxoi);
    und.total_gamma_exposure = sum(|r| r.total_gxoi);
    und.total_vega_exposure = sum(|r| r.total_vxoi);
    und.total_theta_exposure = sum(|r| r.total_txoi);
    und.a_dag_und_aggregate = sum(|r| r.a_dag_exposure);
    und.total_nvp = sum(|r| r.nvp);
    und.total_nvp_vol = sum(|r| r.nvp_vol);
    und.total_0dte_gamma = sum(|r| r.gamma_0dte);
    und.total_0dte_delta = sum(|r| r.delta_0dte);
    und.total_0dte_vanna = sum(|r| r.vanna_0dte);

    let vri: Vec<f64> = rows.iter().map(|r| r.vri_2_0).collect();
    und.vri_2_0_und_aggregate = mean(&vri);

    let a_dag: Vec<f64> = rows.iter().map(|r| r.a_dag_exposure).collect();
    let (sai, ssi) = structural_indices(&a_dag);
    und.a_sai_und_avg = sai;
    und.a_ssi_und_avg = ssi;

    // Legacy aggregate names kept for rule compatibility; the real enhanced
    // flow metrics land in the next stage.
    und.vapi_fa_und_aggregate = und.total_vega_flow;
    und.dwfd_und_aggregate = und.total_delta_flow;
    und.tw_laf_und_aggregate = und.total_theta_flow;

    debug!(
        symbol = %und.symbol,
        strikes = rows.len(),
        total_nvp = und.total_nvp,
        total_gamma_exposure = und.total_gamma_exposure,
        "strike aggregates rolled up"
    );
}

/// A-SAI / A-SSI: mean of the strictly positive and strictly negative
/// 3-sigma-normalized A-DAG values, each on [-1, 1].
fn structural_indices(a_dag: &[f64]) -> (f64, f64) {
    let std = sample_std(a_dag);
    if std <= 0.0 {
        return (0.0, 0.0);
    }
    let m = mean(a_dag);
    let normalized: Vec<f64> = a_dag
        .iter()
        .map(|v| ((v - m) / (3.0 * std)).clamp(-1.0, 1.0))
        .collect();
    let positive: Vec<f64> = normalized.iter().copied().filter(|v| *v > 0.0).collect();
    let negative: Vec<f64> = normalized.iter().copied().filter(|v| *v < 0.0).collect();
    let sai = if positive.is_empty() { 0.0 } else { mean(&positive) };
    let ssi = if negative.is_empty() { 0.0 } else { mean(&negative) };
    (sai, ssi)
}

pub(crate) fn gib_family(
    und: &mut UnderlyingMetrics,
    snapshot: &UnderlyingSnapshot,
    now: NaiveDateTime,
    session: &SessionParams,
) {
    let mut gib = snapshot.call_gxoi - snapshot.put_gxoi;
    if gib.abs() < 1000.0 {
        gib = if und.total_gamma_exposure.abs() > 100.0 {
            und.total_gamma_exposure * snapshot.price / 1000.0
        } else if und.total_gamma_flow.abs() > 100.0 {
            und.total_gamma_flow * 10.0
        } else if und.total_nvp.abs() > 1e6 {
            und.total_nvp / 1000.0
        } else {
            und.total_gamma_exposure * 0.1
        };
        debug!(symbol = %und.symbol, gib, "call/put gamma OI degenerate, using fallback GIB");
    }
    und.gib_oi_based_und = gib;

    let elapsed = session_clock(now, session);

    und.hp_eod_und = match elapsed {
        None => 0.0,
        Some(minutes) => {
            let reference = snapshot
                .day_open_price
                .filter(|p| *p != 0.0)
                .or(snapshot.prev_day_close_price.filter(|p| *p != 0.0))
                .unwrap_or(snapshot.price * 0.995);
            let multiplier = 0.5 + 0.5 * (minutes / session.session_minutes());
            let delta = snapshot.price - reference;
            if delta.abs() < 0.01 {
                gib * multiplier * 0.001
            } else {
                gib * delta * multiplier
            }
        }
    };

    und.td_gib_und = match elapsed {
        None => 0.0,
        Some(minutes) => gib * (minutes / session.session_minutes()).max(0.1),
    };
}

/// Minutes elapsed since the session open at wall time `now`, to whole-minute
/// resolution; `None` outside the session (bounds inclusive).
fn session_clock(now: NaiveDateTime, session: &SessionParams) -> Option<f64> {
    let t = now.time();
    let minute_of_day = t.hour() * 60 + t.minute();
    let open = session.open.hour() * 60 + session.open.minute();
    let close = session.close.hour() * 60 + session.close.minute();
    if minute_of_day < open || minute_of_day > close {
        return None;
    }
    Some(f64::from(minute_of_day - open))
}
