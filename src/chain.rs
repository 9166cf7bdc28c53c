//! Strike-level aggregation: per-contract rows reduced to one row per
//! distinct strike.
//!
//! The table is built once per cycle from the raw chain, then each
//! calculation stage widens the rows in place. Rows are ordered by ascending
//! strike and keyed uniquely; the rule engine addresses columns by the same
//! names calculators write them under, via [`StrikeRow::field`].

use serde::Serialize;
use tracing::debug;

use crate::types::{ContractRow, UnderlyingSnapshot};

/// Coerce NaN/Inf inputs to zero so one bad upstream field cannot poison a
/// whole strike's sums.
pub(crate) fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

/// One strike's aggregated exposures, flows, and derived scores.
#[derive(Debug, Clone, Serialize)]
pub struct StrikeRow {
    pub strike: f64,

    // ===== Summed from the chain =====
    pub total_dxoi: f64,
    pub total_gxoi: f64,
    pub total_vxoi: f64,
    pub total_txoi: f64,
    pub total_charmxoi: f64,
    pub total_vannaxoi: f64,
    pub total_vommaxoi: f64,
    pub nvp: f64,
    pub nvp_vol: f64,

    // ===== Per-strike DTE statistics =====
    pub min_dte: f64,
    pub avg_dte: f64,

    // ===== Net customer flows (delta/gamma land on the ATM strike; vega and
    // theta have no per-strike source and stay zero) =====
    pub net_cust_delta_flow: f64,
    pub net_cust_gamma_flow: f64,
    pub net_cust_vega_flow: f64,
    pub net_cust_theta_flow: f64,

    // ===== 0DTE contract sums =====
    pub gamma_0dte: f64,
    pub delta_0dte: f64,
    pub vanna_0dte: f64,
    pub charm_0dte: f64,

    // ===== Adaptive =====
    pub a_dag_exposure: f64,
    pub a_dag_adaptive_alpha: f64,
    pub a_dag_flow_alignment: f64,
    pub a_dag_directional_multiplier: f64,
    pub e_sdag_mult: f64,
    pub e_sdag_dir: f64,
    pub e_sdag_w: f64,
    pub e_sdag_vf: f64,
    pub d_tdpi: f64,
    pub vri_2_0: f64,
    pub vci_0dte: f64,
    pub gci_0dte: f64,
    pub dci_0dte: f64,

    // ===== Heatmap =====
    pub sgdhp_data: f64,
    pub ivsdh_data: f64,
    pub ugch_data: f64,
    pub heatmap_gamma_component: f64,
    pub heatmap_delta_component: f64,
    pub heatmap_vanna_component: f64,
    pub heatmap_flow_component: f64,
    pub heatmap_regime_scaling: f64,
    pub sgdhp_score: f64,
    pub ugch_score: f64,
}

impl StrikeRow {
    fn new(strike: f64) -> Self {
        StrikeRow {
            strike,
            total_dxoi: 0.0,
            total_gxoi: 0.0,
            total_vxoi: 0.0,
            total_txoi: 0.0,
            total_charmxoi: 0.0,
            total_vannaxoi: 0.0,
            total_vommaxoi: 0.0,
            nvp: 0.0,
            nvp_vol: 0.0,
            min_dte: f64::INFINITY,
            avg_dte: 0.0,
            net_cust_delta_flow: 0.0,
            net_cust_gamma_flow: 0.0,
            net_cust_vega_flow: 0.0,
            net_cust_theta_flow: 0.0,
            gamma_0dte: 0.0,
            delta_0dte: 0.0,
            vanna_0dte: 0.0,
            charm_0dte: 0.0,
            a_dag_exposure: 0.0,
            a_dag_adaptive_alpha: 0.0,
            a_dag_flow_alignment: 0.0,
            a_dag_directional_multiplier: 0.0,
            e_sdag_mult: 0.0,
            e_sdag_dir: 0.0,
            e_sdag_w: 0.0,
            e_sdag_vf: 0.0,
            d_tdpi: 0.0,
            vri_2_0: 0.0,
            vci_0dte: 0.0,
            gci_0dte: 0.0,
            dci_0dte: 0.0,
            sgdhp_data: 0.0,
            ivsdh_data: 0.0,
            ugch_data: 0.0,
            heatmap_gamma_component: 0.0,
            heatmap_delta_component: 0.0,
            heatmap_vanna_component: 0.0,
            heatmap_flow_component: 0.0,
            heatmap_regime_scaling: 0.0,
            sgdhp_score: 0.0,
            ugch_score: 0.0,
        }
    }

    /// Column lookup by rule-engine name. `a_dag_strike` aliases
    /// `a_dag_exposure` for configurations written against either name.
    pub fn field(&self, name: &str) -> Option<f64> {
        let v = match name {
            "strike" => self.strike,
            "total_dxoi_at_strike" => self.total_dxoi,
            "total_gxoi_at_strike" => self.total_gxoi,
            "total_vxoi_at_strike" => self.total_vxoi,
            "total_txoi_at_strike" => self.total_txoi,
            "total_charmxoi_at_strike" => self.total_charmxoi,
            "total_vannaxoi_at_strike" => self.total_vannaxoi,
            "total_vommaxoi_at_strike" => self.total_vommaxoi,
            "nvp_at_strike" => self.nvp,
            "nvp_vol_at_strike" => self.nvp_vol,
            "min_dte" => self.min_dte,
            "avg_dte" => self.avg_dte,
            "net_cust_delta_flow_at_strike" => self.net_cust_delta_flow,
            "net_cust_gamma_flow_at_strike" => self.net_cust_gamma_flow,
            "net_cust_vega_flow_at_strike" => self.net_cust_vega_flow,
            "net_cust_theta_flow_at_strike" => self.net_cust_theta_flow,
            "0dte_gamma_exposure" => self.gamma_0dte,
            "0dte_delta_exposure" => self.delta_0dte,
            "0dte_vanna_exposure" => self.vanna_0dte,
            "0dte_charm_exposure" => self.charm_0dte,
            "a_dag_exposure" | "a_dag_strike" => self.a_dag_exposure,
            "a_dag_adaptive_alpha" => self.a_dag_adaptive_alpha,
            "a_dag_flow_alignment" => self.a_dag_flow_alignment,
            "a_dag_directional_multiplier" => self.a_dag_directional_multiplier,
            "e_sdag_mult_strike" => self.e_sdag_mult,
            "e_sdag_dir_strike" => self.e_sdag_dir,
            "e_sdag_w_strike" => self.e_sdag_w,
            "e_sdag_vf_strike" => self.e_sdag_vf,
            "d_tdpi_strike" => self.d_tdpi,
            "vri_2_0_strike" => self.vri_2_0,
            "vci_0dte" => self.vci_0dte,
            "gci_0dte" => self.gci_0dte,
            "dci_0dte" => self.dci_0dte,
            "sgdhp_data" => self.sgdhp_data,
            "ivsdh_data" => self.ivsdh_data,
            "ugch_data" => self.ugch_data,
            "heatmap_gamma_component" => self.heatmap_gamma_component,
            "heatmap_delta_component" => self.heatmap_delta_component,
            "heatmap_vanna_component" => self.heatmap_vanna_component,
            "heatmap_flow_component" => self.heatmap_flow_component,
            "heatmap_regime_scaling" => self.heatmap_regime_scaling,
            "sgdhp_score_strike" => self.sgdhp_score,
            "ugch_score_strike" => self.ugch_score,
            _ => return None,
        };
        Some(v)
    }

    /// All numeric fields with their names, for the sanitization pass.
    pub(crate) fn numeric_fields_mut(&mut self) -> Vec<(&'static str, &mut f64)> {
        vec![
            ("strike", &mut self.strike),
            ("total_dxoi_at_strike", &mut self.total_dxoi),
            ("total_gxoi_at_strike", &mut self.total_gxoi),
            ("total_vxoi_at_strike", &mut self.total_vxoi),
            ("total_txoi_at_strike", &mut self.total_txoi),
            ("total_charmxoi_at_strike", &mut self.total_charmxoi),
            ("total_vannaxoi_at_strike", &mut self.total_vannaxoi),
            ("total_vommaxoi_at_strike", &mut self.total_vommaxoi),
            ("nvp_at_strike", &mut self.nvp),
            ("nvp_vol_at_strike", &mut self.nvp_vol),
            ("min_dte", &mut self.min_dte),
            ("avg_dte", &mut self.avg_dte),
            ("net_cust_delta_flow_at_strike", &mut self.net_cust_delta_flow),
            ("net_cust_gamma_flow_at_strike", &mut self.net_cust_gamma_flow),
            ("net_cust_vega_flow_at_strike", &mut self.net_cust_vega_flow),
            ("net_cust_theta_flow_at_strike", &mut self.net_cust_theta_flow),
            ("0dte_gamma_exposure", &mut self.gamma_0dte),
            ("0dte_delta_exposure", &mut self.delta_0dte),
            ("0dte_vanna_exposure", &mut self.vanna_0dte),
            ("0dte_charm_exposure", &mut self.charm_0dte),
            ("a_dag_exposure", &mut self.a_dag_exposure),
            ("a_dag_adaptive_alpha", &mut self.a_dag_adaptive_alpha),
            ("a_dag_flow_alignment", &mut self.a_dag_flow_alignment),
            (
                "a_dag_directional_multiplier",
                &mut self.a_dag_directional_multiplier,
            ),
            ("e_sdag_mult_strike", &mut self.e_sdag_mult),
            ("e_sdag_dir_strike", &mut self.e_sdag_dir),
            ("e_sdag_w_strike", &mut self.e_sdag_w),
            ("e_sdag_vf_strike", &mut self.e_sdag_vf),
            ("d_tdpi_strike", &mut self.d_tdpi),
            ("vri_2_0_strike", &mut self.vri_2_0),
            ("vci_0dte", &mut self.vci_0dte),
            ("gci_0dte", &mut self.gci_0dte),
            ("dci_0dte", &mut self.dci_0dte),
            ("sgdhp_data", &mut self.sgdhp_data),
            ("ivsdh_data", &mut self.ivsdh_data),
            ("ugch_data", &mut self.ugch_data),
            ("heatmap_gamma_component", &mut self.heatmap_gamma_component),
            ("heatmap_delta_component", &mut self.heatmap_delta_component),
            ("heatmap_vanna_component", &mut self.heatmap_vanna_component),
            ("heatmap_flow_component", &mut self.heatmap_flow_component),
            ("heatmap_regime_scaling", &mut self.heatmap_regime_scaling),
            ("sgdhp_score_strike", &mut self.sgdhp_score),
            ("ugch_score_strike", &mut self.ugch_score),
        ]
    }
}

struct StrikeAcc {
    row: StrikeRow,
    dte_sum: f64,
    contracts: usize,
}

impl StrikeAcc {
    fn new(strike: f64) -> Self {
        Self {
            row: StrikeRow::new(strike),
            dte_sum: 0.0,
            contracts: 0,
        }
    }

    fn absorb(&mut self, contract: &ContractRow, zero_dte_threshold: f64) {
        let row = &mut self.row;
        row.total_dxoi += finite_or_zero(contract.dxoi);
        row.total_gxoi += finite_or_zero(contract.gxoi);
        row.total_vxoi += finite_or_zero(contract.vxoi);
        row.total_txoi += finite_or_zero(contract.txoi);
        row.total_charmxoi += finite_or_zero(contract.charmxoi);
        row.total_vannaxoi += finite_or_zero(contract.vannaxoi);
        row.total_vommaxoi += finite_or_zero(contract.vommaxoi);
        row.nvp += finite_or_zero(contract.value_bs);
        row.nvp_vol += finite_or_zero(contract.volm_bs);

        let dte = finite_or_zero(contract.dte);
        row.min_dte = row.min_dte.min(dte);
        self.dte_sum += dte;
        self.contracts += 1;

        if dte <= zero_dte_threshold {
            row.gamma_0dte += finite_or_zero(contract.gxoi);
            row.delta_0dte += finite_or_zero(contract.dxoi);
            row.vanna_0dte += finite_or_zero(contract.vannaxoi);
            row.charm_0dte += finite_or_zero(contract.charmxoi);
        }
    }

    fn finish(mut self) -> StrikeRow {
        if self.contracts > 0 {
            self.row.avg_dte = self.dte_sum / self.contracts as f64;
        }
        self.row
    }
}

/// Per-strike table for one cycle, rows in ascending strike order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StrikeTable {
    rows: Vec<StrikeRow>,
}

impl StrikeTable {
    /// Aggregate contract rows into one row per distinct strike and assign
    /// the underlying's net delta/gamma customer flow to the strike nearest
    /// spot (first row wins an exact distance tie).
    ///
    /// Contracts with a non-finite strike are dropped; empty input yields an
    /// empty table.
    pub fn build(
        contracts: &[ContractRow],
        snapshot: &UnderlyingSnapshot,
        zero_dte_threshold: f64,
    ) -> Self {
        let mut usable: Vec<&ContractRow> =
            contracts.iter().filter(|c| c.strike.is_finite()).collect();
        let dropped = contracts.len() - usable.len();
        if dropped > 0 {
            debug!(dropped, "dropped contracts with non-finite strikes");
        }
        usable.sort_by(|a, b| a.strike.total_cmp(&b.strike));

        let mut accs: Vec<StrikeAcc> = Vec::new();
        for contract in usable {
            let start_new = match accs.last() {
                Some(acc) => acc.row.strike != contract.strike,
                None => true,
            };
            if start_new {
                accs.push(StrikeAcc::new(contract.strike));
            }
            if let Some(acc) = accs.last_mut() {
                acc.absorb(contract, zero_dte_threshold);
            }
        }

        let mut rows: Vec<StrikeRow> = accs.into_iter().map(StrikeAcc::finish).collect();

        if let Some(idx) = nearest_index(&rows, snapshot.price) {
            rows[idx].net_cust_delta_flow = snapshot.deltas_buy - snapshot.deltas_sell;
            rows[idx].net_cust_gamma_flow = (snapshot.gammas_call_buy + snapshot.gammas_put_buy)
                - (snapshot.gammas_call_sell + snapshot.gammas_put_sell);
        }

        StrikeTable { rows }
    }

    /// Row whose strike is numerically closest to `price`.
    pub fn nearest_row(&self, price: f64) -> Option<&StrikeRow> {
        nearest_index(&self.rows, price).map(|i| &self.rows[i])
    }

    /// One value per row for a named column; `None` for unknown names or an
    /// empty table.
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let first = self.rows.first()?;
        first.field(name)?;
        Some(self.rows.iter().filter_map(|r| r.field(name)).collect())
    }

    pub fn rows(&self) -> &[StrikeRow] {
        &self.rows
    }

    pub(crate) fn rows_mut(&mut self) -> &mut [StrikeRow] {
        &mut self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn nearest_index(rows: &[StrikeRow], price: f64) -> Option<usize> {
    if !price.is_finite() {
        return None;
    }
    let mut best: Option<(usize, f64)> = None;
    for (i, row) in rows.iter().enumerate() {
        let dist = (row.strike - price).abs();
        match best {
            Some((_, best_dist)) if dist >= best_dist => {}
            _ => best = Some((i, dist)),
        }
    }
    best.map(|(i, _)| i)
}
