//! Final cycle pass: coerce non-finite metric values to zero and clamp the
//! bounded fields.
//!
//! Upstream stages divide by near-zero denominators and exponentiate; this
//! pass guarantees consumers (the rule engine, serialization) only ever see
//! finite numbers.

use tracing::warn;

use crate::chain::StrikeTable;
use crate::types::UnderlyingMetrics;

pub(crate) fn run(strikes: &mut StrikeTable, und: &mut UnderlyingMetrics) {
    for row in strikes.rows_mut() {
        let strike = row.strike;
        for (name, value) in row.numeric_fields_mut() {
            scrub(name, value, Some(strike));
        }
        // Flow alignment is a ratio with a tiny denominator guard; cap the
        // tail. Concentration indices are Herfindahl readings on [0, 1].
        row.a_dag_flow_alignment = row.a_dag_flow_alignment.clamp(-10.0, 10.0);
        row.vci_0dte = row.vci_0dte.clamp(0.0, 1.0);
        row.gci_0dte = row.gci_0dte.clamp(0.0, 1.0);
        row.dci_0dte = row.dci_0dte.clamp(0.0, 1.0);
    }
    for (name, value) in und.numeric_fields_mut() {
        scrub(name, value, None);
    }
}

fn scrub(name: &str, value: &mut f64, strike: Option<f64>) {
    if value.is_finite() {
        return;
    }
    match strike {
        Some(strike) => warn!(field = name, strike, "non-finite metric coerced to zero"),
        None => warn!(field = name, "non-finite metric coerced to zero"),
    }
    *value = 0.0;
}

#[cfg(test)]
mod tests {
    use crate::types::{ContractRow, OptionKind, UnderlyingSnapshot};

    use super::*;

    fn snapshot() -> UnderlyingSnapshot {
        UnderlyingSnapshot {
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
        }
    }

    fn one_row_table() -> StrikeTable {
        let contract = ContractRow {
            strike: 100.0,
            kind: OptionKind::Call,
            dte: 10.0,
            dxoi: 50.0,
            gxoi: 25.0,
            vxoi: 0.0,
            txoi: 0.0,
            charmxoi: 0.0,
            vannaxoi: 0.0,
            vommaxoi: 0.0,
            value_bs: 0.0,
            volm_bs: 0.0,
        };
        StrikeTable::build(&[contract], &snapshot(), 1.0)
    }

    #[test]
    fn non_finite_values_become_zero() {
        let mut table = one_row_table();
        table.rows_mut()[0].a_dag_exposure = f64::NAN;
        table.rows_mut()[0].sgdhp_score = f64::INFINITY;
        let mut und = UnderlyingMetrics::from_snapshot(&snapshot());
        und.gib_oi_based_und = f64::NEG_INFINITY;

        run(&mut table, &mut und);
        assert_eq!(table.rows()[0].a_dag_exposure, 0.0);
        assert_eq!(table.rows()[0].sgdhp_score, 0.0);
        assert_eq!(und.gib_oi_based_und, 0.0);
    }

    #[test]
    fn bounded_fields_are_clamped() {
        let mut table = one_row_table();
        {
            let row = &mut table.rows_mut()[0];
            row.a_dag_flow_alignment = 25.0;
            row.vci_0dte = 1.5;
            row.gci_0dte = -0.2;
        }
        let mut und = UnderlyingMetrics::from_snapshot(&snapshot());
        run(&mut table, &mut und);

        let row = &table.rows()[0];
        assert_eq!(row.a_dag_flow_alignment, 10.0);
        assert_eq!(row.vci_0dte, 1.0);
        assert_eq!(row.gci_0dte, 0.0);
    }

    #[test]
    fn negative_alignment_clamps_symmetrically() {
        let mut table = one_row_table();
        table.rows_mut()[0].a_dag_flow_alignment = -25.0;
        let mut und = UnderlyingMetrics::from_snapshot(&snapshot());
        run(&mut table, &mut und);
        assert_eq!(table.rows()[0].a_dag_flow_alignment, -10.0);
    }

    #[test]
    fn finite_values_pass_through_untouched() {
        let mut table = one_row_table();
        let mut und = UnderlyingMetrics::from_snapshot(&snapshot());
        und.gib_oi_based_und = 123.456;
        run(&mut table, &mut und);
        assert_eq!(table.rows()[0].total_dxoi, 50.0);
        assert_eq!(und.gib_oi_based_und, 123.456);
    }
}
