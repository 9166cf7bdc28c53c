//! Foundational stage: net customer Greek flow scalars from the snapshot.

use tracing::debug;

use crate::types::{UnderlyingMetrics, UnderlyingSnapshot};

/// Daily net customer flows, bought minus sold per Greek. Gamma nets the
/// call and put sides separately before differencing.
pub(crate) fn calculate(und: &mut UnderlyingMetrics, snapshot: &UnderlyingSnapshot) {
    und.net_cust_delta_flow_und = snapshot.deltas_buy - snapshot.deltas_sell;
    und.net_cust_gamma_flow_und = (snapshot.gammas_call_buy + snapshot.gammas_put_buy)
        - (snapshot.gammas_call_sell + snapshot.gammas_put_sell);
    und.net_cust_vega_flow_und = snapshot.vegas_buy - snapshot.vegas_sell;
    und.net_cust_theta_flow_und = snapshot.thetas_buy - snapshot.thetas_sell;

    debug!(
        symbol = %snapshot.symbol,
        delta = und.net_cust_delta_flow_und,
        gamma = und.net_cust_gamma_flow_und,
        vega = und.net_cust_vega_flow_und,
        theta = und.net_cust_theta_flow_und,
        "foundational flows"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nets_buy_minus_sell_per_greek() {
        let mut snap = UnderlyingSnapshot {
            symbol: "SPY".to_string(),
            price: 100.0,
            day_open_price: None,
            prev_day_close_price: None,
            implied_volatility: 0.2,
            deltas_buy: 100.0,
            deltas_sell: 40.0,
            gammas_call_buy: 10.0,
            gammas_put_buy: 6.0,
            gammas_call_sell: 3.0,
            gammas_put_sell: 1.0,
            vegas_buy: 20.0,
            vegas_sell: 25.0,
            thetas_buy: 7.0,
            thetas_sell: 2.0,
            call_gxoi: 0.0,
            put_gxoi: 0.0,
            prior_regime: None,
        };
        let mut und = UnderlyingMetrics::from_snapshot(&snap);
        calculate(&mut und, &snap);
        assert_eq!(und.net_cust_delta_flow_und, 60.0);
        assert_eq!(und.net_cust_gamma_flow_und, 12.0);
        assert_eq!(und.net_cust_vega_flow_und, -5.0);
        assert_eq!(und.net_cust_theta_flow_und, 5.0);

        // All-zero snapshot nets to zero.
        snap.deltas_buy = 0.0;
        snap.deltas_sell = 0.0;
        let mut und = UnderlyingMetrics::from_snapshot(&snap);
        calculate(&mut und, &snap);
        assert_eq!(und.net_cust_delta_flow_und, 0.0);
    }
}
