//! ATR stage: average true range of the underlying's daily bars.
//!
//! History comes through the [`OhlcvProvider`] seam so hosts can plug in
//! whatever bar feed they have; the pipeline only ever asks for one symbol's
//! recent dailies. A provider failure degrades to zero rather than failing
//! the cycle.

use tracing::{error, warn};

use crate::errors::HistoryError;
use crate::types::OhlcvBar;

/// Daily-bar source for the ATR calculation. Bars are expected oldest first.
pub trait OhlcvProvider {
    fn daily_bars(&self, symbol: &str, lookback_days: u32) -> Result<Vec<OhlcvBar>, HistoryError>;
}

/// Provider with no data, for hosts that run without a bar feed. ATR reads
/// zero under it.
pub struct EmptyHistory;

impl OhlcvProvider for EmptyHistory {
    fn daily_bars(
        &self,
        _symbol: &str,
        _lookback_days: u32,
    ) -> Result<Vec<OhlcvBar>, HistoryError> {
        Ok(Vec::new())
    }
}

const ATR_COM: f64 = 14.0;
const ATR_MIN_PERIODS: usize = 14;

pub(crate) fn calculate(symbol: &str, dte_max: u32, provider: &dyn OhlcvProvider) -> f64 {
    let lookback = dte_max.max(ATR_MIN_PERIODS as u32);
    let bars = match provider.daily_bars(symbol, lookback) {
        Ok(bars) => bars,
        Err(err) => {
            error!(symbol = %symbol, %err, "daily bar fetch failed, ATR reads zero");
            return 0.0;
        }
    };
    if bars.len() < 2 {
        warn!(symbol = %symbol, bars = bars.len(), "not enough daily bars for ATR");
        return 0.0;
    }
    ewm_mean(&true_ranges(&bars), ATR_COM, ATR_MIN_PERIODS)
}

/// True range per bar: the day's range widened by any gap from the prior
/// close. The first bar has no prior close and uses the plain range.
fn true_ranges(bars: &[OhlcvBar]) -> Vec<f64> {
    let mut out = Vec::with_capacity(bars.len());
    for (i, bar) in bars.iter().enumerate() {
        let tr = if i == 0 {
            bar.high - bar.low
        } else {
            let prev_close = bars[i - 1].close;
            (bar.high - bar.low)
                .max((bar.high - prev_close).abs())
                .max((bar.low - prev_close).abs())
        };
        out.push(tr);
    }
    out
}

/// Exponentially weighted mean with center-of-mass `com`, in the adjusted
/// form: newest sample weighted 1, each older one decayed by (1 - alpha).
/// Short series read zero.
fn ewm_mean(values: &[f64], com: f64, min_periods: usize) -> f64 {
    if values.len() < min_periods {
        return 0.0;
    }
    let decay = com / (com + 1.0);
    let mut num = 0.0;
    let mut den = 0.0;
    for (i, v) in values.iter().rev().enumerate() {
        let w = decay.powi(i as i32);
        num += w * v;
        den += w;
    }
    num / den
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use chrono::NaiveDate;

    use super::*;

    struct ConstantBars {
        count: usize,
        requested: Cell<u32>,
    }

    impl ConstantBars {
        fn new(count: usize) -> Self {
            Self {
                count,
                requested: Cell::new(0),
            }
        }
    }

    impl OhlcvProvider for ConstantBars {
        fn daily_bars(
            &self,
            _symbol: &str,
            lookback_days: u32,
        ) -> Result<Vec<OhlcvBar>, HistoryError> {
            self.requested.set(lookback_days);
            let start = NaiveDate::from_ymd_opt(2025, 4, 1).unwrap();
            Ok((0..self.count)
                .map(|i| OhlcvBar {
                    date: start + chrono::Days::new(i as u64),
                    open: 100.0,
                    high: 105.0,
                    low: 95.0,
                    close: 100.0,
                    volume: 1_000_000.0,
                })
                .collect())
        }
    }

    struct FailingProvider;

    impl OhlcvProvider for FailingProvider {
        fn daily_bars(
            &self,
            symbol: &str,
            _lookback_days: u32,
        ) -> Result<Vec<OhlcvBar>, HistoryError> {
            Err(HistoryError::unavailable(symbol, "feed offline"))
        }
    }

    #[test]
    fn no_bars_reads_zero() {
        assert_eq!(calculate("SPY", 45, &EmptyHistory), 0.0);
    }

    #[test]
    fn provider_failure_reads_zero() {
        assert_eq!(calculate("SPY", 45, &FailingProvider), 0.0);
    }

    #[test]
    fn short_history_reads_zero() {
        assert_eq!(calculate("SPY", 45, &ConstantBars::new(5)), 0.0);
    }

    #[test]
    fn constant_ranges_converge_to_the_range() {
        let atr = calculate("SPY", 45, &ConstantBars::new(20));
        assert!((atr - 10.0).abs() < 1e-9);
    }

    #[test]
    fn lookback_floors_at_the_min_periods() {
        let provider = ConstantBars::new(20);
        calculate("SPY", 45, &provider);
        assert_eq!(provider.requested.get(), 45);
        calculate("SPY", 5, &provider);
        assert_eq!(provider.requested.get(), 14);
    }

    #[test]
    fn true_range_includes_overnight_gaps() {
        let d = NaiveDate::from_ymd_opt(2025, 4, 1).unwrap();
        let bar = |date, high: f64, low: f64, close: f64| OhlcvBar {
            date,
            open: low,
            high,
            low,
            close,
            volume: 0.0,
        };
        let bars = vec![
            bar(d, 105.0, 95.0, 100.0),
            // Gapped up: the range is 1 but the jump from 100 is 4.
            bar(d + chrono::Days::new(1), 104.0, 103.0, 103.5),
        ];
        assert_eq!(true_ranges(&bars), vec![10.0, 4.0]);
    }

    #[test]
    fn recent_spike_pulls_the_weighted_mean_up() {
        let mut tr = vec![10.0; 13];
        tr.push(20.0);
        let atr = ewm_mean(&tr, 14.0, 14);
        assert!(atr > 10.0 && atr < 12.0);
        // Oldest-heavy ordering would barely move it.
        let mut reversed = tr.clone();
        reversed.reverse();
        assert!(ewm_mean(&reversed, 14.0, 14) < atr);
    }
}
