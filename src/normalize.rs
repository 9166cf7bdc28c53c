//! Statistical helpers: the in-memory flow normalizer and the percentile
//! gauge.
//!
//! The normalizer backs the per-strike z-scoring used by the adaptive and
//! heatmap calculators. Each (symbol, series) pair owns an isolated rolling
//! history so one series' scale never bleeds into another's. The gauge maps
//! a raw value to a bounded [-3, 3] reading by percentile rank against an
//! intraday history list.

use std::collections::HashMap;

/// Rolling-history cap per (symbol, series) key.
const HISTORY_CAP: usize = 100;

/// Histories longer than this normalize against their own mean/std instead
/// of the current batch's.
const MIN_HISTORY: usize = 10;

/// Arithmetic mean; zero for an empty slice.
pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation; zero for an empty slice.
pub(crate) fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

/// Sample standard deviation (n-1 denominator); zero below two samples.
pub(crate) fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var =
        values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / (values.len() as f64 - 1.0);
    var.sqrt()
}

/// Linear-interpolation quantile of `values` at percentile `p` (0..=100).
/// `None` for an empty slice.
pub(crate) fn percentile_linear(values: &[f64], p: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted: Vec<f64> = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let p = p.clamp(0.0, 100.0);
    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        return Some(sorted[lower]);
    }
    let frac = rank - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * frac)
}

/// Percentile-rank gauge of `current` against `history`, on [-3, 3].
///
/// Fewer than two history points reads neutral (0). Otherwise `current` is
/// ranked within the sorted union of history and itself; exact ties resolve
/// to the middle occurrence. 0th percentile maps to -3, 50th to 0, 100th
/// to +3.
pub fn percentile_gauge(history: &[f64], current: f64) -> f64 {
    if history.len() < 2 {
        return 0.0;
    }
    let mut all: Vec<f64> = Vec::with_capacity(history.len() + 1);
    all.extend_from_slice(history);
    all.push(current);
    all.sort_by(f64::total_cmp);

    let positions: Vec<usize> = all
        .iter()
        .enumerate()
        .filter(|(_, v)| **v == current)
        .map(|(i, _)| i)
        .collect();
    // NaN never equals itself; an unrankable value reads neutral.
    if positions.is_empty() {
        return 0.0;
    }
    let position = positions[positions.len() / 2];

    let percentile = position as f64 / (all.len() - 1) as f64;
    ((percentile - 0.5) * 6.0).clamp(-3.0, 3.0)
}

/// In-memory flow normalizer with per-(symbol, series) rolling histories.
///
/// No disk involvement; history lives for the process lifetime and caps at
/// [`HISTORY_CAP`] samples per key.
#[derive(Debug, Default)]
pub struct FlowNormalizer {
    history: HashMap<(String, String), Vec<f64>>,
}

impl FlowNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Z-score `values` for the given (symbol, series) key.
    ///
    /// The batch first joins the rolling history (newest-kept truncation).
    /// With more than [`MIN_HISTORY`] accumulated samples and a nonzero
    /// historical std, values normalize against the history; otherwise
    /// against the batch's own mean/std with a 1e-6 floor.
    pub fn normalize(&mut self, symbol: &str, series: &str, values: &[f64]) -> Vec<f64> {
        if values.is_empty() {
            return Vec::new();
        }
        let key = (symbol.to_string(), series.to_string());
        let hist = self.history.entry(key).or_default();
        hist.extend_from_slice(values);
        if hist.len() > HISTORY_CAP {
            let excess = hist.len() - HISTORY_CAP;
            hist.drain(..excess);
        }

        if hist.len() > MIN_HISTORY {
            let hist_mean = mean(hist);
            let hist_std = population_std(hist);
            if hist_std > 0.0 {
                return values.iter().map(|v| (v - hist_mean) / hist_std).collect();
            }
        }

        let batch_mean = mean(values);
        let batch_std = population_std(values);
        values
            .iter()
            .map(|v| (v - batch_mean) / (batch_std + 1e-6))
            .collect()
    }
}
