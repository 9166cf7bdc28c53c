//! Isolated intraday history cache.
//!
//! Each enhanced-flow metric keeps a bounded per-symbol, per-trading-date
//! history of raw values so percentile gauges have context from minute one.
//! Entries are partitioned by an explicit [`CacheKey`] so no two
//! (metric, symbol) pairs ever share state, and persisted as one JSON file
//! per key under the configured cache directory.
//!
//! The store sits behind the [`IntradayStore`] trait: [`FileStore`] is the
//! disk-backed production implementation, [`MemoryStore`] substitutes for it
//! in tests and diskless embeddings.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::StoreError;

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Cache partition family. History entries hold intraday raw-value series;
/// normalization entries are reserved for hosts that persist normalizer
/// state alongside them.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum CacheKind {
    History,
    Normalization,
}

/// Fully-qualified address of one intraday cache entry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CacheKey {
    pub metric: String,
    pub symbol: String,
    pub kind: CacheKind,
    pub date: NaiveDate,
}

impl CacheKey {
    pub fn new(
        metric: impl Into<String>,
        symbol: impl Into<String>,
        kind: CacheKind,
        date: NaiveDate,
    ) -> Self {
        Self {
            metric: metric.into(),
            symbol: symbol.into(),
            kind,
            date,
        }
    }

    /// On-disk file name for this key.
    pub(crate) fn file_name(&self) -> String {
        format!("{}{}", self.symbol, self.peer_suffix())
    }

    /// File-name tail shared by every symbol's entry for the same
    /// (metric, kind, date), used for the cross-symbol seed scan.
    pub(crate) fn peer_suffix(&self) -> String {
        match self.kind {
            CacheKind::History => format!("_{}_{}.json", self.metric, self.date),
            CacheKind::Normalization => {
                format!("_{}_normalization_{}.json", self.metric, self.date)
            }
        }
    }
}

/// Persisted shape of one cache entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct IntradayEntry {
    pub date: NaiveDate,
    pub values: Vec<f64>,
    /// RFC 3339 stamp of the last write. Informational only.
    pub last_updated: String,
}

/// Storage backend for intraday metric histories.
pub trait IntradayStore {
    /// Today's history for the key; an entry recorded under a different date
    /// than the key's reads as empty.
    fn load(&self, key: &CacheKey) -> Result<Vec<f64>, StoreError>;

    /// Replace the key's entry with `values`, atomically where the backend
    /// allows it.
    fn save(&mut self, key: &CacheKey, values: &[f64]) -> Result<(), StoreError>;

    /// Last 10 values from any other symbol's entry for the same
    /// (metric, kind, date) holding at least 10 values, scanned in a
    /// deterministic order. `None` when no peer qualifies.
    fn cross_symbol_seed(&self, key: &CacheKey) -> Option<Vec<f64>>;

    /// Append one observation and return the updated history.
    ///
    /// 1. Load today's history (a failed load degrades to empty, logged).
    /// 2. If empty, seed: cross-symbol warm start, else the metric's
    ///    synthetic baseline.
    /// 3. Push `value`, truncate oldest-first to `max_size`.
    /// 4. Save (a failed save is logged and swallowed).
    ///
    /// The returned list's last element is always `value` unless truncation
    /// removed it, which cannot happen for `max_size >= 1`.
    fn append(&mut self, key: &CacheKey, value: f64, max_size: usize) -> Vec<f64> {
        let mut values = match self.load(key) {
            Ok(v) => v,
            Err(err) => {
                warn!(
                    metric = %key.metric,
                    symbol = %key.symbol,
                    %err,
                    "intraday cache load failed, starting from empty history"
                );
                Vec::new()
            }
        };

        if values.is_empty() {
            values = match self.cross_symbol_seed(key) {
                Some(seed) => {
                    debug!(
                        metric = %key.metric,
                        symbol = %key.symbol,
                        samples = seed.len(),
                        "seeded intraday cache from peer symbol"
                    );
                    seed
                }
                None => {
                    debug!(
                        metric = %key.metric,
                        symbol = %key.symbol,
                        "seeded intraday cache with baseline values"
                    );
                    baseline_for(&key.metric)
                }
            };
        }

        values.push(value);
        if values.len() > max_size {
            let excess = values.len() - max_size;
            values.drain(..excess);
        }

        if let Err(err) = self.save(key, &values) {
            warn!(
                metric = %key.metric,
                symbol = %key.symbol,
                %err,
                "intraday cache save failed, continuing with in-memory values"
            );
        }
        values
    }
}

/// Synthetic cold-start history for a metric, scaled to its typical range
/// and centered on zero.
pub(crate) fn baseline_for(metric: &str) -> Vec<f64> {
    match metric {
        "vapi_fa" => vec![
            0.0, 1000.0, -1000.0, 2000.0, -2000.0, 500.0, -500.0, 1500.0, -1500.0, 0.0,
        ],
        "dwfd" => vec![
            0.0, 50.0, -50.0, 100.0, -100.0, 25.0, -25.0, 75.0, -75.0, 0.0,
        ],
        "tw_laf" => vec![
            0.0, 5000.0, -5000.0, 10000.0, -10000.0, 2500.0, -2500.0, 7500.0, -7500.0, 0.0,
        ],
        _ => vec![0.0, 10.0, -10.0, 20.0, -20.0, 5.0, -5.0, 15.0, -15.0, 0.0],
    }
}
