//! In-memory intraday store for tests and diskless embeddings.

use std::collections::BTreeMap;

use crate::errors::StoreError;

use super::{CacheKey, IntradayStore};

/// Map-backed [`IntradayStore`]. Same key semantics as the file store,
/// nothing persisted.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: BTreeMap<CacheKey, Vec<f64>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct entries held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl IntradayStore for MemoryStore {
    fn load(&self, key: &CacheKey) -> Result<Vec<f64>, StoreError> {
        Ok(self.entries.get(key).cloned().unwrap_or_default())
    }

    fn save(&mut self, key: &CacheKey, values: &[f64]) -> Result<(), StoreError> {
        self.entries.insert(key.clone(), values.to_vec());
        Ok(())
    }

    fn cross_symbol_seed(&self, key: &CacheKey) -> Option<Vec<f64>> {
        // BTreeMap iteration is ordered, so the chosen peer is stable.
        for (peer, values) in &self.entries {
            if peer.metric == key.metric
                && peer.kind == key.kind
                && peer.date == key.date
                && peer.symbol != key.symbol
                && values.len() >= 10
            {
                return Some(values[values.len() - 10..].to_vec());
            }
        }
        None
    }
}
