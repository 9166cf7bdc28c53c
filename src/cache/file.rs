//! Disk-backed intraday store: one JSON file per cache key.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::debug;

use crate::errors::StoreError;

use super::{CacheKey, IntradayEntry, IntradayStore};

/// File-backed [`IntradayStore`] rooted at a cache directory.
///
/// Writes are atomic per entry: serialize to `<name>.json.tmp`, then rename
/// over the final path. Concurrent writers can lose a sample to each other
/// but can never produce a torn file.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, &e))?;
        debug!(dir = %dir.display(), "opened intraday cache directory");
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    fn read_entry(path: &Path) -> Result<IntradayEntry, StoreError> {
        let raw = fs::read_to_string(path).map_err(|e| StoreError::io(path, &e))?;
        serde_json::from_str(&raw).map_err(|e| StoreError::malformed(path, &e))
    }
}

impl IntradayStore for FileStore {
    fn load(&self, key: &CacheKey) -> Result<Vec<f64>, StoreError> {
        let path = self.entry_path(key);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let entry = Self::read_entry(&path)?;
        // The name embeds the date, but a copied or hand-edited file can
        // still disagree with its name; trust the recorded date.
        if entry.date != key.date {
            return Ok(Vec::new());
        }
        Ok(entry.values)
    }

    fn save(&mut self, key: &CacheKey, values: &[f64]) -> Result<(), StoreError> {
        let path = self.entry_path(key);
        let tmp_path = self.dir.join(format!("{}.tmp", key.file_name()));

        let entry = IntradayEntry {
            date: key.date,
            values: values.to_vec(),
            last_updated: Utc::now().to_rfc3339(),
        };
        let json = serde_json::to_string(&entry).map_err(|e| StoreError::malformed(&path, &e))?;

        fs::write(&tmp_path, &json).map_err(|e| StoreError::io(&tmp_path, &e))?;
        fs::rename(&tmp_path, &path).map_err(|e| StoreError::io(&path, &e))?;
        Ok(())
    }

    fn cross_symbol_seed(&self, key: &CacheKey) -> Option<Vec<f64>> {
        let suffix = key.peer_suffix();
        let own_prefix = format!("{}_", key.symbol);

        let entries = fs::read_dir(&self.dir).ok()?;
        let mut names: Vec<String> = entries
            .filter_map(|e| e.ok())
            .filter_map(|e| e.file_name().into_string().ok())
            .filter(|name| name.ends_with(&suffix) && !name.starts_with(&own_prefix))
            .collect();
        // Directory order is platform-dependent; sort so the chosen peer is
        // stable across runs.
        names.sort();

        for name in names {
            let path = self.dir.join(&name);
            let entry = match Self::read_entry(&path) {
                Ok(entry) => entry,
                Err(_) => continue,
            };
            if entry.date == key.date && entry.values.len() >= 10 {
                let tail = entry.values[entry.values.len() - 10..].to_vec();
                return Some(tail);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};

    use chrono::NaiveDate;

    use super::super::CacheKind;
    use super::*;

    static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn make_test_dir() -> PathBuf {
        let id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        let dir = std::env::temp_dir().join(format!(
            "intraday_cache_test_{}_{}",
            std::process::id(),
            id
        ));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = make_test_dir();
        let mut store = FileStore::new(&dir).unwrap();
        let key = CacheKey::new("vapi_fa", "SPY", CacheKind::History, date());

        let values = vec![1.5, -2.25, 0.0, 1e9];
        store.save(&key, &values).unwrap();
        assert_eq!(store.load(&key).unwrap(), values);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = make_test_dir();
        let store = FileStore::new(&dir).unwrap();
        let key = CacheKey::new("vapi_fa", "SPY", CacheKind::History, date());
        assert!(store.load(&key).unwrap().is_empty());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn mismatched_recorded_date_loads_empty() {
        let dir = make_test_dir();
        let mut store = FileStore::new(&dir).unwrap();
        let key = CacheKey::new("dwfd", "SPY", CacheKind::History, date());
        store.save(&key, &[1.0, 2.0]).unwrap();

        // Rewrite the entry with yesterday's date under today's file name.
        let stale = IntradayEntry {
            date: date().pred_opt().unwrap(),
            values: vec![1.0, 2.0],
            last_updated: Utc::now().to_rfc3339(),
        };
        fs::write(
            dir.join(key.file_name()),
            serde_json::to_string(&stale).unwrap(),
        )
        .unwrap();

        assert!(store.load(&key).unwrap().is_empty());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn malformed_file_is_a_store_error_and_append_degrades() {
        let dir = make_test_dir();
        let mut store = FileStore::new(&dir).unwrap();
        let key = CacheKey::new("tw_laf", "SPY", CacheKind::History, date());
        fs::write(dir.join(key.file_name()), "{not json").unwrap();

        assert!(store.load(&key).is_err());

        // Append falls back to the baseline seed instead of failing.
        let values = store.append(&key, 7.0, 200);
        assert_eq!(values.len(), 11);
        assert_eq!(*values.last().unwrap(), 7.0);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn cross_symbol_seed_scans_peers_deterministically() {
        let dir = make_test_dir();
        let mut store = FileStore::new(&dir).unwrap();

        let qqq = CacheKey::new("vapi_fa", "QQQ", CacheKind::History, date());
        store.save(&qqq, &(0..12).map(f64::from).collect::<Vec<_>>()).unwrap();
        let iwm = CacheKey::new("vapi_fa", "IWM", CacheKind::History, date());
        store.save(&iwm, &(100..112).map(f64::from).collect::<Vec<_>>()).unwrap();
        // A different metric must never leak in.
        let other_metric = CacheKey::new("dwfd", "AAPL", CacheKind::History, date());
        store.save(&other_metric, &(0..20).map(f64::from).collect::<Vec<_>>()).unwrap();

        let key = CacheKey::new("vapi_fa", "SPY", CacheKind::History, date());
        let seed = store.cross_symbol_seed(&key).unwrap();
        // "IWM_..." sorts before "QQQ_...".
        assert_eq!(seed, (102..112).map(f64::from).collect::<Vec<_>>());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn append_is_bounded_and_persists_across_instances() {
        let dir = make_test_dir();
        let key = CacheKey::new("dwfd", "SPY", CacheKind::History, date());
        {
            let mut store = FileStore::new(&dir).unwrap();
            for i in 0..250 {
                let values = store.append(&key, i as f64, 200);
                assert!(values.len() <= 200);
                assert_eq!(*values.last().unwrap(), i as f64);
            }
        }
        // A fresh instance pointed at the same directory sees the history.
        let store = FileStore::new(&dir).unwrap();
        let values = store.load(&key).unwrap();
        assert_eq!(values.len(), 200);
        assert_eq!(*values.last().unwrap(), 249.0);

        let _ = fs::remove_dir_all(&dir);
    }
}
