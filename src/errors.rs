use std::path::Path;

use thiserror::Error;

/// Intraday cache store errors.
///
/// Loads that fail are treated as "no history yet" by callers; saves that
/// fail are logged and swallowed. The variants exist so embedders that call
/// the store directly can still distinguish disk trouble from bad contents.
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    /// Filesystem failure (open/read/write/rename).
    #[error("cache io error at {path}: {message}")]
    Io { path: String, message: String },

    /// File exists but its JSON payload does not deserialize.
    #[error("malformed cache entry at {path}: {message}")]
    Malformed { path: String, message: String },
}

impl StoreError {
    /// Wrap a filesystem error with the offending path.
    pub fn io(path: &Path, err: &std::io::Error) -> Self {
        StoreError::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }

    /// Wrap a deserialization error with the offending path.
    pub fn malformed(path: &Path, err: &serde_json::Error) -> Self {
        StoreError::Malformed {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }
}

/// Regime configuration loading errors.
///
/// Malformed individual rules never surface here; they are logged and
/// compiled to always-false conditions at load. This type covers failures
/// to read the configuration document itself.
#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    /// The configuration document is not valid JSON.
    #[error("regime configuration is not valid JSON: {0}")]
    Json(String),

    /// The configuration deserialized but is unusable as a whole.
    #[error("regime configuration invalid: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn json(err: &serde_json::Error) -> Self {
        ConfigError::Json(err.to_string())
    }
}

/// Errors reported by an OHLCV history provider.
///
/// Providers are external collaborators; a provider failure zeroes the ATR
/// for the cycle rather than aborting it.
#[derive(Error, Debug, Clone)]
pub enum HistoryError {
    /// No usable history for the symbol.
    #[error("ohlcv history unavailable for {symbol}: {message}")]
    Unavailable { symbol: String, message: String },
}

impl HistoryError {
    pub fn unavailable(symbol: impl Into<String>, message: impl Into<String>) -> Self {
        HistoryError::Unavailable {
            symbol: symbol.into(),
            message: message.into(),
        }
    }
}
