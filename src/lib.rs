//! Options-chain analytics core: layered derived metrics over a raw option
//! chain plus a declarative market-regime classifier.
//!
//! One [`AnalyticsEngine::run_cycle`] call takes the fetched contract rows
//! and underlying snapshot, aggregates them per strike, runs the staged
//! metric pipeline (foundational flows, adaptive exposure scores, heatmap
//! composites, underlying aggregates, cache-backed enhanced flow, ATR),
//! sanitizes the results, and classifies the market regime from the
//! configured rule blocks.
//!
//! ```text
//! ContractRow*, UnderlyingSnapshot
//!         │
//!         ▼
//!   MetricsPipeline ── IntradayStore (FileStore | MemoryStore)
//!         │                   OhlcvProvider (host-supplied)
//!         ▼
//!   StrikeTable + UnderlyingMetrics
//!         │
//!         ▼
//!   RegimeEngine ── regime label
//! ```
//!
//! The crate does no I/O beyond the intraday cache store and emits no logs
//! except through `tracing`; hosts own subscriber installation, fetching,
//! and scheduling.

#![deny(unreachable_pub)]

mod cache;
mod chain;
mod config;
mod engine;
mod errors;
mod normalize;
mod pipeline;
mod regime;
mod types;

pub use cache::{CacheKey, CacheKind, FileStore, IntradayStore, MemoryStore};
pub use chain::{StrikeRow, StrikeTable};
pub use config::{
    AdaptiveParams, AlignmentCoeffs, AnalyticsConfig, DteScaling, FlowParams, HeatmapParams,
    RegimeSettings, SessionParams, UgchWeights,
};
pub use engine::{AnalyticsEngine, CycleInput, CycleOutput};
pub use errors::{ConfigError, HistoryError, StoreError};
pub use normalize::{percentile_gauge, FlowNormalizer};
pub use pipeline::{EmptyHistory, MetricsPipeline, OhlcvProvider, Stage};
pub use regime::{ContextValue, EvalContext, RegimeEngine};
pub use types::{ContractRow, OhlcvBar, OptionKind, UnderlyingMetrics, UnderlyingSnapshot};
