//! Metric dependency orchestrator.
//!
//! One analysis cycle runs five calculation stages over the (strike table,
//! underlying metrics) pair:
//!
//! ```text
//! foundational ──┬─> adaptive ──┐
//!                └──────────────┴─> aggregates ─> enhanced_flow
//! atr (independent)
//! ```
//!
//! Stage completion is tracked in a per-cycle [`CycleState`] so one cycle can
//! never observe another's progress. A stage whose prerequisites have not
//! completed is skipped with a warning rather than run out of order. The
//! cycle ends with a sanitization pass that coerces NaN/Inf outputs to zero
//! and clamps ratio- and index-like fields.

mod adaptive;
mod aggregates;
mod atr;
mod flow;
mod foundational;
mod heatmap;
mod sanitize;

pub use atr::{EmptyHistory, OhlcvProvider};

use chrono::NaiveDateTime;
use tracing::{debug, warn};

use crate::cache::IntradayStore;
use crate::chain::StrikeTable;
use crate::config::{AdaptiveParams, AnalyticsConfig};
use crate::normalize::FlowNormalizer;
use crate::types::{ContractRow, UnderlyingMetrics, UnderlyingSnapshot};

/// Sign with exact-zero semantics: positive 1, negative -1, zero (or NaN) 0.
/// `f64::signum` maps 0.0 to 1.0, which breaks alignment products.
pub(crate) fn sign(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

// ===== Stage machine =====

/// The five calculation stages, in nominal execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Foundational,
    Adaptive,
    Aggregates,
    EnhancedFlow,
    Atr,
}

impl Stage {
    pub(crate) fn prerequisites(self) -> &'static [Stage] {
        match self {
            Stage::Foundational | Stage::Atr => &[],
            Stage::Adaptive => &[Stage::Foundational],
            Stage::Aggregates => &[Stage::Foundational, Stage::Adaptive],
            Stage::EnhancedFlow => &[Stage::Aggregates],
        }
    }

    pub(crate) fn name(self) -> &'static str {
        match self {
            Stage::Foundational => "foundational",
            Stage::Adaptive => "adaptive",
            Stage::Aggregates => "aggregates",
            Stage::EnhancedFlow => "enhanced_flow",
            Stage::Atr => "atr",
        }
    }

    fn index(self) -> usize {
        match self {
            Stage::Foundational => 0,
            Stage::Adaptive => 1,
            Stage::Aggregates => 2,
            Stage::EnhancedFlow => 3,
            Stage::Atr => 4,
        }
    }
}

/// Per-cycle stage completion tracking. Created fresh at the top of every
/// `calculate_all` invocation.
#[derive(Debug, Default)]
pub(crate) struct CycleState {
    completed: [bool; 5],
}

impl CycleState {
    pub(crate) fn ready(&self, stage: Stage) -> bool {
        stage
            .prerequisites()
            .iter()
            .all(|p| self.completed[p.index()])
    }

    pub(crate) fn complete(&mut self, stage: Stage) {
        self.completed[stage.index()] = true;
    }

    /// Gate helper: true when the stage may run; logs the skip otherwise.
    fn enter(&self, stage: Stage) -> bool {
        if self.ready(stage) {
            return true;
        }
        warn!(stage = stage.name(), "skipping stage, prerequisites incomplete");
        false
    }
}

// ===== Market context =====

/// Volatility context from underlying IV, keying the adaptive alpha
/// multipliers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum VolContext {
    High,
    Normal,
    Low,
}

impl VolContext {
    pub(crate) fn from_iv(iv: f64, params: &AdaptiveParams) -> Self {
        if iv > params.high_vol_threshold {
            VolContext::High
        } else if iv < params.low_vol_threshold {
            VolContext::Low
        } else {
            VolContext::Normal
        }
    }

    pub(crate) fn key(self) -> &'static str {
        match self {
            VolContext::High => "HIGH_VOL",
            VolContext::Normal => "NORMAL_VOL",
            VolContext::Low => "LOW_VOL",
        }
    }
}

/// DTE context from the table's average days-to-expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DteContext {
    ZeroDte,
    Short,
    Normal,
    Long,
}

impl DteContext {
    pub(crate) fn from_avg_dte(avg_dte: f64) -> Self {
        if avg_dte <= 1.0 {
            DteContext::ZeroDte
        } else if avg_dte <= 7.0 {
            DteContext::Short
        } else if avg_dte <= 45.0 {
            DteContext::Normal
        } else {
            DteContext::Long
        }
    }

    pub(crate) fn scaling(self, cfg: &crate::config::DteScaling) -> f64 {
        match self {
            DteContext::ZeroDte => cfg.zero_dte,
            DteContext::Short => cfg.short,
            DteContext::Normal => cfg.normal,
            DteContext::Long => cfg.long,
        }
    }
}

// ===== Pipeline =====

/// The full metric pipeline for one process: configuration, the intraday
/// cache store, and the in-memory flow normalizer.
///
/// One instance serves many cycles and symbols; each `calculate_all` call is
/// one cycle and owns its tables exclusively.
pub struct MetricsPipeline<S: IntradayStore> {
    config: AnalyticsConfig,
    store: S,
    normalizer: FlowNormalizer,
}

impl<S: IntradayStore> MetricsPipeline<S> {
    pub fn new(config: AnalyticsConfig, store: S) -> Self {
        Self {
            config,
            store,
            normalizer: FlowNormalizer::new(),
        }
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    /// Run one full cycle: aggregate the chain, run every stage in
    /// dependency order, sanitize, and return the enriched tables.
    ///
    /// `now` is the cycle clock (session arithmetic and cache dating);
    /// `dte_max` bounds the ATR lookback; `history` supplies daily bars.
    /// Empty contract input runs in underlying-only mode: the strike table
    /// stays empty and strike-derived aggregates read zero.
    pub fn calculate_all(
        &mut self,
        contracts: &[ContractRow],
        snapshot: &UnderlyingSnapshot,
        now: NaiveDateTime,
        dte_max: u32,
        history: &dyn OhlcvProvider,
    ) -> (StrikeTable, UnderlyingMetrics) {
        let mut state = CycleState::default();
        let mut und = UnderlyingMetrics::from_snapshot(snapshot);
        let mut strikes = StrikeTable::default();

        debug!(
            symbol = %snapshot.symbol,
            contracts = contracts.len(),
            "starting metric cycle"
        );

        if state.enter(Stage::Foundational) {
            foundational::calculate(&mut und, snapshot);
            state.complete(Stage::Foundational);
        }

        if state.enter(Stage::Adaptive) {
            strikes = StrikeTable::build(
                contracts,
                snapshot,
                self.config.adaptive.zero_dte_threshold,
            );
            if strikes.is_empty() {
                debug!(symbol = %snapshot.symbol, "empty strike table, underlying-only cycle");
            } else {
                adaptive::calculate(
                    &mut strikes,
                    &und,
                    snapshot,
                    &self.config.adaptive,
                    &mut self.normalizer,
                );
                heatmap::calculate(
                    &mut strikes,
                    snapshot,
                    &self.config.heatmap,
                    &mut self.normalizer,
                );
            }
            state.complete(Stage::Adaptive);
        }

        if state.enter(Stage::Aggregates) {
            aggregates::calculate(&mut und, &strikes);
            aggregates::gib_family(&mut und, snapshot, now, &self.config.session);
            state.complete(Stage::Aggregates);
        }

        if state.enter(Stage::EnhancedFlow) {
            flow::calculate(
                &mut und,
                snapshot,
                now.date(),
                &mut self.store,
                &self.config.flow,
            );
            state.complete(Stage::EnhancedFlow);
        }

        if state.enter(Stage::Atr) {
            und.atr_und = atr::calculate(&snapshot.symbol, dte_max, history);
            state.complete(Stage::Atr);
        }

        sanitize::run(&mut strikes, &mut und);

        debug!(
            symbol = %snapshot.symbol,
            strikes = strikes.len(),
            regime = %und.current_market_regime,
            "metric cycle complete"
        );
        (strikes, und)
    }
}
