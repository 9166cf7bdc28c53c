//! Declarative market-regime classification.
//!
//! Regimes are configured, not coded: each regime name maps to a JSON rule
//! block whose keys follow the `<metric>[selector]_<operator>` grammar.
//! Blocks compile once at load into a recursive [`condition`] tree; per
//! cycle the engine walks the configured evaluation order and returns the
//! first regime whose tree passes against that cycle's metric tables.
//!
//! ```text
//! RegimeSettings ──compile──> RegimeEngine ──classify(EvalContext)──> label
//! ```
//!
//! Nothing in here errors at classification time: malformed configuration
//! degrades to conditions that can never pass, and unresolvable operands
//! make individual comparisons false.

mod condition;
mod engine;
mod rule;

pub use engine::RegimeEngine;

use std::collections::BTreeMap;

use crate::chain::StrikeTable;
use crate::types::UnderlyingMetrics;

/// One context flag produced by the host's context analysis for a cycle.
/// The engine treats flag names as opaque; any rule key whose metric name
/// matches a flag compares against the flag instead of the metric tables.
#[derive(Debug, Clone, PartialEq)]
pub enum ContextValue {
    Flag(bool),
    Number(f64),
    Text(String),
}

/// Everything a rule condition can read during one classification.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    pub underlying: &'a UnderlyingMetrics,
    pub strikes: &'a StrikeTable,
    pub context_flags: &'a BTreeMap<String, ContextValue>,
    pub dynamic_thresholds: &'a BTreeMap<String, f64>,
}
