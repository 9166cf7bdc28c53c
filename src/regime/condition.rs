//! Compiled condition trees and their evaluation.
//!
//! A rule block is a JSON object: plain keys AND together, a `_any_of`
//! array of nested blocks ORs, nesting freely. Unparseable keys compile to
//! a `Never` node so a typo can only ever make a regime unmatchable, not
//! falsely matched.

use serde_json::{Map, Value};
use tracing::warn;

use crate::normalize::{mean, percentile_linear, sample_std};

use super::rule::{AggFn, CompareOp, ParsedRule, RuleTarget, Selector, TargetValue};
use super::{ContextValue, EvalContext};

#[derive(Debug, Clone)]
pub(crate) enum Condition {
    Leaf { rule: ParsedRule, target: RuleTarget },
    /// Placeholder for a key that failed to compile.
    Never,
    All(Vec<Condition>),
    Any(Vec<Condition>),
}

impl Condition {
    /// Compile one rule block. Never fails: broken pieces become `Never`.
    pub(crate) fn compile(block: &Map<String, Value>) -> Condition {
        let mut children = Vec::with_capacity(block.len());
        for (key, value) in block {
            if key == "_any_of" {
                children.push(compile_any_of(value));
                continue;
            }
            match ParsedRule::parse(key) {
                Ok(rule) => children.push(Condition::Leaf {
                    rule,
                    target: RuleTarget::compile(value),
                }),
                Err(err) => {
                    warn!(key = %key, %err, "unparseable rule key, condition can never pass");
                    children.push(Condition::Never);
                }
            }
        }
        Condition::All(children)
    }

    pub(crate) fn evaluate(&self, ctx: &EvalContext<'_>) -> bool {
        match self {
            Condition::All(children) => children.iter().all(|c| c.evaluate(ctx)),
            Condition::Any(children) => children.iter().any(|c| c.evaluate(ctx)),
            Condition::Never => false,
            Condition::Leaf { rule, target } => evaluate_leaf(rule, target, ctx),
        }
    }
}

fn compile_any_of(value: &Value) -> Condition {
    let Some(blocks) = value.as_array() else {
        warn!("_any_of must hold an array of blocks, condition can never pass");
        return Condition::Never;
    };
    let children = blocks
        .iter()
        .map(|block| match block.as_object() {
            Some(obj) => Condition::compile(obj),
            None => {
                warn!("_any_of entry is not an object, branch can never pass");
                Condition::Never
            }
        })
        .collect();
    Condition::Any(children)
}

fn evaluate_leaf(rule: &ParsedRule, target: &RuleTarget, ctx: &EvalContext<'_>) -> bool {
    // Context flags shadow the metric namespace for this cycle.
    if let Some(flag) = ctx.context_flags.get(&rule.metric) {
        return match flag {
            ContextValue::Flag(b) => compare_flag(*b, rule.op, target),
            ContextValue::Number(n) => compare_number(*n, rule.op, target, ctx),
            ContextValue::Text(s) => compare_text(s, rule.op, target),
        };
    }

    match &rule.selector {
        Selector::Underlying => {
            if let Some(v) = ctx.underlying.value(&rule.metric) {
                compare_number(v, rule.op, target, ctx)
            } else if let Some(t) = ctx.underlying.text(&rule.metric) {
                compare_text(t, rule.op, target)
            } else {
                false
            }
        }
        Selector::Atm => ctx
            .strikes
            .nearest_row(ctx.underlying.price)
            .and_then(|row| row.field(&rule.metric))
            .map(|v| compare_number(v, rule.op, target, ctx))
            .unwrap_or(false),
        Selector::Agg(agg) => ctx
            .strikes
            .column(&rule.metric)
            .map(|column| compare_number(reduce(*agg, &column), rule.op, target, ctx))
            .unwrap_or(false),
        Selector::Percentile(p) => ctx
            .strikes
            .column(&rule.metric)
            .and_then(|column| percentile_linear(&column, *p))
            .map(|v| compare_number(v, rule.op, target, ctx))
            .unwrap_or(false),
    }
}

fn reduce(agg: AggFn, column: &[f64]) -> f64 {
    match agg {
        AggFn::Mean => mean(column),
        AggFn::Sum => column.iter().sum(),
        AggFn::Max => column.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        AggFn::Min => column.iter().copied().fold(f64::INFINITY, f64::min),
        AggFn::Std => sample_std(column),
        AggFn::Count => column.len() as f64,
    }
}

/// Numeric target for this comparison, if the types line up.
fn numeric_target(target: &RuleTarget, ctx: &EvalContext<'_>) -> Option<f64> {
    match target {
        RuleTarget::Value(TargetValue::Number(n)) => Some(*n),
        RuleTarget::Dynamic(name) => ctx.dynamic_thresholds.get(name).copied(),
        _ => None,
    }
}

fn compare_number(value: f64, op: CompareOp, target: &RuleTarget, ctx: &EvalContext<'_>) -> bool {
    if op == CompareOp::InList {
        let RuleTarget::List(items) = target else {
            return false;
        };
        return items
            .iter()
            .any(|item| matches!(item, TargetValue::Number(n) if *n == value));
    }
    let Some(t) = numeric_target(target, ctx) else {
        return false;
    };
    match op {
        CompareOp::Lt => value < t,
        CompareOp::Gt => value > t,
        CompareOp::Lte => value <= t,
        CompareOp::Gte => value >= t,
        CompareOp::Eq => value == t,
        CompareOp::Neq => value != t,
        CompareOp::AbsGt => value.abs() > t,
        CompareOp::AbsLt => value.abs() < t,
        CompareOp::InList | CompareOp::Contains => false,
    }
}

fn compare_text(value: &str, op: CompareOp, target: &RuleTarget) -> bool {
    match (op, target) {
        (CompareOp::Eq, RuleTarget::Value(TargetValue::Text(t))) => value == t,
        (CompareOp::Neq, RuleTarget::Value(TargetValue::Text(t))) => value != t,
        (CompareOp::Contains, RuleTarget::Value(TargetValue::Text(t))) => value.contains(t.as_str()),
        (CompareOp::InList, RuleTarget::List(items)) => items
            .iter()
            .any(|item| matches!(item, TargetValue::Text(t) if value == t)),
        _ => false,
    }
}

fn compare_flag(value: bool, op: CompareOp, target: &RuleTarget) -> bool {
    let RuleTarget::Value(TargetValue::Flag(t)) = target else {
        return false;
    };
    match op {
        CompareOp::Eq => value == *t,
        CompareOp::Neq => value != *t,
        _ => false,
    }
}
