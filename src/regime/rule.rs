//! Rule key and target compilation.
//!
//! A rule key like `vri_2_0_strike[AGG=mean]_abs_gt` splits into a metric
//! name, an optional operand selector, and a comparison operator. Both the
//! key and the target value compile once at configuration load; evaluation
//! never re-inspects strings.

use serde_json::Value;

use crate::errors::ConfigError;

/// Comparison operator. The suffix table is ordered longest-first so
/// `_abs_gt` is never mis-read as `_gt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CompareOp {
    Lt,
    Gt,
    Lte,
    Gte,
    Eq,
    Neq,
    AbsGt,
    AbsLt,
    InList,
    Contains,
}

const OPERATOR_SUFFIXES: &[(&str, CompareOp)] = &[
    ("_contains", CompareOp::Contains),
    ("_in_list", CompareOp::InList),
    ("_abs_gt", CompareOp::AbsGt),
    ("_abs_lt", CompareOp::AbsLt),
    ("_lte", CompareOp::Lte),
    ("_gte", CompareOp::Gte),
    ("_neq", CompareOp::Neq),
    ("_lt", CompareOp::Lt),
    ("_gt", CompareOp::Gt),
    ("_eq", CompareOp::Eq),
];

/// Named reduction over a strike-table column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AggFn {
    Mean,
    Sum,
    Max,
    Min,
    Std,
    Count,
}

impl AggFn {
    fn parse(name: &str) -> Result<Self, ConfigError> {
        Ok(match name {
            "mean" => AggFn::Mean,
            "sum" => AggFn::Sum,
            "max" => AggFn::Max,
            "min" => AggFn::Min,
            "std" => AggFn::Std,
            "count" => AggFn::Count,
            other => {
                return Err(ConfigError::Invalid(format!(
                    "unknown aggregation function '{other}'"
                )))
            }
        })
    }
}

/// Where the left-hand operand comes from.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Selector {
    /// Bare metric name: read the underlying aggregate field.
    Underlying,
    /// `@ATM`: read the strike row nearest to the current price.
    Atm,
    /// `[AGG=fn]`: reduce the strike-table column.
    Agg(AggFn),
    /// `[PERCENTILE=p]`: linear-interpolation quantile of the column.
    Percentile(f64),
}

/// A compiled rule key.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ParsedRule {
    pub metric: String,
    pub selector: Selector,
    pub op: CompareOp,
}

impl ParsedRule {
    pub(crate) fn parse(key: &str) -> Result<Self, ConfigError> {
        let (base, op) = split_operator(key).ok_or_else(|| {
            ConfigError::Invalid(format!("no operator suffix in rule key '{key}'"))
        })?;
        let (metric, selector) = split_selector(base)?;
        if metric.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "empty metric name in rule key '{key}'"
            )));
        }
        Ok(ParsedRule {
            metric,
            selector,
            op,
        })
    }
}

fn split_operator(key: &str) -> Option<(&str, CompareOp)> {
    OPERATOR_SUFFIXES
        .iter()
        .find_map(|(suffix, op)| key.strip_suffix(suffix).map(|base| (base, *op)))
}

fn split_selector(base: &str) -> Result<(String, Selector), ConfigError> {
    if let Some(metric) = base.strip_suffix("@ATM") {
        return Ok((metric.to_string(), Selector::Atm));
    }
    let Some(open) = base.find('[') else {
        return Ok((base.to_string(), Selector::Underlying));
    };
    let metric = base[..open].to_string();
    let inner = base[open..]
        .strip_prefix('[')
        .and_then(|t| t.strip_suffix(']'))
        .ok_or_else(|| ConfigError::Invalid(format!("unclosed selector in '{base}'")))?;
    if let Some(name) = inner.strip_prefix("AGG=") {
        return Ok((metric, Selector::Agg(AggFn::parse(name)?)));
    }
    if let Some(p) = inner.strip_prefix("PERCENTILE=") {
        let p: f64 = p.parse().map_err(|_| {
            ConfigError::Invalid(format!("non-numeric percentile in '{base}'"))
        })?;
        return Ok((metric, Selector::Percentile(p)));
    }
    Err(ConfigError::Invalid(format!(
        "unknown selector '[{inner}]' in '{base}'"
    )))
}

/// A compiled scalar target.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TargetValue {
    Number(f64),
    Text(String),
    Flag(bool),
}

/// A compiled right-hand side.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RuleTarget {
    Value(TargetValue),
    /// Membership list for `_in_list`. Elements keep their JSON types.
    List(Vec<TargetValue>),
    /// `dynamic_threshold:<name>`, resolved per cycle.
    Dynamic(String),
}

impl RuleTarget {
    pub(crate) fn compile(value: &Value) -> Self {
        match value {
            Value::Array(items) => {
                RuleTarget::List(items.iter().map(list_element).collect())
            }
            Value::String(s) => {
                if let Some(name) = s.strip_prefix("dynamic_threshold:") {
                    return RuleTarget::Dynamic(name.to_string());
                }
                RuleTarget::Value(scalar_from_str(s))
            }
            other => RuleTarget::Value(scalar(other)),
        }
    }
}

/// Scalar compilation with string coercion: numeric strings (scientific
/// notation included) become numbers, "true"/"false" become flags.
fn scalar_from_str(s: &str) -> TargetValue {
    match s {
        "true" => return TargetValue::Flag(true),
        "false" => return TargetValue::Flag(false),
        _ => {}
    }
    match s.parse::<f64>() {
        Ok(n) => TargetValue::Number(n),
        Err(_) => TargetValue::Text(s.to_string()),
    }
}

fn scalar(value: &Value) -> TargetValue {
    match value {
        Value::Number(n) => n
            .as_f64()
            .map(TargetValue::Number)
            .unwrap_or_else(|| TargetValue::Text(n.to_string())),
        Value::Bool(b) => TargetValue::Flag(*b),
        other => TargetValue::Text(other.to_string()),
    }
}

/// List elements are not string-coerced: `"50"` in a list stays text and
/// only matches text operands.
fn list_element(value: &Value) -> TargetValue {
    match value {
        Value::String(s) => TargetValue::Text(s.clone()),
        other => scalar(other),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn operator_suffixes_match_longest_first() {
        let rule = ParsedRule::parse("gib_oi_based_und_abs_gt").unwrap();
        assert_eq!(rule.metric, "gib_oi_based_und");
        assert_eq!(rule.op, CompareOp::AbsGt);

        assert_eq!(ParsedRule::parse("x_lte").unwrap().op, CompareOp::Lte);
        assert_eq!(ParsedRule::parse("x_lt").unwrap().op, CompareOp::Lt);
        assert_eq!(ParsedRule::parse("x_neq").unwrap().op, CompareOp::Neq);
        assert_eq!(ParsedRule::parse("x_eq").unwrap().op, CompareOp::Eq);
        assert_eq!(
            ParsedRule::parse("regime_contains").unwrap().op,
            CompareOp::Contains
        );
    }

    #[test]
    fn selectors_parse_atm_agg_and_percentile() {
        let atm = ParsedRule::parse("sgdhp_score_strike@ATM_gt").unwrap();
        assert_eq!(atm.metric, "sgdhp_score_strike");
        assert_eq!(atm.selector, Selector::Atm);

        let agg = ParsedRule::parse("a_dag_exposure[AGG=mean]_abs_gt").unwrap();
        assert_eq!(agg.metric, "a_dag_exposure");
        assert_eq!(agg.selector, Selector::Agg(AggFn::Mean));

        let pct = ParsedRule::parse("vri_2_0_strike[PERCENTILE=75]_lt").unwrap();
        assert_eq!(pct.selector, Selector::Percentile(75.0));
    }

    #[test]
    fn bad_keys_are_rejected() {
        assert!(ParsedRule::parse("no_operator_here").is_err());
        assert!(ParsedRule::parse("_gt").is_err());
        assert!(ParsedRule::parse("x[AGG=median]_gt").is_err());
        assert!(ParsedRule::parse("x[PERCENTILE=abc]_gt").is_err());
        assert!(ParsedRule::parse("x[AGG=mean_gt").is_err());
    }

    #[test]
    fn targets_coerce_numeric_strings_and_booleans() {
        assert_eq!(
            RuleTarget::compile(&json!("-50e9")),
            RuleTarget::Value(TargetValue::Number(-50e9))
        );
        assert_eq!(
            RuleTarget::compile(&json!(1.5)),
            RuleTarget::Value(TargetValue::Number(1.5))
        );
        assert_eq!(
            RuleTarget::compile(&json!("true")),
            RuleTarget::Value(TargetValue::Flag(true))
        );
        assert_eq!(
            RuleTarget::compile(&json!(false)),
            RuleTarget::Value(TargetValue::Flag(false))
        );
        assert_eq!(
            RuleTarget::compile(&json!("bullish")),
            RuleTarget::Value(TargetValue::Text("bullish".to_string()))
        );
    }

    #[test]
    fn dynamic_references_keep_their_name() {
        assert_eq!(
            RuleTarget::compile(&json!("dynamic_threshold:vapi_trigger")),
            RuleTarget::Dynamic("vapi_trigger".to_string())
        );
    }

    #[test]
    fn list_targets_keep_element_types() {
        let target = RuleTarget::compile(&json!([1, "REGIME_A", "50"]));
        assert_eq!(
            target,
            RuleTarget::List(vec![
                TargetValue::Number(1.0),
                TargetValue::Text("REGIME_A".to_string()),
                TargetValue::Text("50".to_string()),
            ])
        );
    }
}
