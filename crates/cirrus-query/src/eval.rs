// cirrus-query/src/eval.rs
// ============================================================================
// Module: Expression Evaluator
// Description: Three-valued evaluation of query expressions over row
//              bindings.
// Purpose: Dispatch on AST tags to produce a value or the undefined marker;
//          predicates collapse to tri-state truth under Kleene rules.
// Dependencies: cirrus-core, serde_json, crate::{ast, error}
// ============================================================================

//! ## Overview
//! Evaluation returns `Option<Value>`: `None` is the protocol's undefined
//! marker. Property access on a missing path, comparison across kinds, and
//! arithmetic on non-numbers all yield undefined rather than an error.
//! `AND`/`OR`/`NOT` follow Kleene three-valued truth tables; a `WHERE`
//! predicate keeps a row only when it evaluates to exactly `true`.
//!
//! The only hard errors are caller mistakes that the service reports as bad
//! requests: unknown parameters, unknown functions, and wrong arities.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use cirrus_core::value::compare_values;
use cirrus_core::value::number_from_f64;
use cirrus_core::value::value_equals;
use serde_json::Map;
use serde_json::Value;

use crate::ast::BinaryOp;
use crate::ast::Expr;
use crate::ast::UnaryOp;
use crate::error::QueryError;
use crate::error::QueryResult;

// ============================================================================
// SECTION: Rows and Truth
// ============================================================================

/// One pipeline row: the values bound to each `FROM`/`JOIN` alias.
#[derive(Debug, Clone, Default)]
pub struct Row {
    /// Alias bindings in declaration order; lookups scan backwards so the
    /// innermost join wins on a (validated-away) name clash.
    pub bindings: Vec<(String, Value)>,
}

impl Row {
    /// Builds a single-binding row.
    #[must_use]
    pub fn single(alias: &str, value: Value) -> Self {
        Self {
            bindings: vec![(alias.to_string(), value)],
        }
    }

    /// Returns a row extended with one more binding.
    #[must_use]
    pub fn extended(&self, alias: &str, value: Value) -> Self {
        let mut bindings = self.bindings.clone();
        bindings.push((alias.to_string(), value));
        Self {
            bindings,
        }
    }

    /// Looks up a binding by alias.
    #[must_use]
    pub fn get(&self, alias: &str) -> Option<&Value> {
        self.bindings.iter().rev().find(|(name, _)| name == alias).map(|(_, value)| value)
    }
}

/// Kleene tri-state truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Truth {
    /// Definitely true.
    True,
    /// Definitely false.
    False,
    /// Undefined operand somewhere in the predicate.
    Unknown,
}

impl Truth {
    /// Collapses an evaluated value to tri-state truth.
    ///
    /// Only boolean values are definite; everything else (including
    /// undefined) is `Unknown`.
    #[must_use]
    pub fn of(value: Option<&Value>) -> Self {
        match value {
            Some(Value::Bool(true)) => Self::True,
            Some(Value::Bool(false)) => Self::False,
            _ => Self::Unknown,
        }
    }

    /// Converts back to an evaluated value (`Unknown` becomes undefined).
    #[must_use]
    pub fn into_value(self) -> Option<Value> {
        match self {
            Self::True => Some(Value::Bool(true)),
            Self::False => Some(Value::Bool(false)),
            Self::Unknown => None,
        }
    }

    /// Kleene conjunction.
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        match (self, other) {
            (Self::False, _) | (_, Self::False) => Self::False,
            (Self::True, Self::True) => Self::True,
            _ => Self::Unknown,
        }
    }

    /// Kleene disjunction.
    #[must_use]
    pub fn or(self, other: Self) -> Self {
        match (self, other) {
            (Self::True, _) | (_, Self::True) => Self::True,
            (Self::False, Self::False) => Self::False,
            _ => Self::Unknown,
        }
    }

    /// Kleene negation.
    #[must_use]
    pub fn negate(self) -> Self {
        match self {
            Self::True => Self::False,
            Self::False => Self::True,
            Self::Unknown => Self::Unknown,
        }
    }
}

// ============================================================================
// SECTION: Evaluation
// ============================================================================

/// Evaluates an expression against a row.
///
/// Returns `None` for the undefined marker.
///
/// # Errors
///
/// Returns [`QueryError`] for unknown parameters, unknown functions, and
/// wrong arities; data-shaped surprises never error.
pub fn eval(expr: &Expr, row: &Row, params: &BTreeMap<String, Value>) -> QueryResult<Option<Value>> {
    match expr {
        Expr::Null => Ok(Some(Value::Null)),
        Expr::Bool(value) => Ok(Some(Value::Bool(*value))),
        Expr::Number(value) => Ok(number_from_f64(*value)),
        Expr::Str(value) => Ok(Some(Value::String(value.clone()))),
        Expr::Param(name) => params
            .get(name)
            .cloned()
            .map(Some)
            .ok_or_else(|| QueryError::UnknownParameter(name.clone())),
        Expr::Alias(name) => Ok(row.get(name).cloned()),
        Expr::Property {
            base,
            name,
        } => Ok(eval(base, row, params)?.and_then(|value| match value {
            Value::Object(map) => map.get(name).cloned(),
            _ => None,
        })),
        Expr::Index {
            base,
            index,
        } => {
            let base = eval(base, row, params)?;
            let index = eval(index, row, params)?;
            Ok(index_value(base, index))
        }
        Expr::ArrayCtor(items) => {
            let mut array = Vec::with_capacity(items.len());
            for item in items {
                // Undefined elements are dropped, matching projection rules.
                if let Some(value) = eval(item, row, params)? {
                    array.push(value);
                }
            }
            Ok(Some(Value::Array(array)))
        }
        Expr::ObjectCtor(entries) => {
            let mut object = Map::new();
            for (key, value) in entries {
                if let Some(value) = eval(value, row, params)? {
                    object.insert(key.clone(), value);
                }
            }
            Ok(Some(Value::Object(object)))
        }
        Expr::Unary {
            op,
            operand,
        } => {
            let operand = eval(operand, row, params)?;
            Ok(match op {
                UnaryOp::Not => Truth::of(operand.as_ref()).negate().into_value(),
                UnaryOp::Neg => match operand {
                    Some(Value::Number(n)) => n.as_f64().and_then(|n| number_from_f64(-n)),
                    _ => None,
                },
            })
        }
        Expr::Binary {
            op,
            left,
            right,
        } => eval_binary(*op, left, right, row, params),
        Expr::In {
            needle,
            haystack,
        } => {
            let needle = eval(needle, row, params)?;
            let mut outcome = Truth::False;
            for candidate in haystack {
                let candidate = eval(candidate, row, params)?;
                outcome = outcome.or(equality(needle.as_ref(), candidate.as_ref()));
                if outcome == Truth::True {
                    break;
                }
            }
            Ok(outcome.into_value())
        }
        Expr::Between {
            probe,
            low,
            high,
        } => {
            let probe = eval(probe, row, params)?;
            let low = eval(low, row, params)?;
            let high = eval(high, row, params)?;
            let lower = ordering(probe.as_ref(), low.as_ref(), |ord| ord.is_ge());
            let upper = ordering(probe.as_ref(), high.as_ref(), |ord| ord.is_le());
            Ok(lower.and(upper).into_value())
        }
        Expr::Call {
            function,
            args,
        } => eval_function(function, args, row, params),
    }
}

/// Evaluates a predicate to tri-state truth.
///
/// # Errors
///
/// Propagates evaluation errors from [`eval`].
pub fn eval_predicate(
    expr: &Expr,
    row: &Row,
    params: &BTreeMap<String, Value>,
) -> QueryResult<Truth> {
    Ok(Truth::of(eval(expr, row, params)?.as_ref()))
}

// ============================================================================
// SECTION: Operators
// ============================================================================

/// Evaluates a binary operator.
fn eval_binary(
    op: BinaryOp,
    left: &Expr,
    right: &Expr,
    row: &Row,
    params: &BTreeMap<String, Value>,
) -> QueryResult<Option<Value>> {
    // Logical operators use Kleene rules and must see Unknown operands.
    if matches!(op, BinaryOp::And | BinaryOp::Or) {
        let left = Truth::of(eval(left, row, params)?.as_ref());
        // Short-circuit on the absorbing element.
        match (op, left) {
            (BinaryOp::And, Truth::False) => return Ok(Some(Value::Bool(false))),
            (BinaryOp::Or, Truth::True) => return Ok(Some(Value::Bool(true))),
            _ => {}
        }
        let right = Truth::of(eval(right, row, params)?.as_ref());
        let outcome = match op {
            BinaryOp::And => left.and(right),
            _ => left.or(right),
        };
        return Ok(outcome.into_value());
    }

    let left = eval(left, row, params)?;
    let right = eval(right, row, params)?;
    Ok(match op {
        BinaryOp::Eq => equality(left.as_ref(), right.as_ref()).into_value(),
        BinaryOp::Neq => equality(left.as_ref(), right.as_ref()).negate().into_value(),
        BinaryOp::Lt => ordering(left.as_ref(), right.as_ref(), |ord| ord.is_lt()).into_value(),
        BinaryOp::Lte => ordering(left.as_ref(), right.as_ref(), |ord| ord.is_le()).into_value(),
        BinaryOp::Gt => ordering(left.as_ref(), right.as_ref(), |ord| ord.is_gt()).into_value(),
        BinaryOp::Gte => ordering(left.as_ref(), right.as_ref(), |ord| ord.is_ge()).into_value(),
        BinaryOp::Add => arithmetic(left.as_ref(), right.as_ref(), |a, b| a + b),
        BinaryOp::Sub => arithmetic(left.as_ref(), right.as_ref(), |a, b| a - b),
        BinaryOp::Mul => arithmetic(left.as_ref(), right.as_ref(), |a, b| a * b),
        BinaryOp::Div => arithmetic(left.as_ref(), right.as_ref(), |a, b| a / b),
        BinaryOp::Mod => arithmetic(left.as_ref(), right.as_ref(), |a, b| a % b),
        BinaryOp::Concat => match (left, right) {
            (Some(Value::String(a)), Some(Value::String(b))) => {
                Some(Value::String(format!("{a}{b}")))
            }
            _ => None,
        },
        BinaryOp::And | BinaryOp::Or => None,
    })
}

/// Three-valued equality: mismatched kinds and undefined yield `Unknown`.
fn equality(left: Option<&Value>, right: Option<&Value>) -> Truth {
    match (left, right) {
        (Some(left), Some(right)) => {
            if cirrus_core::value::ValueKind::of(left) == cirrus_core::value::ValueKind::of(right) {
                if value_equals(left, right) {
                    Truth::True
                } else {
                    Truth::False
                }
            } else {
                Truth::Unknown
            }
        }
        _ => Truth::Unknown,
    }
}

/// Three-valued ordering comparison.
fn ordering(
    left: Option<&Value>,
    right: Option<&Value>,
    accept: impl FnOnce(std::cmp::Ordering) -> bool,
) -> Truth {
    match (left, right) {
        (Some(left), Some(right)) => match compare_values(left, right) {
            Some(ord) => {
                if accept(ord) {
                    Truth::True
                } else {
                    Truth::False
                }
            }
            None => Truth::Unknown,
        },
        _ => Truth::Unknown,
    }
}

/// Numeric arithmetic; non-numbers and non-finite results are undefined.
fn arithmetic(
    left: Option<&Value>,
    right: Option<&Value>,
    apply: impl FnOnce(f64, f64) -> f64,
) -> Option<Value> {
    let left = left?.as_f64()?;
    let right = right?.as_f64()?;
    number_from_f64(apply(left, right))
}

/// Resolves `base[index]`: arrays by number, objects by string.
fn index_value(base: Option<Value>, index: Option<Value>) -> Option<Value> {
    match (base, index) {
        (Some(Value::Array(items)), Some(Value::Number(n))) => {
            let n = n.as_f64()?;
            if n < 0.0 || n.fract() != 0.0 {
                return None;
            }
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            items.get(n as usize).cloned()
        }
        (Some(Value::Object(map)), Some(Value::String(key))) => map.get(&key).cloned(),
        _ => None,
    }
}

// ============================================================================
// SECTION: Scalar Functions
// ============================================================================

/// Aggregate function names, handled by the planner rather than here.
pub const AGGREGATE_FUNCTIONS: [&str; 5] = ["COUNT", "SUM", "AVG", "MIN", "MAX"];

/// Returns true when the name is an aggregate function.
#[must_use]
pub fn is_aggregate(function: &str) -> bool {
    AGGREGATE_FUNCTIONS.contains(&function)
}

/// Evaluates a scalar function call.
fn eval_function(
    function: &str,
    args: &[Expr],
    row: &Row,
    params: &BTreeMap<String, Value>,
) -> QueryResult<Option<Value>> {
    if is_aggregate(function) {
        // Aggregates are rewritten by the planner; reaching one here means it
        // appeared outside a projection.
        return Err(QueryError::InvalidQuery(format!(
            "aggregate {function} is only allowed in the projection"
        )));
    }
    let mut evaluated = Vec::with_capacity(args.len());
    for arg in args {
        evaluated.push(eval(arg, row, params)?);
    }
    apply_scalar(function, &evaluated)
}

/// Applies a scalar function to evaluated arguments.
///
/// Type-check functions receive undefined arguments; every other function
/// yields undefined when a required argument is undefined or wrongly typed.
fn apply_scalar(function: &str, args: &[Option<Value>]) -> QueryResult<Option<Value>> {
    match function {
        "IS_DEFINED" => {
            check_arity(function, args, 1, 1, "exactly 1")?;
            Ok(Some(Value::Bool(args[0].is_some())))
        }
        "IS_NULL" => type_check(function, args, |value| matches!(value, Value::Null)),
        "IS_ARRAY" => type_check(function, args, |value| matches!(value, Value::Array(_))),
        "IS_OBJECT" => type_check(function, args, |value| matches!(value, Value::Object(_))),
        "IS_STRING" => type_check(function, args, |value| matches!(value, Value::String(_))),
        "IS_NUMBER" => type_check(function, args, |value| matches!(value, Value::Number(_))),
        "IS_BOOL" => type_check(function, args, |value| matches!(value, Value::Bool(_))),
        "STARTSWITH" => string_test(function, args, |s, probe| s.starts_with(probe)),
        "ENDSWITH" => string_test(function, args, |s, probe| s.ends_with(probe)),
        "CONTAINS" => string_test(function, args, |s, probe| s.contains(probe)),
        "LOWER" => string_map(function, args, str::to_lowercase),
        "UPPER" => string_map(function, args, str::to_uppercase),
        "LENGTH" => {
            check_arity(function, args, 1, 1, "exactly 1")?;
            Ok(match &args[0] {
                Some(Value::String(s)) => Value::from(s.encode_utf16().count()).into(),
                _ => None,
            })
        }
        "SUBSTRING" => {
            check_arity(function, args, 3, 3, "exactly 3")?;
            let (Some(Value::String(s)), Some(start), Some(len)) =
                (&args[0], &args[1], &args[2])
            else {
                return Ok(None);
            };
            let (Some(start), Some(len)) = (unsigned(start), unsigned(len)) else {
                return Ok(None);
            };
            let units: Vec<u16> = s.encode_utf16().collect();
            let start = start.min(units.len());
            let end = start.saturating_add(len).min(units.len());
            Ok(Some(Value::String(String::from_utf16_lossy(&units[start .. end]))))
        }
        "CONCAT" => {
            check_arity(function, args, 2, usize::MAX, "at least 2")?;
            let mut out = String::new();
            for arg in args {
                let Some(Value::String(piece)) = arg else {
                    return Ok(None);
                };
                out.push_str(piece);
            }
            Ok(Some(Value::String(out)))
        }
        "ARRAY_CONTAINS" => {
            check_arity(function, args, 2, 3, "2 or 3")?;
            let (Some(Value::Array(items)), Some(needle)) = (&args[0], &args[1]) else {
                return Ok(None);
            };
            let partial = matches!(args.get(2), Some(Some(Value::Bool(true))));
            let hit = items.iter().any(|item| {
                if partial {
                    partial_match(item, needle)
                } else {
                    value_equals(item, needle)
                }
            });
            Ok(Some(Value::Bool(hit)))
        }
        "ARRAY_LENGTH" => {
            check_arity(function, args, 1, 1, "exactly 1")?;
            Ok(match &args[0] {
                Some(Value::Array(items)) => Some(Value::from(items.len())),
                _ => None,
            })
        }
        "ST_DISTANCE" => {
            check_arity(function, args, 2, 2, "exactly 2")?;
            Ok(geo_distance(args[0].as_ref(), args[1].as_ref()))
        }
        "ABS" => numeric_map(function, args, f64::abs),
        "FLOOR" => numeric_map(function, args, f64::floor),
        "CEILING" => numeric_map(function, args, f64::ceil),
        "ROUND" => numeric_map(function, args, f64::round),
        _ => Err(QueryError::UnknownFunction(function.to_string())),
    }
}

/// Validates an argument count window.
fn check_arity(
    function: &str,
    args: &[Option<Value>],
    min: usize,
    max: usize,
    expected: &'static str,
) -> QueryResult<()> {
    if args.len() < min || args.len() > max {
        return Err(QueryError::WrongArity {
            function: function.to_string(),
            expected,
            actual: args.len(),
        });
    }
    Ok(())
}

/// Shared shape of the `IS_*` type-check functions.
fn type_check(
    function: &str,
    args: &[Option<Value>],
    test: impl FnOnce(&Value) -> bool,
) -> QueryResult<Option<Value>> {
    check_arity(function, args, 1, 1, "exactly 1")?;
    Ok(Some(Value::Bool(args[0].as_ref().is_some_and(test))))
}

/// Shared shape of the two-string predicate functions, with an optional
/// case-insensitivity flag as the third argument.
fn string_test(
    function: &str,
    args: &[Option<Value>],
    test: impl FnOnce(&str, &str) -> bool,
) -> QueryResult<Option<Value>> {
    check_arity(function, args, 2, 3, "2 or 3")?;
    let (Some(Value::String(subject)), Some(Value::String(probe))) = (&args[0], &args[1]) else {
        return Ok(None);
    };
    let case_insensitive = matches!(args.get(2), Some(Some(Value::Bool(true))));
    let outcome = if case_insensitive {
        test(&subject.to_lowercase(), &probe.to_lowercase())
    } else {
        test(subject, probe)
    };
    Ok(Some(Value::Bool(outcome)))
}

/// Shared shape of the one-string transform functions.
fn string_map(
    function: &str,
    args: &[Option<Value>],
    map: impl FnOnce(&str) -> String,
) -> QueryResult<Option<Value>> {
    check_arity(function, args, 1, 1, "exactly 1")?;
    Ok(match &args[0] {
        Some(Value::String(s)) => Some(Value::String(map(s))),
        _ => None,
    })
}

/// Shared shape of the one-number math functions.
fn numeric_map(
    function: &str,
    args: &[Option<Value>],
    map: impl FnOnce(f64) -> f64,
) -> QueryResult<Option<Value>> {
    check_arity(function, args, 1, 1, "exactly 1")?;
    Ok(match &args[0] {
        Some(Value::Number(n)) => n.as_f64().and_then(|n| number_from_f64(map(n))),
        _ => None,
    })
}

/// Extracts a non-negative integer from a JSON number.
fn unsigned(value: &Value) -> Option<usize> {
    let n = value.as_f64()?;
    if n < 0.0 || n.fract() != 0.0 {
        return None;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Some(n as usize)
}

/// Structural subset match used by `ARRAY_CONTAINS(…, …, true)`.
fn partial_match(item: &Value, needle: &Value) -> bool {
    match (item, needle) {
        (Value::Object(item), Value::Object(needle)) => needle
            .iter()
            .all(|(key, expected)| item.get(key).is_some_and(|found| value_equals(found, expected))),
        _ => value_equals(item, needle),
    }
}

/// Great-circle distance in meters between two GeoJSON points.
///
/// Any input that is not a well-formed point yields undefined.
fn geo_distance(left: Option<&Value>, right: Option<&Value>) -> Option<Value> {
    const EARTH_RADIUS_METERS: f64 = 6_371_008.8;
    let (lon1, lat1) = geo_point(left?)?;
    let (lon2, lat2) = geo_point(right?)?;
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();
    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    number_from_f64(EARTH_RADIUS_METERS * c)
}

/// Extracts `(longitude, latitude)` from a GeoJSON point.
fn geo_point(value: &Value) -> Option<(f64, f64)> {
    let object = value.as_object()?;
    if object.get("type")?.as_str()? != "Point" {
        return None;
    }
    let coordinates = object.get("coordinates")?.as_array()?;
    if coordinates.len() < 2 {
        return None;
    }
    Some((coordinates[0].as_f64()?, coordinates[1].as_f64()?))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::ast::Projection;
    use crate::parser::parse_query;

    fn predicate(filter: &str, doc: Value) -> Truth {
        let query = parse_query(&format!("SELECT * FROM c WHERE {filter}")).expect("parses");
        let row = Row::single("c", doc);
        eval_predicate(query.filter.as_ref().unwrap(), &row, &BTreeMap::new()).expect("evaluates")
    }

    #[test]
    fn missing_paths_yield_unknown_not_false() {
        assert_eq!(predicate("c.v = 1", json!({"v": 1})), Truth::True);
        assert_eq!(predicate("c.v = 1", json!({"v": 2})), Truth::False);
        assert_eq!(predicate("c.v = 1", json!({})), Truth::Unknown);
        assert_eq!(predicate("c.v = 1", json!({"v": "x"})), Truth::Unknown);
    }

    #[test]
    fn kleene_tables_hold_for_and_or_not() {
        // false AND unknown = false, true OR unknown = true.
        assert_eq!(predicate("c.a = 1 AND c.missing = 1", json!({"a": 2})), Truth::False);
        assert_eq!(predicate("c.a = 1 OR c.missing = 1", json!({"a": 1})), Truth::True);
        // unknown collapses everything else.
        assert_eq!(predicate("c.a = 1 AND c.missing = 1", json!({"a": 1})), Truth::Unknown);
        assert_eq!(predicate("c.a = 1 OR c.missing = 1", json!({"a": 2})), Truth::Unknown);
        assert_eq!(predicate("NOT c.missing = 1", json!({})), Truth::Unknown);
        assert_eq!(predicate("NOT c.a = 1", json!({"a": 2})), Truth::True);
    }

    #[test]
    fn arithmetic_on_non_numbers_is_undefined() {
        assert_eq!(predicate("c.a + 1 = 2", json!({"a": 1})), Truth::True);
        assert_eq!(predicate("c.a + 1 = 2", json!({"a": "1"})), Truth::Unknown);
        assert_eq!(predicate("c.a / 0 = 1", json!({"a": 1})), Truth::Unknown);
        assert_eq!(predicate("c.a % 3 = 1", json!({"a": 7})), Truth::True);
    }

    #[test]
    fn in_and_between_follow_kleene_rules() {
        assert_eq!(predicate("c.v IN (1, 2, 3)", json!({"v": 2})), Truth::True);
        assert_eq!(predicate("c.v IN (1, 2, 3)", json!({"v": 9})), Truth::False);
        assert_eq!(predicate("c.v IN (1, 2, 3)", json!({})), Truth::Unknown);
        assert_eq!(predicate("c.v IN ('a', 2)", json!({"v": 9})), Truth::Unknown);
        assert_eq!(predicate("c.v BETWEEN 1 AND 5", json!({"v": 3})), Truth::True);
        assert_eq!(predicate("c.v BETWEEN 1 AND 5", json!({"v": 9})), Truth::False);
        assert_eq!(predicate("c.v BETWEEN 1 AND 5", json!({"v": "x"})), Truth::Unknown);
    }

    #[test]
    fn string_functions_cover_the_surface() {
        let doc = json!({"name": "Quartz", "tags": ["a", "b"]});
        assert_eq!(predicate("STARTSWITH(c.name, 'Qua')", doc.clone()), Truth::True);
        assert_eq!(predicate("STARTSWITH(c.name, 'qua', true)", doc.clone()), Truth::True);
        assert_eq!(predicate("ENDSWITH(c.name, 'tz')", doc.clone()), Truth::True);
        assert_eq!(predicate("CONTAINS(c.name, 'art')", doc.clone()), Truth::True);
        assert_eq!(predicate("LOWER(c.name) = 'quartz'", doc.clone()), Truth::True);
        assert_eq!(predicate("UPPER(c.name) = 'QUARTZ'", doc.clone()), Truth::True);
        assert_eq!(predicate("LENGTH(c.name) = 6", doc.clone()), Truth::True);
        assert_eq!(predicate("SUBSTRING(c.name, 1, 3) = 'uar'", doc.clone()), Truth::True);
        assert_eq!(predicate("CONCAT(c.name, '!') = 'Quartz!'", doc.clone()), Truth::True);
        assert_eq!(predicate("ARRAY_CONTAINS(c.tags, 'b')", doc.clone()), Truth::True);
        assert_eq!(predicate("ARRAY_LENGTH(c.tags) = 2", doc), Truth::True);
    }

    #[test]
    fn type_check_functions_see_undefined() {
        let doc = json!({"n": 1, "s": "x", "z": null, "arr": [], "obj": {}, "b": true});
        assert_eq!(predicate("IS_DEFINED(c.n)", doc.clone()), Truth::True);
        assert_eq!(predicate("IS_DEFINED(c.missing)", doc.clone()), Truth::False);
        assert_eq!(predicate("IS_NULL(c.z)", doc.clone()), Truth::True);
        assert_eq!(predicate("IS_NULL(c.missing)", doc.clone()), Truth::False);
        assert_eq!(predicate("IS_ARRAY(c.arr)", doc.clone()), Truth::True);
        assert_eq!(predicate("IS_OBJECT(c.obj)", doc.clone()), Truth::True);
        assert_eq!(predicate("IS_STRING(c.s)", doc.clone()), Truth::True);
        assert_eq!(predicate("IS_NUMBER(c.n)", doc.clone()), Truth::True);
        assert_eq!(predicate("IS_BOOL(c.b)", doc), Truth::True);
    }

    #[test]
    fn st_distance_measures_points_and_rejects_garbage() {
        let doc = json!({
            "here": {"type": "Point", "coordinates": [0.0, 0.0]},
            "there": {"type": "Point", "coordinates": [0.0, 1.0]},
        });
        // One degree of latitude is roughly 111 km.
        assert_eq!(
            predicate("ST_DISTANCE(c.here, c.there) BETWEEN 110000 AND 112000", doc.clone()),
            Truth::True
        );
        assert_eq!(predicate("ST_DISTANCE(c.here, c.missing) = 0", doc), Truth::Unknown);
    }

    #[test]
    fn unknown_functions_and_parameters_error() {
        let query = parse_query("SELECT * FROM c WHERE NO_SUCH_FN(c.a)").expect("parses");
        let row = Row::single("c", json!({}));
        let error =
            eval(query.filter.as_ref().unwrap(), &row, &BTreeMap::new()).unwrap_err();
        assert!(matches!(error, QueryError::UnknownFunction(_)));

        let query = parse_query("SELECT * FROM c WHERE c.a = @missing").expect("parses");
        let error =
            eval(query.filter.as_ref().unwrap(), &row, &BTreeMap::new()).unwrap_err();
        assert!(matches!(error, QueryError::UnknownParameter(_)));
    }

    #[test]
    fn constructors_skip_undefined_members() {
        let query =
            parse_query("SELECT VALUE {\"a\": c.a, \"b\": c.missing} FROM c").expect("parses");
        let Projection::Value(expr) = &query.projection else {
            panic!("expected VALUE projection");
        };
        let row = Row::single("c", json!({"a": 1}));
        let value = eval(expr, &row, &BTreeMap::new()).expect("evaluates").expect("defined");
        assert_eq!(value, json!({"a": 1}));
    }
}
