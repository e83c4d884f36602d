// cirrus-core/src/value.rs
// ============================================================================
// Module: Value Semantics
// Description: Protocol equality and ordering over JSON values.
// Purpose: Give the store and query engine one definition of how values
//          compare, independent of serde_json's own PartialEq.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! The universal value type is `serde_json::Value` with insertion-ordered
//! objects. This module layers the emulated protocol's semantics on top:
//! numbers compare numerically regardless of integer/float representation,
//! strings order by UTF-16 code units, and mismatched kinds are never equal.
//! Comparisons that the protocol leaves undefined return `None` so callers
//! can propagate three-valued logic instead of inventing an answer.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::cmp::Ordering;

use serde_json::Value;

// ============================================================================
// SECTION: Value Kind
// ============================================================================

/// JSON kind tag with the protocol's fixed sort rank.
///
/// Rank order: `Null < Bool < Number < String < Array < Object`. Undefined
/// values are represented as the absence of a value (`Option::None`) and are
/// ordered by callers, never by this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ValueKind {
    /// JSON null.
    Null,
    /// JSON true/false.
    Bool,
    /// IEEE-754 double.
    Number,
    /// UTF-8 string, ordered by UTF-16 code units.
    String,
    /// Ordered array of values.
    Array,
    /// Insertion-ordered object.
    Object,
}

impl ValueKind {
    /// Returns the kind tag of a JSON value.
    #[must_use]
    pub const fn of(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(_) => Self::Bool,
            Value::Number(_) => Self::Number,
            Value::String(_) => Self::String,
            Value::Array(_) => Self::Array,
            Value::Object(_) => Self::Object,
        }
    }

    /// Returns true when the value is a scalar (null, bool, number, string).
    #[must_use]
    pub const fn is_scalar(self) -> bool {
        matches!(self, Self::Null | Self::Bool | Self::Number | Self::String)
    }
}

// ============================================================================
// SECTION: Construction
// ============================================================================

/// Builds a JSON number from a double, mapping non-finite values to `None`.
///
/// Whole-valued doubles inside the safe-integer range are emitted without a
/// decimal point so arithmetic results round-trip the way clients expect.
#[must_use]
pub fn number_from_f64(value: f64) -> Option<Value> {
    if !value.is_finite() {
        return None;
    }
    if value.fract() == 0.0 && value.abs() < 9_007_199_254_740_992.0 {
        #[allow(clippy::cast_possible_truncation)]
        Some(Value::from(value as i64))
    } else {
        Some(Value::from(value))
    }
}

// ============================================================================
// SECTION: Equality
// ============================================================================

/// Protocol equality between two JSON values.
///
/// Numbers compare numerically (so `1` equals `1.0`), strings byte-wise,
/// arrays element-wise, and objects entry-wise ignoring insertion order.
/// Values of different kinds are never equal.
#[must_use]
pub fn value_equals(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| value_equals(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter().all(|(key, x)| b.get(key).is_some_and(|y| value_equals(x, y)))
        }
        _ => false,
    }
}

// ============================================================================
// SECTION: Ordering
// ============================================================================

/// Orders two strings by UTF-16 code units.
///
/// The emulated protocol sorts strings the way its reference runtime does,
/// which differs from Rust's scalar-value ordering for characters outside the
/// Basic Multilingual Plane.
#[must_use]
pub fn utf16_cmp(left: &str, right: &str) -> Ordering {
    left.encode_utf16().cmp(right.encode_utf16())
}

/// Three-valued comparison used by query predicates.
///
/// Returns `Some(ordering)` only for number/number and string/string pairs;
/// every other pairing is undefined under the protocol and yields `None`.
#[must_use]
pub fn compare_values(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => {
            let a = a.as_f64()?;
            let b = b.as_f64()?;
            a.partial_cmp(&b)
        }
        (Value::String(a), Value::String(b)) => Some(utf16_cmp(a, b)),
        _ => None,
    }
}

/// Total order over defined values, used by `ORDER BY`.
///
/// Values order first by kind rank, then within the kind: booleans false
/// before true, numbers numerically with NaN last, strings by UTF-16 code
/// units, arrays lexicographically, objects by entry sequence. The order is
/// deterministic so repeated sorts of the same input agree.
#[must_use]
pub fn order_compare(left: &Value, right: &Value) -> Ordering {
    let kind_rank = ValueKind::of(left).cmp(&ValueKind::of(right));
    if kind_rank != Ordering::Equal {
        return kind_rank;
    }
    match (left, right) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => {
            let a = a.as_f64().unwrap_or(f64::NAN);
            let b = b.as_f64().unwrap_or(f64::NAN);
            a.partial_cmp(&b).unwrap_or_else(|| match (a.is_nan(), b.is_nan()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => Ordering::Equal,
            })
        }
        (Value::String(a), Value::String(b)) => utf16_cmp(a, b),
        (Value::Array(a), Value::Array(b)) => {
            for (x, y) in a.iter().zip(b.iter()) {
                let step = order_compare(x, y);
                if step != Ordering::Equal {
                    return step;
                }
            }
            a.len().cmp(&b.len())
        }
        (Value::Object(a), Value::Object(b)) => {
            for ((key_a, x), (key_b, y)) in a.iter().zip(b.iter()) {
                let key_step = utf16_cmp(key_a, key_b);
                if key_step != Ordering::Equal {
                    return key_step;
                }
                let step = order_compare(x, y);
                if step != Ordering::Equal {
                    return step;
                }
            }
            a.len().cmp(&b.len())
        }
        _ => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn numbers_compare_numerically_across_representations() {
        assert!(value_equals(&json!(1), &json!(1.0)));
        assert!(!value_equals(&json!(1), &json!(2)));
        assert_eq!(compare_values(&json!(1), &json!(1.5)), Some(Ordering::Less));
    }

    #[test]
    fn mismatched_kinds_are_never_equal_and_never_ordered() {
        assert!(!value_equals(&json!(1), &json!("1")));
        assert!(!value_equals(&json!(null), &json!(false)));
        assert_eq!(compare_values(&json!(1), &json!("1")), None);
        assert_eq!(compare_values(&json!(true), &json!(false)), None);
    }

    #[test]
    fn object_equality_ignores_insertion_order() {
        let a = json!({"x": 1, "y": 2});
        let b = json!({"y": 2, "x": 1});
        assert!(value_equals(&a, &b));
    }

    #[test]
    fn strings_order_by_utf16_units() {
        // U+FF5E (halfwidth/fullwidth tilde, one UTF-16 unit 0xFF5E) orders
        // before U+1D11E (surrogate pair starting 0xD834).
        assert_eq!(utf16_cmp("\u{1D11E}", "\u{FF5E}"), Ordering::Less);
        assert_eq!(utf16_cmp("a", "b"), Ordering::Less);
    }

    #[test]
    fn order_compare_ranks_kinds_then_values() {
        assert_eq!(order_compare(&json!(null), &json!(false)), Ordering::Less);
        assert_eq!(order_compare(&json!(true), &json!(0)), Ordering::Less);
        assert_eq!(order_compare(&json!(9), &json!("a")), Ordering::Less);
        assert_eq!(order_compare(&json!("z"), &json!([1])), Ordering::Less);
        assert_eq!(order_compare(&json!([1, 2]), &json!([1, 3])), Ordering::Less);
    }
}
