//! # Terminal-Type Resolver
//!
//! Decides, for the last segment of a path, which type the literal is
//! compared as and whether the comparison reaches into an array.
//!
//! Membership and pattern operators lean towards arrays: "does this list
//! contain x" is an array question. Everything else leans towards scalars
//! and only falls back to a typed array when no scalar of the value type
//! was ever observed.

use bj_core::{ObservedType, Operator};
use serde::Serialize;
use serde_json::Value;

/// Outcome of terminal resolution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    /// Logical type of the literal (or of the field, without a literal).
    pub value_type: ObservedType,
    pub prefer_array: bool,
    /// Scalar type compared against; arrays are addressed via `array_of`.
    pub element_type: ObservedType,
    /// Literal after reclassification, e.g. `"42"` becomes `42`.
    pub value: Value,
}

pub fn resolve(observed: &[ObservedType], op: Operator, value: &Value) -> Resolution {
    resolve_declared(observed, op, value, None)
}

/// Like [`resolve`], with a declared type that wins when there is no literal.
///
/// A string literal that parses as a number or boolean keeps its text form
/// when the path was only ever seen as String: `"404"` on a message field
/// is a substring, not an integer.
pub fn resolve_declared(
    observed: &[ObservedType],
    op: Operator,
    raw: &Value,
    declared: Option<ObservedType>,
) -> Resolution {
    let (mut inferred, mut value) = infer_value(op, raw);
    if let Some(t) = inferred {
        let text_only = !seen_as(observed, t) && seen_as(observed, ObservedType::String);
        if is_text(raw) && t != ObservedType::String && text_only {
            inferred = Some(ObservedType::String);
            value = raw.clone();
        }
    }
    let value_type = inferred
        .or(declared)
        .unwrap_or_else(|| default_value_type(observed));

    let (prefer_array, element_type) = decide(observed, op, value_type);

    Resolution {
        value_type,
        prefer_array,
        element_type,
        value,
    }
}

/// Infer a literal's type, returning the (possibly reclassified) literal.
/// `None` for an absent literal.
pub fn infer_value(op: Operator, value: &Value) -> (Option<ObservedType>, Value) {
    match value {
        Value::Null => (None, Value::Null),
        Value::Bool(_) => (Some(ObservedType::Bool), value.clone()),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                (Some(ObservedType::Int64), Value::from(i))
            } else {
                match n.as_f64() {
                    Some(f) if is_integral(f) => (Some(ObservedType::Int64), Value::from(f as i64)),
                    _ => (Some(ObservedType::Float64), value.clone()),
                }
            }
        }
        Value::String(s) => {
            // patterns are text, whatever they look like
            if op.is_pattern() || op.is_regexp() {
                return (Some(ObservedType::String), value.clone());
            }
            match parse_str(s) {
                Some(parsed) => infer_value(op, &parsed),
                None => (Some(ObservedType::String), value.clone()),
            }
        }
        Value::Array(items) => {
            let coerced: Vec<Value> = items.iter().map(|v| infer_value(op, v).1).collect();
            let first = items
                .first()
                .and_then(|v| infer_value(op, v).0)
                .unwrap_or(ObservedType::Dynamic);
            (Some(first), Value::Array(coerced))
        }
        Value::Object(_) => (Some(ObservedType::Dynamic), value.clone()),
    }
}

fn is_text(value: &Value) -> bool {
    match value {
        Value::String(_) => true,
        Value::Array(items) => !items.is_empty() && items.iter().all(Value::is_string),
        _ => false,
    }
}

/// Observed as `t` itself or as its typed array.
fn seen_as(observed: &[ObservedType], t: ObservedType) -> bool {
    observed.contains(&t) || t.array_of().map_or(false, |arr| observed.contains(&arr))
}

fn is_integral(f: f64) -> bool {
    f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64
}

fn parse_str(s: &str) -> Option<Value> {
    let t = s.trim();
    if let Ok(i) = t.parse::<i64>() {
        return Some(Value::from(i));
    }
    if let Ok(f) = t.parse::<f64>() {
        if f.is_finite() {
            return Some(Value::from(f));
        }
    }
    if t.eq_ignore_ascii_case("true") {
        return Some(Value::Bool(true));
    }
    if t.eq_ignore_ascii_case("false") {
        return Some(Value::Bool(false));
    }
    None
}

/// First scalar observed, else first observed, else String.
fn default_value_type(observed: &[ObservedType]) -> ObservedType {
    observed
        .iter()
        .copied()
        .filter(|t| t.is_scalar())
        .min()
        .or_else(|| observed.iter().copied().min())
        .unwrap_or(ObservedType::String)
}

fn decide(observed: &[ObservedType], op: Operator, value_type: ObservedType) -> (bool, ObservedType) {
    let has = |t: ObservedType| observed.contains(&t);
    let typed_array = value_type.array_of().filter(|arr| has(*arr));

    if op.is_existence() {
        return (false, value_type);
    }

    if op.is_membership() || op.is_pattern() {
        if typed_array.is_some() {
            return (true, value_type);
        }
        if has(value_type) {
            return (false, value_type);
        }
        if value_type.is_scalar() && has(ObservedType::ArrayDynamic) {
            return (true, value_type);
        }
        return (false, value_type);
    }

    if has(value_type) {
        (false, value_type)
    } else if typed_array.is_some() {
        (true, value_type)
    } else {
        (false, value_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use ObservedType::*;

    #[test]
    fn test_infer_numbers() {
        assert_eq!(infer_value(Operator::Equal, &json!(7)), (Some(Int64), json!(7)));
        assert_eq!(infer_value(Operator::Equal, &json!(1.65)), (Some(Float64), json!(1.65)));
        assert_eq!(infer_value(Operator::Equal, &json!(3.0)), (Some(Int64), json!(3)));
    }

    #[test]
    fn test_numeric_strings_reclassified() {
        assert_eq!(infer_value(Operator::Equal, &json!("42")), (Some(Int64), json!(42)));
        assert_eq!(infer_value(Operator::Equal, &json!("3.14")), (Some(Float64), json!(3.14)));
        assert_eq!(infer_value(Operator::Equal, &json!("true")), (Some(Bool), json!(true)));
        assert_eq!(infer_value(Operator::Equal, &json!("IIT")), (Some(String), json!("IIT")));
        assert_eq!(infer_value(Operator::Equal, &json!("NaN")), (Some(String), json!("NaN")));
    }

    #[test]
    fn test_pattern_literals_stay_text() {
        assert_eq!(infer_value(Operator::Like, &json!("42")), (Some(String), json!("42")));
        assert_eq!(infer_value(Operator::Regexp, &json!("1.5")), (Some(String), json!("1.5")));
        assert_eq!(infer_value(Operator::Contains, &json!("42")), (Some(Int64), json!(42)));
    }

    #[test]
    fn test_list_literals() {
        let (t, v) = infer_value(Operator::In, &json!(["1", "2"]));
        assert_eq!(t, Some(Int64));
        assert_eq!(v, json!([1, 2]));
        assert_eq!(infer_value(Operator::In, &json!([])).0, Some(Dynamic));
    }

    #[test]
    fn test_absent_literal_defaults() {
        let r = resolve(&[String, Int64], Operator::Exists, &Value::Null);
        assert_eq!(r.value_type, String);
        let r = resolve(&[ArrayJson], Operator::Exists, &Value::Null);
        assert_eq!(r.value_type, ArrayJson);
        assert!(!r.prefer_array);
        let r = resolve(&[], Operator::Exists, &Value::Null);
        assert_eq!(r.value_type, String);
        let r = resolve_declared(&[], Operator::Exists, &Value::Null, Some(Float64));
        assert_eq!(r.value_type, Float64);
    }

    #[test]
    fn test_contains_without_array_stays_scalar() {
        let r = resolve(&[String], Operator::Contains, &json!("IIT"));
        assert!(!r.prefer_array);
        assert_eq!(r.element_type, String);
    }

    #[test]
    fn test_contains_prefers_typed_array() {
        let r = resolve(&[ArrayFloat64, ArrayDynamic], Operator::Contains, &json!(1.65));
        assert!(r.prefer_array);
        assert_eq!(r.element_type, Float64);

        let r = resolve(&[String, ArrayString], Operator::NotContains, &json!("x"));
        assert!(r.prefer_array);
    }

    #[test]
    fn test_contains_falls_back_to_dynamic_array() {
        let r = resolve(&[ArrayDynamic], Operator::Contains, &json!("passed"));
        assert!(r.prefer_array);
        assert_eq!(r.element_type, String);

        let r = resolve(&[String, ArrayDynamic], Operator::Contains, &json!("passed"));
        assert!(!r.prefer_array);
    }

    #[test]
    fn test_equality_scalar_first() {
        let r = resolve(&[ArrayFloat64, ArrayDynamic], Operator::Equal, &json!(1.65));
        assert!(r.prefer_array, "no scalar Float64 observed, falls back to the typed array");
        assert_eq!(r.element_type, Float64);

        let r = resolve(&[Float64, ArrayFloat64, ArrayDynamic], Operator::Equal, &json!(1.65));
        assert!(!r.prefer_array);
        assert_eq!(r.element_type, Float64);
    }

    #[test]
    fn test_equality_ignores_dynamic_only() {
        let r = resolve(&[ArrayDynamic], Operator::Equal, &json!("x"));
        assert!(!r.prefer_array);
        assert_eq!(r.element_type, String);
    }

    #[test]
    fn test_unknown_path_uses_literal() {
        let r = resolve(&[], Operator::GreaterThan, &json!("10"));
        assert_eq!(r.value_type, Int64);
        assert!(!r.prefer_array);
        assert_eq!(r.value, json!(10));
    }

    #[test]
    fn test_numeric_text_on_string_path_stays_text() {
        let r = resolve(&[String], Operator::Contains, &json!("404"));
        assert_eq!(r.value_type, String);
        assert_eq!(r.value, json!("404"));
        assert!(!r.prefer_array);

        let r = resolve(&[String], Operator::In, &json!(["404", "500"]));
        assert_eq!(r.value_type, String);
        assert_eq!(r.value, json!(["404", "500"]));

        let r = resolve(&[ArrayString], Operator::Contains, &json!("7"));
        assert_eq!(r.element_type, String);
        assert!(r.prefer_array);
    }

    #[test]
    fn test_numeric_text_narrows_when_number_seen() {
        let r = resolve(&[String, Int64], Operator::Equal, &json!("404"));
        assert_eq!(r.value_type, Int64);
        assert_eq!(r.value, json!(404));

        let r = resolve(&[Int64, ArrayInt64, ArrayDynamic], Operator::Contains, &json!("7"));
        assert_eq!(r.element_type, Int64);
        assert_eq!(r.value, json!(7));
    }

    #[test]
    fn test_existence_never_prefers_array() {
        let r = resolve(&[ArrayString], Operator::Exists, &json!("x"));
        assert!(!r.prefer_array);
        let r = resolve(&[ArrayString], Operator::NotExists, &Value::Null);
        assert!(!r.prefer_array);
        assert_eq!(r.value_type, ArrayString);
    }
}
