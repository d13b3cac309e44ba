//! Value conventions for items flowing through a pipeline.
//!
//! Items are plain `serde_json::Value`s — YAML stage parameters are
//! transcoded to JSON at parse time, and every element consumes and produces
//! JSON values. The helpers here pin down the conventions the runtime relies
//! on: how a value prints, when it is truthy, and how dotted/indexed paths
//! resolve.

use serde_json::Value as JsonValue;

/// The item type flowing between pipeline stages.
pub type Value = JsonValue;

/// Short type name for error messages ("string", "array", ...).
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) => {
            if n.is_f64() {
                "float"
            } else {
                "int"
            }
        }
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Truthiness used by `Filter` conditions and boolean expressions.
///
/// Null, false, zero, the empty string, the empty array and the empty
/// object are false; everything else is true.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Render a value the way templates and `Console` print it.
///
/// Strings print bare (no quotes); everything else prints as compact JSON.
pub fn to_display_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Total ordering over values, used by `Sort` keys.
///
/// Cross-type comparisons order by type rank (null < bool < number < string
/// < array < object) so sorting mixed keys stays deterministic.
pub fn compare(a: &Value, b: &Value) -> std::cmp::Ordering {
    use std::cmp::Ordering;

    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(f64::NAN), y.as_f64().unwrap_or(f64::NAN));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (xi, yi) in x.iter().zip(y.iter()) {
                let ord = compare(xi, yi);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        _ => rank(a).cmp(&rank(b)),
    }
}

/// Numeric view of a value, if it has one.
pub fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn truthiness_follows_the_data() {
        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!(false)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&json!([])));
        assert!(!is_truthy(&json!({})));
        assert!(is_truthy(&json!(1)));
        assert!(is_truthy(&json!("x")));
        assert!(is_truthy(&json!([0])));
    }

    #[test]
    fn display_strings_print_bare() {
        assert_eq!(to_display_string(&json!("hello")), "hello");
        assert_eq!(to_display_string(&json!(42)), "42");
        assert_eq!(to_display_string(&json!({"a": 1})), r#"{"a":1}"#);
        assert_eq!(to_display_string(&json!(null)), "");
    }

    #[test]
    fn compare_orders_numbers_and_mixed_types() {
        use std::cmp::Ordering;
        assert_eq!(compare(&json!(1), &json!(2)), Ordering::Less);
        assert_eq!(compare(&json!(2.5), &json!(2)), Ordering::Greater);
        assert_eq!(compare(&json!("a"), &json!("b")), Ordering::Less);
        // null sorts before everything
        assert_eq!(compare(&json!(null), &json!("a")), Ordering::Less);
    }
}
