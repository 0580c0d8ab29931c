//! Runtime value types

use serde_json::{Map, Number, Value as JsonValue};
use std::collections::HashMap;
use std::fmt;

/// Runtime value type
///
/// `Undefined` is the placeholder bound to missing call arguments and
/// returned by permissive field lookups; it is distinct from `Null`.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Val {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Num(f64),
    Str(String),
    List(Vec<Val>),
    Obj(HashMap<String, Val>),
}

impl Val {
    /// Check if value is truthy (for conditionals)
    ///
    /// Follows the host expression language: `false`, `0`, `NaN`, the empty
    /// string, `null` and `undefined` are falsy, everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Val::Undefined | Val::Null => false,
            Val::Bool(b) => *b,
            Val::Num(n) => *n != 0.0 && !n.is_nan(),
            Val::Str(s) => !s.is_empty(),
            Val::List(_) | Val::Obj(_) => true,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Val::Undefined => "undefined",
            Val::Null => "null",
            Val::Bool(_) => "boolean",
            Val::Num(_) => "number",
            Val::Str(_) => "string",
            Val::List(_) => "list",
            Val::Obj(_) => "record",
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Val::Num(n) => Some(*n),
            _ => None,
        }
    }

    /// Numeric coercion used by the arithmetic operators of the evaluator
    pub fn to_number(&self) -> f64 {
        match self {
            Val::Num(n) => *n,
            Val::Bool(true) => 1.0,
            Val::Bool(false) | Val::Null => 0.0,
            Val::Str(s) if s.trim().is_empty() => 0.0,
            Val::Str(s) => s.trim().parse().unwrap_or(f64::NAN),
            Val::Undefined | Val::List(_) | Val::Obj(_) => f64::NAN,
        }
    }

    /// Permissive field access: a missing field, or a field of something that
    /// is not a record, yields `Undefined` instead of failing.
    pub fn field(&self, name: &str) -> Val {
        match self {
            Val::Obj(map) => map.get(name).cloned().unwrap_or(Val::Undefined),
            Val::List(items) if name == "length" => Val::Num(items.len() as f64),
            Val::Str(s) if name == "length" => Val::Num(s.chars().count() as f64),
            _ => Val::Undefined,
        }
    }

    /* ===================== JSON Conversion ===================== */

    /// Convert to JSON for storage. Non-finite numbers and `undefined`
    /// become `null`, the same way a JSON encoder would treat them.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Val::Undefined | Val::Null => JsonValue::Null,
            Val::Bool(b) => JsonValue::Bool(*b),
            Val::Num(n) => json_number(*n),
            Val::Str(s) => JsonValue::String(s.clone()),
            Val::List(items) => JsonValue::Array(items.iter().map(Val::to_json).collect()),
            Val::Obj(map) => {
                let mut obj = Map::new();
                for (k, v) in map {
                    obj.insert(k.clone(), v.to_json());
                }
                JsonValue::Object(obj)
            }
        }
    }
}

/// Integral values are written without a fraction, as `1` rather than `1.0`
fn json_number(n: f64) -> JsonValue {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        return JsonValue::from(n as i64);
    }
    Number::from_f64(n)
        .map(JsonValue::Number)
        .unwrap_or(JsonValue::Null)
}

impl From<JsonValue> for Val {
    fn from(json: JsonValue) -> Self {
        match json {
            JsonValue::Null => Val::Null,
            JsonValue::Bool(b) => Val::Bool(b),
            JsonValue::Number(n) => Val::Num(n.as_f64().unwrap_or(f64::NAN)),
            JsonValue::String(s) => Val::Str(s),
            JsonValue::Array(items) => Val::List(items.into_iter().map(Val::from).collect()),
            JsonValue::Object(obj) => {
                Val::Obj(obj.into_iter().map(|(k, v)| (k, Val::from(v))).collect())
            }
        }
    }
}

/// Format a number the way the host language prints it: integral values
/// without a fractional part, non-finite values by name.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let name = if n > 0.0 { "Infinity" } else { "-Infinity" };
        name.to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl fmt::Display for Val {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Val::Undefined => write!(f, "undefined"),
            Val::Null => write!(f, "null"),
            Val::Bool(b) => write!(f, "{}", b),
            Val::Num(n) => write!(f, "{}", format_number(*n)),
            Val::Str(s) => write!(f, "{}", s),
            Val::List(_) | Val::Obj(_) => write!(f, "{}", self.to_json()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::hashmap;
    use serde_json::json;

    #[test]
    fn test_display_numbers() {
        assert_eq!(Val::Num(12.0).to_string(), "12");
        assert_eq!(Val::Num(0.5).to_string(), "0.5");
        assert_eq!(Val::Num(f64::INFINITY).to_string(), "Infinity");
        assert_eq!(Val::Num(f64::NAN).to_string(), "NaN");
    }

    #[test]
    fn test_truthiness() {
        assert!(!Val::Num(0.0).is_truthy());
        assert!(!Val::Str(String::new()).is_truthy());
        assert!(!Val::Undefined.is_truthy());
        assert!(Val::List(vec![]).is_truthy());
        assert!(Val::Str("0".into()).is_truthy());
    }

    #[test]
    fn test_json_conversion() {
        let val = Val::from(json!({"hp": 10, "tags": ["a", null]}));
        assert_eq!(
            val,
            Val::Obj(hashmap! {
                "hp".to_string() => Val::Num(10.0),
                "tags".to_string() => Val::List(vec![Val::Str("a".into()), Val::Null]),
            })
        );
        assert_eq!(val.to_json(), json!({"hp": 10, "tags": ["a", null]}));
        assert_eq!(Val::Num(0.25).to_json(), json!(0.25));
        assert_eq!(Val::Num(f64::NAN).to_json(), JsonValue::Null);
    }

    #[test]
    fn test_field_is_permissive() {
        assert_eq!(Val::Null.field("x"), Val::Undefined);
        assert_eq!(Val::List(vec![Val::Null]).field("length"), Val::Num(1.0));
    }
}
