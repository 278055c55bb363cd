//! Group keys and the record model.
//!
//! Records are opaque JSON-style field maps; the core only ever reads them
//! through a dimension's key function or an aggregation field selector.

use std::fmt;

use serde::Serialize;
use serde_json::Value;

/// A flat unit of input data: field name -> value.
pub type Record = serde_json::Map<String, Value>;

/// The value of a grouping dimension for one group.
///
/// Carries its own string identity (via `Display`), which is what lookup
/// maps and the diff engine key on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum GroupKey {
    /// Missing or null dimension value.
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl GroupKey {
    /// Converts a raw dimension value into a key.
    ///
    /// Arrays and objects are keyed by their compact JSON text; fan-out
    /// grouping unpacks arrays before this conversion, so an array arriving
    /// here means the caller asked for exclusive membership on a
    /// multi-valued field.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Null => GroupKey::Empty,
            Value::String(s) => GroupKey::Text(s.clone()),
            Value::Number(n) => GroupKey::Number(n.as_f64().unwrap_or(f64::NAN)),
            Value::Bool(b) => GroupKey::Bool(*b),
            other => GroupKey::Text(other.to_string()),
        }
    }

    /// The string identity used for lookup indexing and diff keying.
    pub fn identity(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupKey::Empty => Ok(()),
            GroupKey::Text(s) => write!(f, "{}", s),
            // Integral values print without a trailing ".0" so that numeric
            // keys match their source-field text form ("5", not "5.0").
            // Only within i64 range: beyond it the cast saturates and
            // distinct keys would collapse onto one identity.
            GroupKey::Number(n) if n.fract() == 0.0 && n.abs() < i64::MAX as f64 => {
                write!(f, "{}", *n as i64)
            }
            GroupKey::Number(n) => write!(f, "{}", n),
            GroupKey::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<&str> for GroupKey {
    fn from(s: &str) -> Self {
        GroupKey::Text(s.to_string())
    }
}

impl From<f64> for GroupKey {
    fn from(n: f64) -> Self {
        GroupKey::Number(n)
    }
}

/// Empty/non-finite predicate used by `truncate_on_empty`: records whose
/// dimension value is null/missing, an empty string, a non-finite number,
/// or an empty array are dropped before grouping.
pub fn blank_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Number(n) => !n.as_f64().map(f64::is_finite).unwrap_or(false),
        Value::Array(a) => a.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn given_integral_float_when_formatting_then_no_trailing_zero() {
        assert_eq!(GroupKey::Number(5.0).identity(), "5");
        assert_eq!(GroupKey::Number(5.5).identity(), "5.5");
    }

    #[test]
    fn given_huge_integral_floats_when_formatting_then_identities_stay_distinct() {
        assert_ne!(
            GroupKey::Number(1e300).identity(),
            GroupKey::Number(2e300).identity()
        );
        assert_eq!(GroupKey::Number(1e19).identity(), "10000000000000000000");
        assert_eq!(GroupKey::Number(-1e19).identity(), "-10000000000000000000");
    }

    #[test]
    fn given_json_values_when_converting_then_keys_match() {
        assert_eq!(GroupKey::from_value(&json!("CA")), GroupKey::Text("CA".into()));
        assert_eq!(GroupKey::from_value(&json!(3)), GroupKey::Number(3.0));
        assert_eq!(GroupKey::from_value(&json!(null)), GroupKey::Empty);
        assert_eq!(GroupKey::from_value(&json!(true)), GroupKey::Bool(true));
    }

    #[test]
    fn given_blank_values_when_testing_predicate_then_detected() {
        assert!(blank_value(&json!(null)));
        assert!(blank_value(&json!("")));
        assert!(blank_value(&json!([])));
        assert!(!blank_value(&json!("x")));
        assert!(!blank_value(&json!(0)));
    }
}
