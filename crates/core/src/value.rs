//! Tagged value type for generically typed measures.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Value carried by measures whose concrete type is only known at
/// registration time (introspective builders, registries).
///
/// Structured values that do not fit the scalar kinds are carried as
/// pre-rendered JSON in [`Opaque`](MeasureValue::Opaque).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MeasureValue {
    /// Signed integer value.
    Integer(i64),
    /// Floating-point value.
    Real(f64),
    /// Boolean value.
    Boolean(bool),
    /// Text value.
    Text(String),
    /// Pre-rendered JSON for structured or null values.
    Opaque(String),
}

impl MeasureValue {
    /// Integer content, if this is an integer value.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            MeasureValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric content widened to `f64`, if this is numeric.
    pub fn as_real(&self) -> Option<f64> {
        match self {
            MeasureValue::Integer(v) => Some(*v as f64),
            MeasureValue::Real(v) => Some(*v),
            _ => None,
        }
    }

    /// Boolean content, if this is a boolean value.
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            MeasureValue::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    /// Text content, if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MeasureValue::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for MeasureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeasureValue::Integer(v) => write!(f, "{}", v),
            MeasureValue::Real(v) => write!(f, "{}", v),
            MeasureValue::Boolean(v) => write!(f, "{}", v),
            MeasureValue::Text(v) => write!(f, "{}", v),
            MeasureValue::Opaque(v) => write!(f, "{}", v),
        }
    }
}

impl From<i64> for MeasureValue {
    fn from(value: i64) -> Self {
        MeasureValue::Integer(value)
    }
}

impl From<i32> for MeasureValue {
    fn from(value: i32) -> Self {
        MeasureValue::Integer(value as i64)
    }
}

impl From<u32> for MeasureValue {
    fn from(value: u32) -> Self {
        MeasureValue::Integer(value as i64)
    }
}

impl From<u64> for MeasureValue {
    fn from(value: u64) -> Self {
        match i64::try_from(value) {
            Ok(v) => MeasureValue::Integer(v),
            Err(_) => MeasureValue::Real(value as f64),
        }
    }
}

impl From<usize> for MeasureValue {
    fn from(value: usize) -> Self {
        MeasureValue::from(value as u64)
    }
}

impl From<f64> for MeasureValue {
    fn from(value: f64) -> Self {
        MeasureValue::Real(value)
    }
}

impl From<f32> for MeasureValue {
    fn from(value: f32) -> Self {
        MeasureValue::Real(value as f64)
    }
}

impl From<bool> for MeasureValue {
    fn from(value: bool) -> Self {
        MeasureValue::Boolean(value)
    }
}

impl From<String> for MeasureValue {
    fn from(value: String) -> Self {
        MeasureValue::Text(value)
    }
}

impl From<&str> for MeasureValue {
    fn from(value: &str) -> Self {
        MeasureValue::Text(value.to_string())
    }
}

impl From<serde_json::Value> for MeasureValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Bool(v) => MeasureValue::Boolean(v),
            serde_json::Value::Number(n) => {
                if let Some(v) = n.as_i64() {
                    MeasureValue::Integer(v)
                } else if let Some(v) = n.as_f64() {
                    MeasureValue::Real(v)
                } else {
                    MeasureValue::Opaque(n.to_string())
                }
            }
            serde_json::Value::String(v) => MeasureValue::Text(v),
            other => MeasureValue::Opaque(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_scalars_map_to_scalar_kinds() {
        assert_eq!(
            MeasureValue::from(serde_json::json!(3)),
            MeasureValue::Integer(3)
        );
        assert_eq!(
            MeasureValue::from(serde_json::json!(2.5)),
            MeasureValue::Real(2.5)
        );
        assert_eq!(
            MeasureValue::from(serde_json::json!(true)),
            MeasureValue::Boolean(true)
        );
        assert_eq!(
            MeasureValue::from(serde_json::json!("ok")),
            MeasureValue::Text("ok".to_string())
        );
    }

    #[test]
    fn test_structured_json_becomes_opaque() {
        let value = MeasureValue::from(serde_json::json!({ "a": 1 }));
        assert_eq!(value, MeasureValue::Opaque("{\"a\":1}".to_string()));
        assert_eq!(
            MeasureValue::from(serde_json::Value::Null),
            MeasureValue::Opaque("null".to_string())
        );
    }

    #[test]
    fn test_as_real_widens_integers() {
        assert_eq!(MeasureValue::Integer(4).as_real(), Some(4.0));
        assert_eq!(MeasureValue::Real(0.5).as_real(), Some(0.5));
        assert_eq!(MeasureValue::Text("x".into()).as_real(), None);
    }
}
