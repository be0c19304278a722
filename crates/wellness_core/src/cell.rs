//! Scalar cell values and the tolerant coercions the vendor payloads need.

use serde_json::Value;

/// One table cell. Nested JSON never lands here: anything that is not a
/// scalar collapses to `Null` at conversion time.
#[derive(Clone, Debug, PartialEq)]
pub enum Cell {
    Null,
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
}

impl Cell {
    /// Convert a parsed JSON value into a scalar cell. Arrays and objects
    /// become `Null`, matching the one-level flattening contract.
    pub fn from_json(value: &Value) -> Cell {
        match value {
            Value::Null | Value::Array(_) | Value::Object(_) => Cell::Null,
            Value::Bool(b) => Cell::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Cell::Int(i)
                } else {
                    Cell::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::String(s) => Cell::Str(s.clone()),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Cell::Null => Value::Null,
            Cell::Int(i) => Value::from(*i),
            Cell::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Cell::Str(s) => Value::from(s.clone()),
            Cell::Bool(b) => Value::from(*b),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    /// Numeric view. Numeric-looking strings parse; everything else is None.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Int(i) => Some(*i as f64),
            Cell::Float(f) => Some(*f),
            Cell::Str(s) => s.trim().parse::<f64>().ok(),
            Cell::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Cell::Null => None,
        }
    }

    /// Integer view. Non-integral numerics (e.g. `5.5`) are rejected rather
    /// than rounded, so a bad vendor value becomes missing, not wrong.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Cell::Int(i) => Some(*i),
            Cell::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(*f as i64),
            Cell::Str(s) => {
                let n = s.trim().parse::<f64>().ok()?;
                if n.fract() == 0.0 && n.is_finite() {
                    Some(n as i64)
                } else {
                    None
                }
            }
            Cell::Bool(b) => Some(if *b { 1 } else { 0 }),
            _ => None,
        }
    }

    /// Boolean view for boolean-ish vendor flags.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Cell::Bool(b) => Some(*b),
            Cell::Int(0) => Some(false),
            Cell::Int(1) => Some(true),
            Cell::Str(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::Str(s) => Some(s),
            _ => None,
        }
    }
}
