//! Values carried in the command and telemetry tables

use serde::{Deserialize, Serialize};

/// A single table value: a flag or a number.
///
/// Serialized without a tag, so `Value::Bool(true)` is `true` on the wire
/// and `Value::Int(5)` is `5`. Integral JSON numbers decode as [`Value::Int`],
/// everything else numeric as [`Value::Float`]. Any other JSON type fails to
/// decode.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl Default for Value {
    /// Unset keys read as `false`
    fn default() -> Self {
        Value::Bool(false)
    }
}

impl Value {
    /// Truthiness used by toggles and flag displays: non-zero numbers are true.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
        }
    }

    /// Numeric view; flags read as `0.0` / `1.0`.
    pub fn as_f64(&self) -> f64 {
        match self {
            Value::Bool(true) => 1.0,
            Value::Bool(false) => 0.0,
            Value::Int(i) => *i as f64,
            Value::Float(f) => *f,
        }
    }

    /// Parse a value typed on a command line: `true`/`false`/`on`/`off`,
    /// then integers, then floats.
    pub fn parse_literal(s: &str) -> Option<Self> {
        match s.trim() {
            "true" | "on" => Some(Value::Bool(true)),
            "false" | "off" => Some(Value::Bool(false)),
            other => other
                .parse::<i64>()
                .map(Value::Int)
                .or_else(|_| other.parse::<f64>().map(Value::Float))
                .ok(),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
        }
    }
}
