//! Column values read from and bound into statements.

use std::fmt;

/// A single column value.
///
/// Types without an exact, hashable representation (floats, decimals,
/// dates) are carried as their textual form; both backends compare them
/// back against the column through an implicit cast.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    /// NULL value
    Null,
    /// Integer value
    Integer(i64),
    /// String value
    String(String),
    /// Raw bytes (for binary data)
    Bytes(Vec<u8>),
}

impl Value {
    /// Check if this is a NULL value
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get as string, or None if not a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Textual form used by methods that derive output from the input
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Integer(i) => Some(i.to_string()),
            Value::String(s) => Some(s.clone()),
            Value::Bytes(b) => Some(String::from_utf8_lossy(b).into_owned()),
        }
    }

    /// Interpret a value as a count (used for aggregate results)
    pub fn as_count(&self) -> Option<u64> {
        match self {
            Value::Integer(i) => u64::try_from(*i).ok(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Convert a structured configuration value into a column value.
    pub fn from_yaml(value: &serde_yaml::Value) -> Option<Value> {
        match value {
            serde_yaml::Value::Null => Some(Value::Null),
            serde_yaml::Value::Bool(b) => Some(Value::Integer(i64::from(*b))),
            serde_yaml::Value::Number(n) => Some(match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => Value::String(n.to_string()),
            }),
            serde_yaml::Value::String(s) => Some(Value::String(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Integer(i) => write!(f, "{}", i),
            Value::String(s) => write!(f, "'{}'", s),
            Value::Bytes(b) => write!(f, "<blob {} bytes>", b.len()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}
