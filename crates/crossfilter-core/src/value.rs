use ordered_float::OrderedFloat;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::Arc;

/// Unique identifier of a row within one dataset version.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowId(pub u64);

impl RowId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for RowId {
    fn from(value: u64) -> Self {
        RowId(value)
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A numeric filter value.
///
/// Filter values are used as hash keys and sorted for display, so they need total equality and
/// ordering. `-0.0` is normalized to `0.0` and every NaN is treated as the same value (sorting
/// after all other numbers), matching how a `GROUP BY` over the column would bucket them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Value(OrderedFloat<f64>);

impl Value {
    pub fn new(n: f64) -> Self {
        if n == 0.0 {
            return Value(OrderedFloat(0.0));
        }
        if n.is_nan() {
            return Value(OrderedFloat(f64::NAN));
        }
        Value(OrderedFloat(n))
    }

    pub fn as_f64(self) -> f64 {
        self.0.into_inner()
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::new(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::new(value as f64)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::new(f64::from(value))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // `f64`'s `Display` already prints integral values without a trailing `.0`.
        write!(f, "{}", self.as_f64())
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_f64())
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        f64::deserialize(deserializer).map(Value::new)
    }
}

/// A single field of a row.
///
/// Only [`Cell::Number`] cells can be indexed; text and blank fields ride along for display.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Number(f64),
    Text(Arc<str>),
    Blank,
}

impl Cell {
    pub fn is_number(&self) -> bool {
        matches!(self, Cell::Number(_))
    }

    pub fn as_value(&self) -> Option<Value> {
        match self {
            Cell::Number(n) => Some(Value::new(*n)),
            _ => None,
        }
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Number(value)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::Number(value as f64)
    }
}

impl From<i32> for Cell {
    fn from(value: i32) -> Self {
        Cell::Number(f64::from(value))
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(Arc::from(value))
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Number(n) => write!(f, "{n}"),
            Cell::Text(s) => f.write_str(s),
            Cell::Blank => f.write_str(""),
        }
    }
}
