use serde::{Deserialize, Serialize};
use std::fmt;

/// A concrete native value for one dimension of a parameter space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    Real(f64),
    Integer(i64),
    /// A categorical choice, compared by JSON equality against the
    /// dimension's category list.
    Category(serde_json::Value),
}

impl ParamValue {
    /// Numeric view of the value. Categories have none.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Real(v) => Some(*v),
            Self::Integer(v) => Some(*v as f64),
            Self::Category(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_category(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Category(v) => Some(v),
            _ => None,
        }
    }

    /// Short kind label used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Real(_) => "real",
            Self::Integer(_) => "integer",
            Self::Category(_) => "categorical",
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Real(v) => write!(f, "{v}"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Category(v) => write!(f, "{v}"),
        }
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Real(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::Category(serde_json::Value::String(v.to_string()))
    }
}

/// A native point: one value per dimension, in space order.
pub type Point = Vec<ParamValue>;

/// Build an all-real point from plain floats.
pub fn real_point(values: &[f64]) -> Point {
    values.iter().copied().map(ParamValue::Real).collect()
}
