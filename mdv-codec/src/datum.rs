use std::fmt::{Display, Formatter};

/// A single logical input value of a column, before encoding.
#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    Null,
    Int(i64),
    Float(f64),
    Str(String),
}

impl Datum {
    pub fn is_null(&self) -> bool {
        matches!(self, Datum::Null)
    }

    /// Numeric coercion: unparseable or absent values become NaN.
    pub fn to_f64(&self) -> f64 {
        match self {
            Datum::Null => f64::NAN,
            Datum::Int(v) => *v as f64,
            Datum::Float(v) => *v,
            Datum::Str(s) => s.trim().parse::<f64>().unwrap_or(f64::NAN),
        }
    }

    /// Text coercion: `None` for absent values, empty strings and NaN.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Datum::Null => None,
            Datum::Int(v) => Some(v.to_string()),
            Datum::Float(v) if v.is_nan() => None,
            Datum::Float(v) => Some(v.to_string()),
            Datum::Str(s) if s.is_empty() => None,
            Datum::Str(s) => Some(s.clone()),
        }
    }
}

impl Display for Datum {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Datum::Null => write!(f, "null"),
            Datum::Int(v) => write!(f, "{v}"),
            Datum::Float(v) => write!(f, "{v}"),
            Datum::Str(s) => write!(f, "\"{s}\""),
        }
    }
}

impl From<&str> for Datum {
    fn from(value: &str) -> Self {
        Datum::Str(value.to_string())
    }
}

impl From<String> for Datum {
    fn from(value: String) -> Self {
        Datum::Str(value)
    }
}

impl From<f64> for Datum {
    fn from(value: f64) -> Self {
        Datum::Float(value)
    }
}

impl From<f32> for Datum {
    fn from(value: f32) -> Self {
        Datum::Float(f64::from(value))
    }
}

impl From<i64> for Datum {
    fn from(value: i64) -> Self {
        Datum::Int(value)
    }
}

impl From<i32> for Datum {
    fn from(value: i32) -> Self {
        Datum::Int(i64::from(value))
    }
}

impl<T: Into<Datum>> From<Option<T>> for Datum {
    fn from(value: Option<T>) -> Self {
        value.map_or(Datum::Null, Into::into)
    }
}

impl From<&serde_json::Value> for Datum {
    fn from(value: &serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => Datum::Null,
            Value::Bool(b) => Datum::Str(b.to_string()),
            Value::Number(n) => n
                .as_i64()
                .map(Datum::Int)
                .or_else(|| n.as_f64().map(Datum::Float))
                .unwrap_or(Datum::Null),
            Value::String(s) => Datum::Str(s.clone()),
            other => Datum::Str(other.to_string()),
        }
    }
}

/// Collect anything convertible into a column of [`Datum`]s.
pub fn datums<I, T>(values: I) -> Vec<Datum>
where
    I: IntoIterator<Item = T>,
    T: Into<Datum>,
{
    values.into_iter().map(Into::into).collect()
}
