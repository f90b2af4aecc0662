use std::fmt;

use serde::{Deserialize, Serialize};

/// Values that can be stored in a database row or handed to bulk inserts.
///
/// ```rust
/// use sql_stencil::prelude::*;
///
/// let row = vec![
///     RowValues::Int(1),
///     RowValues::Text("alice".into()),
///     RowValues::Null,
/// ];
/// # let _ = row;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RowValues {
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Text/string value
    Text(String),
    /// Boolean value
    Bool(bool),
    /// NULL value
    Null,
    /// Binary data
    Blob(Vec<u8>),
}

impl RowValues {
    /// Check if this value is NULL
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_int(&self) -> Option<&i64> {
        if let RowValues::Int(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let RowValues::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        if let RowValues::Float(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            RowValues::Bool(value) => Some(*value),
            RowValues::Int(1) => Some(true),
            RowValues::Int(0) => Some(false),
            _ => None,
        }
    }
}

/// Type tag of a positionally bound parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    Integer,
    Double,
    String,
}

impl ParamType {
    /// One-letter tag used in the parameter type string (`i`, `d`, `s`).
    #[must_use]
    pub fn tag(self) -> char {
        match self {
            ParamType::Integer => 'i',
            ParamType::Double => 'd',
            ParamType::String => 's',
        }
    }
}

/// A value bound to a prepared statement together with its inferred type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum TypedParameter {
    Integer(i64),
    Double(f64),
    String(String),
}

impl TypedParameter {
    #[must_use]
    pub fn param_type(&self) -> ParamType {
        match self {
            TypedParameter::Integer(_) => ParamType::Integer,
            TypedParameter::Double(_) => ParamType::Double,
            TypedParameter::String(_) => ParamType::String,
        }
    }
}

impl fmt::Display for TypedParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedParameter::Integer(i) => write!(f, "{i}"),
            TypedParameter::Double(d) => write!(f, "{d}"),
            TypedParameter::String(s) => f.write_str(s),
        }
    }
}

/// Build the positional type string for a parameter list, e.g. `"isd"`.
#[must_use]
pub fn param_type_string(params: &[TypedParameter]) -> String {
    params.iter().map(|p| p.param_type().tag()).collect()
}
