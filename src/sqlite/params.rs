use rusqlite::types::Value;

use crate::types::TypedParameter;

/// Convert a bound parameter to a rusqlite `Value`.
#[must_use]
pub fn typed_param_to_sqlite_value(param: &TypedParameter) -> Value {
    match param {
        TypedParameter::Integer(i) => Value::Integer(*i),
        TypedParameter::Double(f) => Value::Real(*f),
        TypedParameter::String(s) => Value::Text(s.clone()),
    }
}
