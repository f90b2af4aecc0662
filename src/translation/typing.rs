use crate::error::SqlStencilError;
use crate::types::TypedParameter;

use super::Extraction;

/// Query text ready for positional binding.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedQuery {
    pub sql: String,
    pub params: Vec<TypedParameter>,
}

/// How a single extracted literal reaches the database.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueClass {
    /// Bound positionally with an inferred type.
    Bound(TypedParameter),
    /// Spliced into the query text in place of its placeholder.
    Inline(&'static str),
}

/// Classify one literal. Integer beats double beats the empty/NULL check beats string.
#[must_use]
pub fn classify(literal: &str) -> ValueClass {
    if let Ok(int) = literal.parse::<i64>()
        && int.to_string() == literal
    {
        return ValueClass::Bound(TypedParameter::Integer(int));
    }
    if let Ok(float) = literal.parse::<f64>()
        && float.is_finite()
        && float.to_string() == literal
    {
        return ValueClass::Bound(TypedParameter::Double(float));
    }
    if literal.is_empty() {
        return ValueClass::Inline("''");
    }
    if literal.eq_ignore_ascii_case("null") {
        return ValueClass::Inline("NULL");
    }
    ValueClass::Bound(TypedParameter::String(literal.to_owned()))
}

/// Type every extracted literal, splicing `''`/`NULL` into the text where binding is not
/// possible and collecting the rest as positional parameters.
///
/// # Errors
/// Returns `ParameterError` if an extracted offset no longer points at `placeholder`.
pub fn type_values(
    extraction: Extraction,
    placeholder: &str,
) -> Result<TypedQuery, SqlStencilError> {
    let Extraction { mut sql, values } = extraction;
    let mut params = Vec::with_capacity(values.len());
    let mut shift: isize = 0;

    for value in values {
        match classify(&value.literal) {
            ValueClass::Bound(param) => params.push(param),
            ValueClass::Inline(literal) => {
                let pos = value
                    .offset
                    .checked_add_signed(shift)
                    .filter(|pos| sql.get(*pos..pos + placeholder.len()) == Some(placeholder))
                    .ok_or_else(|| {
                        SqlStencilError::ParameterError(format!(
                            "placeholder for literal at offset {} is missing",
                            value.offset
                        ))
                    })?;
                sql.replace_range(pos..pos + placeholder.len(), literal);
                shift += literal.len() as isize - placeholder.len() as isize;
            }
        }
    }

    Ok(TypedQuery { sql, params })
}
