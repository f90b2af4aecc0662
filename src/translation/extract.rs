use crate::error::{DelimiterSide, SqlStencilError};

use super::DelimiterPair;

/// A literal lifted out of a template, keyed by where its opening delimiter sat.
///
/// `offset` is the byte offset of the opening delimiter in the text as it stood when the
/// literal was extracted. Because extraction always takes the leftmost pair, that is also
/// the offset of the literal's placeholder in the rewritten text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedValue {
    pub offset: usize,
    pub literal: String,
}

/// Rewritten text plus the literals that were removed from it, in offset order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub sql: String,
    pub values: Vec<ExtractedValue>,
}

/// Replace every delimited span in `text` with `placeholder` and collect the enclosed text.
///
/// When a delimiter has no partner the call fails with
/// [`SqlStencilError::UnmatchedDelimiter`] if `fail_on_unmatched` is set; otherwise scanning
/// stops and whatever was extracted so far is returned. `max_iterations` caps the number of
/// extractions (`None` means unbounded).
///
/// # Errors
/// Returns `UnmatchedDelimiter` as described above, or `ConfigError` when the delimiter pair
/// is unusable (empty or identical tokens) or `placeholder` contains one of its tokens.
///
/// ```rust
/// use sql_stencil::prelude::*;
///
/// let out = extract("SELECT <%1%>", &DelimiterPair::default(), "?", true, None).unwrap();
/// assert_eq!(out.sql, "SELECT ?");
/// assert_eq!(out.values[0].literal, "1");
/// assert_eq!(out.values[0].offset, 7);
/// ```
pub fn extract(
    text: &str,
    delimiters: &DelimiterPair,
    placeholder: &str,
    fail_on_unmatched: bool,
    max_iterations: Option<usize>,
) -> Result<Extraction, SqlStencilError> {
    if !delimiters.is_usable() {
        return Err(SqlStencilError::ConfigError(format!(
            "unusable delimiter pair {delimiters}"
        )));
    }
    if placeholder.contains(delimiters.open.as_str())
        || placeholder.contains(delimiters.close.as_str())
    {
        return Err(SqlStencilError::ConfigError(format!(
            "placeholder {placeholder:?} contains a token of {delimiters}"
        )));
    }

    let open_len = delimiters.open.len();
    let close_len = delimiters.close.len();
    let mut sql = text.to_owned();
    let mut values = Vec::new();

    loop {
        if max_iterations.is_some_and(|max| values.len() >= max) {
            break;
        }

        let open = sql.find(delimiters.open.as_str());
        let close = sql.find(delimiters.close.as_str());

        let unmatched = match (open, close) {
            (None, None) => break,
            (Some(o), Some(c)) if c >= o + open_len => {
                let literal = sql[o + open_len..c].to_owned();
                sql.replace_range(o..c + close_len, placeholder);
                values.push(ExtractedValue { offset: o, literal });
                continue;
            }
            (Some(o), Some(c)) if c < o => (DelimiterSide::Closing, c),
            (Some(o), _) => (DelimiterSide::Opening, o),
            (None, Some(c)) => (DelimiterSide::Closing, c),
        };

        let (kind, offset) = unmatched;
        if fail_on_unmatched {
            return Err(SqlStencilError::UnmatchedDelimiter { kind, offset });
        }
        tracing::debug!(%kind, offset, "stopping extraction at unmatched delimiter");
        break;
    }

    Ok(Extraction { sql, values })
}
