use serde::Serialize;

use super::{CustomDbRow, ResultSet};
use crate::settings::QuerySettings;
use crate::types::RowValues;

/// A query result after shaping by the effective settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryOutput {
    /// Statement outcome, or `false` for an empty row set when `no_rows_as_array` is off.
    Bool(bool),
    /// Single value of a one-row, one-column result.
    Scalar(RowValues),
    /// A single row returned unwrapped.
    Row(CustomDbRow),
    /// Single-column rows collapsed to their values.
    Scalars(Vec<RowValues>),
    /// Rows in result order.
    Rows(Vec<CustomDbRow>),
}

impl QueryOutput {
    /// `true` for successful statement outcomes and for any row-bearing output.
    #[must_use]
    pub fn is_success(&self) -> bool {
        !matches!(self, QueryOutput::Bool(false))
    }

    /// Number of rows represented by this output.
    #[must_use]
    pub fn row_count(&self) -> usize {
        match self {
            QueryOutput::Bool(_) => 0,
            QueryOutput::Scalar(_) | QueryOutput::Row(_) => 1,
            QueryOutput::Scalars(values) => values.len(),
            QueryOutput::Rows(rows) => rows.len(),
        }
    }

    #[must_use]
    pub fn as_scalar(&self) -> Option<&RowValues> {
        if let QueryOutput::Scalar(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_row(&self) -> Option<&CustomDbRow> {
        if let QueryOutput::Row(row) = self {
            Some(row)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_rows(&self) -> Option<&[CustomDbRow]> {
        if let QueryOutput::Rows(rows) = self {
            Some(rows)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_scalars(&self) -> Option<&[RowValues]> {
        if let QueryOutput::Scalars(values) = self {
            Some(values)
        } else {
            None
        }
    }
}

/// Shape a row set:
/// - no rows: empty `Rows` or `Bool(false)`, per `no_rows_as_array`
/// - one row and not `rows_indexed`: that row unwrapped
/// - `omit_single_key` collapses single-column rows to their value
/// - otherwise the rows in order
#[must_use]
pub fn shape_rows(result_set: ResultSet, settings: &QuerySettings) -> QueryOutput {
    let mut rows = result_set.results;
    let single_column = |rows: &[CustomDbRow]| rows.iter().all(|row| row.len() == 1);

    if rows.is_empty() {
        return if settings.no_rows_as_array {
            QueryOutput::Rows(rows)
        } else {
            QueryOutput::Bool(false)
        };
    }

    if rows.len() == 1 && !settings.rows_indexed {
        let row = rows.remove(0);
        return if settings.omit_single_key && row.len() == 1 {
            row.into_single_value()
                .map_or(QueryOutput::Bool(false), QueryOutput::Scalar)
        } else {
            QueryOutput::Row(row)
        };
    }

    if settings.omit_single_key && single_column(&rows) {
        QueryOutput::Scalars(
            rows.into_iter()
                .filter_map(CustomDbRow::into_single_value)
                .collect(),
        )
    } else {
        QueryOutput::Rows(rows)
    }
}
