use std::sync::Arc;

use rusqlite::Statement;
use rusqlite::types::Value;

use crate::query_utils::extract_column_names;
use crate::results::ResultSet;
use crate::types::RowValues;

/// Extract a `RowValues` from a `SQLite` row.
///
/// # Errors
/// Returns the rusqlite error if the value cannot be read.
pub fn sqlite_extract_value_sync(
    row: &rusqlite::Row,
    idx: usize,
) -> Result<RowValues, rusqlite::Error> {
    let value: Value = row.get(idx)?;
    Ok(match value {
        Value::Null => RowValues::Null,
        Value::Integer(i) => RowValues::Int(i),
        Value::Real(f) => RowValues::Float(f),
        Value::Text(s) => RowValues::Text(s),
        Value::Blob(b) => RowValues::Blob(b),
    })
}

/// Step a statement whose parameters are already bound and collect its rows.
///
/// # Errors
/// Returns the rusqlite error if stepping or reading a value fails.
pub fn build_result_set(stmt: &mut Statement<'_>) -> Result<ResultSet, rusqlite::Error> {
    let column_names = extract_column_names(stmt.column_names(), |name| *name);
    let col_count = column_names.len();

    let mut result_set = ResultSet::with_capacity(10);
    result_set.set_column_names(Arc::new(column_names));

    let mut rows = stmt.raw_query();
    while let Some(row) = rows.next()? {
        let mut row_values = Vec::with_capacity(col_count);
        for i in 0..col_count {
            row_values.push(sqlite_extract_value_sync(row, i)?);
        }
        result_set.add_row_values(row_values);
    }

    Ok(result_set)
}
