//! Multi-row inserts: inlined for small batches, staged to a file and bulk loaded above
//! the `max_insert_rows` threshold.

use std::fmt::Write as _;
use std::io::{BufWriter, Write};

use crate::driver::{BulkLoad, quote_identifier};
use crate::error::SqlStencilError;
use crate::query_log::QueryLogEntry;
use crate::results::QueryOutput;
use crate::session::Session;
use crate::settings::{QuerySettings, SettingsOverrides};
use crate::types::RowValues;

const FIELD_TERMINATOR: char = '\t';
const NULL_MARKER: &str = "\\N";

/// Render one value for an inlined INSERT.
///
/// `NULL` is written as is and blobs as hex literals. Text enclosed in the `raw_fragment`
/// pair is trusted SQL and passes through without its markers. Everything else is
/// wrapped in the template delimiters so it is bound as a parameter when the statement runs.
///
/// # Errors
/// Returns `ParameterError` when a text value contains a delimiter token and therefore
/// cannot be wrapped safely.
///
/// ```rust
/// use sql_stencil::prelude::*;
///
/// let settings = QuerySettings::default();
/// assert_eq!(secure_sql_value(&RowValues::Int(4), &settings).unwrap(), "<%4%>");
/// assert_eq!(secure_sql_value(&RowValues::Null, &settings).unwrap(), "NULL");
/// assert_eq!(
///     secure_sql_value(&RowValues::Text("{NOW()}".into()), &settings).unwrap(),
///     "NOW()"
/// );
/// ```
pub fn secure_sql_value(
    value: &RowValues,
    settings: &QuerySettings,
) -> Result<String, SqlStencilError> {
    let delimiters = &settings.delimiters;
    match value {
        RowValues::Null => Ok("NULL".to_string()),
        RowValues::Int(i) => Ok(delimiters.wrap(&i.to_string())),
        RowValues::Float(f) => Ok(delimiters.wrap(&f.to_string())),
        RowValues::Bool(b) => Ok(delimiters.wrap(if *b { "1" } else { "0" })),
        RowValues::Blob(bytes) => {
            let mut hex = String::with_capacity(bytes.len() * 2 + 3);
            hex.push_str("X'");
            for byte in bytes {
                let _ = write!(hex, "{byte:02X}");
            }
            hex.push('\'');
            Ok(hex)
        }
        RowValues::Text(text) => {
            if let Some(raw) = settings.raw_fragment.unwrap_enclosed(text) {
                return Ok(raw.to_string());
            }
            if text.contains(&delimiters.open) || text.contains(&delimiters.close) {
                return Err(SqlStencilError::ParameterError(format!(
                    "value contains a template delimiter and cannot be inlined: {text:?}"
                )));
            }
            Ok(delimiters.wrap(text))
        }
    }
}

impl Session {
    /// [`secure_sql_value`] with this session's settings.
    ///
    /// # Errors
    /// See [`secure_sql_value`].
    pub fn secure_sql_value(&self, value: &RowValues) -> Result<String, SqlStencilError> {
        secure_sql_value(value, &self.settings())
    }

    /// Insert `rows` into `table`.
    ///
    /// # Errors
    /// See [`Session::insert_rows_with`].
    pub fn insert_rows(
        &mut self,
        table: &str,
        columns: &[&str],
        rows: &[Vec<RowValues>],
    ) -> Result<QueryOutput, SqlStencilError> {
        self.insert_rows_with(table, columns, rows, &SettingsOverrides::new())
    }

    /// Insert `rows` into `table` with per-call setting overrides.
    ///
    /// Up to `max_insert_rows` rows (or any number when it is negative) are inlined into one
    /// multi-row INSERT. Larger batches are written to a temporary tab-separated file and
    /// loaded in a transaction; the ids generated for them are then derived from the
    /// table's `MAX(id)` and recorded on the load's log entry. An empty batch does nothing.
    ///
    /// # Errors
    /// - `ParameterError` when a row's length differs from `columns` or a value cannot be
    ///   rendered
    /// - `MissingCapability` when a bulk load is needed and the driver cannot do one
    /// - `Io` when the staging file cannot be written
    /// - any query error, subject to `throw_errors`
    pub fn insert_rows_with(
        &mut self,
        table: &str,
        columns: &[&str],
        rows: &[Vec<RowValues>],
        overrides: &SettingsOverrides,
    ) -> Result<QueryOutput, SqlStencilError> {
        if rows.is_empty() {
            tracing::debug!(table, "no rows to insert");
            return Ok(QueryOutput::Bool(true));
        }
        if let Some((index, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(SqlStencilError::ParameterError(format!(
                "row {index} has {} values, expected {}",
                row.len(),
                columns.len()
            )));
        }

        let settings = self.effective_settings(overrides)?;
        let inline = settings.max_insert_rows < 0
            || i64::try_from(rows.len()).is_ok_and(|n| n <= settings.max_insert_rows);
        if inline {
            let sql = inline_insert(table, columns, rows, &settings)?;
            self.run(&sql, &settings)
        } else {
            self.bulk_load(table, columns, rows, &settings)
        }
    }

    fn bulk_load(
        &mut self,
        table: &str,
        columns: &[&str],
        rows: &[Vec<RowValues>],
        settings: &QuerySettings,
    ) -> Result<QueryOutput, SqlStencilError> {
        if !self.connection_mut()?.capabilities().bulk_load {
            return Err(SqlStencilError::MissingCapability("bulk load".into()));
        }

        let staged = stage_rows(rows)?;
        let load = BulkLoad {
            path: staged.path().to_path_buf(),
            table: table.to_string(),
            columns: columns.iter().map(ToString::to_string).collect(),
            field_terminator: FIELD_TERMINATOR,
            null_marker: NULL_MARKER.to_string(),
        };
        tracing::debug!(table, rows = rows.len(), path = %load.path.display(), "bulk loading");

        let loaded = self.transact(settings.throw_errors, |tx| tx.load_staged(&load, settings));
        if let Err(err) = staged.close() {
            tracing::warn!(%err, path = %load.path.display(), "failed to remove staging file");
        }
        let Some(index) = loaded? else {
            return Ok(QueryOutput::Bool(false));
        };

        let last_id = self.max_id(table, settings)?;
        if let (Some(entry), Some(last_id)) = (self.log.entry_mut(index), last_id) {
            let count = i64::try_from(rows.len()).unwrap_or(i64::MAX);
            entry.insert_id = Some(last_id);
            entry.insert_ids = (last_id - count + 1..=last_id).collect();
        }
        Ok(QueryOutput::Bool(true))
    }

    /// Run the driver's file load and log it; returns the log index of the load entry.
    fn load_staged(
        &mut self,
        load: &BulkLoad,
        settings: &QuerySettings,
    ) -> Result<usize, SqlStencilError> {
        let statement = load.statement();
        let conn = self
            .conn
            .as_deref_mut()
            .ok_or(SqlStencilError::NoActiveConnection)?;
        let index = self.log.push(QueryLogEntry::new(
            &statement,
            &statement,
            conn.database_name(),
            settings,
            &[],
        ));
        let result = conn.load_file(load);
        if let Some(entry) = self.log.entry_mut(index) {
            match &result {
                Ok(loaded) => {
                    entry.affected_rows = *loaded;
                    entry.result = Some(QueryOutput::Bool(true));
                }
                Err(err) => {
                    entry.error = Some(err.clone());
                    entry.result = Some(QueryOutput::Bool(false));
                }
            }
        }
        result
            .map(|_| index)
            .map_err(SqlStencilError::QueryExecutionFailed)
    }

    /// Highest `id` in `table`. The follow-up query is kept out of the visible log.
    fn max_id(
        &mut self,
        table: &str,
        settings: &QuerySettings,
    ) -> Result<Option<i64>, SqlStencilError> {
        let follow_up = settings.with_overrides(
            &SettingsOverrides::new()
                .set("omitSingleKey", true)
                .set("rowsIndexed", false)
                .set("throwErrors", true),
        )?;
        let sql = format!(
            "SELECT MAX({}) FROM {}",
            quote_identifier("id"),
            quote_identifier(table)
        );
        let output = self.run(&sql, &follow_up);
        self.log.discard_last();
        Ok(output?.as_scalar().and_then(RowValues::as_int).copied())
    }
}

fn inline_insert(
    table: &str,
    columns: &[&str],
    rows: &[Vec<RowValues>],
    settings: &QuerySettings,
) -> Result<String, SqlStencilError> {
    let mut sql = format!(
        "INSERT INTO {} ({}) VALUES ",
        quote_identifier(table),
        columns
            .iter()
            .map(|c| quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", ")
    );
    for (i, row) in rows.iter().enumerate() {
        if i > 0 {
            sql.push_str(", ");
        }
        let values = row
            .iter()
            .map(|value| secure_sql_value(value, settings))
            .collect::<Result<Vec<_>, _>>()?;
        sql.push('(');
        sql.push_str(&values.join(", "));
        sql.push(')');
    }
    Ok(sql)
}

/// Write `rows` to a fresh temporary file, one tab-separated line per row.
fn stage_rows(rows: &[Vec<RowValues>]) -> Result<tempfile::NamedTempFile, SqlStencilError> {
    let mut staged = tempfile::Builder::new()
        .prefix("sql-stencil-")
        .suffix(".tsv")
        .tempfile()?;
    {
        let mut out = BufWriter::new(staged.as_file_mut());
        for row in rows {
            let fields = row
                .iter()
                .map(staged_field)
                .collect::<Result<Vec<_>, _>>()?;
            out.write_all(fields.join("\t").as_bytes())?;
            out.write_all(b"\n")?;
        }
        out.flush()?;
    }
    Ok(staged)
}

fn staged_field(value: &RowValues) -> Result<String, SqlStencilError> {
    Ok(match value {
        RowValues::Null => NULL_MARKER.to_string(),
        RowValues::Int(i) => i.to_string(),
        RowValues::Float(f) => f.to_string(),
        RowValues::Bool(b) => if *b { "1" } else { "0" }.to_string(),
        RowValues::Text(text) => escape_field(text),
        RowValues::Blob(_) => {
            return Err(SqlStencilError::ParameterError(
                "binary values cannot be bulk loaded".into(),
            ));
        }
    })
}

fn escape_field(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_render_for_inlining() {
        let settings = QuerySettings::default();
        let render = |v: RowValues| secure_sql_value(&v, &settings).unwrap();
        assert_eq!(render(RowValues::Float(2.5)), "<%2.5%>");
        assert_eq!(render(RowValues::Bool(true)), "<%1%>");
        assert_eq!(render(RowValues::Text("bob".into())), "<%bob%>");
        assert_eq!(render(RowValues::Blob(vec![0xde, 0x01])), "X'DE01'");
        assert_eq!(render(RowValues::Text("{CURRENT_DATE}".into())), "CURRENT_DATE");
    }

    #[test]
    fn text_with_delimiters_is_refused() {
        let err = secure_sql_value(&RowValues::Text("a %> b".into()), &QuerySettings::default())
            .unwrap_err();
        assert!(matches!(err, SqlStencilError::ParameterError(_)));
    }

    #[test]
    fn raw_fragment_marker_is_configurable() {
        let settings = QuerySettings::default()
            .with_overrides(&SettingsOverrides::new().set("rawFragment", serde_json::json!(["[[", "]]"])))
            .unwrap();
        assert_eq!(
            secure_sql_value(&RowValues::Text("[[NOW()]]".into()), &settings).unwrap(),
            "NOW()"
        );
        assert_eq!(
            secure_sql_value(&RowValues::Text("{NOW()}".into()), &settings).unwrap(),
            "<%{NOW()}%>"
        );
    }

    #[test]
    fn inline_insert_lists_every_row() {
        let sql = inline_insert(
            "people",
            &["name", "age"],
            &[
                vec![RowValues::Text("ann".into()), RowValues::Int(30)],
                vec![RowValues::Text("ben".into()), RowValues::Null],
            ],
            &QuerySettings::default(),
        )
        .unwrap();
        assert_eq!(
            sql,
            "INSERT INTO `people` (`name`, `age`) VALUES (<%ann%>, <%30%>), (<%ben%>, NULL)"
        );
    }

    #[test]
    fn staged_fields_escape_separators() {
        assert_eq!(escape_field("a\tb\\c\nd"), "a\\tb\\\\c\\nd");
        assert_eq!(staged_field(&RowValues::Null).unwrap(), "\\N");
        assert!(staged_field(&RowValues::Blob(vec![1])).is_err());
    }
}
