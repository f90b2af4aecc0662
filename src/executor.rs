use crate::driver::{Connection, RawOutcome, Statement};
use crate::error::{DriverError, SqlStencilError};
use crate::query_log::QueryLogEntry;
use crate::query_utils::is_insert_statement;
use crate::results::{QueryOutput, shape_rows};
use crate::session::Session;
use crate::settings::{QuerySettings, SettingsOverrides};
use crate::translation::{PLACEHOLDER, TypedQuery, extract, normalize_sql, type_values};

impl Session {
    /// Run a templated query with the session's settings.
    ///
    /// # Errors
    /// See [`Session::query_with`].
    pub fn query(&mut self, sql: &str) -> Result<QueryOutput, SqlStencilError> {
        self.query_with(sql, &SettingsOverrides::new())
    }

    /// Run a templated query with per-call setting overrides.
    ///
    /// Literals between the configured delimiters are lifted out, typed, and bound as
    /// parameters; `''` and `NULL` are written into the text instead. Statements without
    /// parameters run directly, the rest go through prepare, bind, execute.
    ///
    /// # Errors
    /// - `ConfigError` for malformed overrides
    /// - `NoActiveConnection` without a connection
    /// - `UnmatchedDelimiter` for unbalanced templates (always raised)
    /// - `QueryExecutionFailed`, `StatementPreparationFailed`, `StatementExecutionFailed`
    ///   when the driver fails and `throw_errors` is set; otherwise the failure is logged
    ///   and `QueryOutput::Bool(false)` is returned
    pub fn query_with(
        &mut self,
        sql: &str,
        overrides: &SettingsOverrides,
    ) -> Result<QueryOutput, SqlStencilError> {
        let settings = self.effective_settings(overrides)?;
        self.run(sql, &settings)
    }

    pub(crate) fn run(
        &mut self,
        sql: &str,
        settings: &QuerySettings,
    ) -> Result<QueryOutput, SqlStencilError> {
        let typed = match self.prepare_template(sql, settings) {
            Ok(typed) => typed,
            Err(err) => {
                self.record_error(&err);
                return Err(err);
            }
        };

        let Some(conn) = self.conn.as_deref_mut() else {
            self.record_error(&SqlStencilError::NoActiveConnection);
            return Err(SqlStencilError::NoActiveConnection);
        };
        let index = self.log.push(QueryLogEntry::new(
            sql,
            &typed.sql,
            conn.database_name(),
            settings,
            &typed.params,
        ));

        tracing::debug!(
            sql = %typed.sql,
            params = typed.params.len(),
            prepared = !typed.params.is_empty(),
            "executing statement"
        );
        let result = match conn.set_charset(&settings.charset) {
            Ok(()) => execute_statement(conn, &typed),
            Err(err) => Err(SqlStencilError::QueryExecutionFailed(err)),
        };
        let affected = conn.last_affected_rows();
        let first_id = conn.last_insert_id();

        let Some(entry) = self.log.entry_mut(index) else {
            return Err(SqlStencilError::Other("query log entry vanished".into()));
        };
        match result {
            Ok(raw) => {
                entry.affected_rows = affected;
                let output = match raw {
                    RawOutcome::Rows(rows) => {
                        entry.row_count = rows.len();
                        shape_rows(rows, settings)
                    }
                    RawOutcome::Done(ok) => QueryOutput::Bool(ok),
                };
                if affected > 0 && is_insert_statement(&typed.sql) {
                    entry.record_insert_range(first_id, affected);
                }
                entry.result = Some(output.clone());
                Ok(output)
            }
            Err(err) => {
                entry.error = err.driver_error().cloned();
                entry.result = Some(QueryOutput::Bool(false));
                self.record_error(&err);
                if settings.throw_errors {
                    Err(err)
                } else {
                    Ok(QueryOutput::Bool(false))
                }
            }
        }
    }

    /// Normalize, extract and type a template without touching the driver.
    ///
    /// # Errors
    /// Returns `UnmatchedDelimiter` for unbalanced templates.
    pub fn prepare_template(
        &self,
        sql: &str,
        settings: &QuerySettings,
    ) -> Result<TypedQuery, SqlStencilError> {
        let normalized = normalize_sql(sql, &settings.delimiters);
        let extraction = extract(&normalized, &settings.delimiters, PLACEHOLDER, true, None)?;
        type_values(extraction, PLACEHOLDER)
    }

    /// Generated ids recorded by the most recent logged statement.
    #[must_use]
    pub fn last_insert_ids(&self) -> &[i64] {
        self.log
            .last()
            .map(|entry| entry.insert_ids.as_slice())
            .unwrap_or_default()
    }
}

fn execute_statement(
    conn: &mut dyn Connection,
    typed: &TypedQuery,
) -> Result<RawOutcome, SqlStencilError> {
    if typed.params.is_empty() {
        return conn
            .query(&typed.sql)
            .map_err(SqlStencilError::QueryExecutionFailed);
    }

    let mut stmt = conn
        .prepare(&typed.sql)
        .map_err(SqlStencilError::StatementPreparationFailed)?;
    let result = run_prepared(stmt.as_mut(), typed);
    stmt.close();
    result.map_err(SqlStencilError::StatementExecutionFailed)
}

fn run_prepared(stmt: &mut dyn Statement, typed: &TypedQuery) -> Result<RawOutcome, DriverError> {
    stmt.bind(&typed.params)?;
    stmt.execute()?;
    stmt.fetch_result()
}
