use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

use crate::driver::Connection;
use crate::error::SqlStencilError;
use crate::query_log::{QueryLog, QueryLogEntry};
use crate::results::QueryOutput;
use crate::settings::{self, QuerySettings, SettingsOverrides, normalize};
use crate::translation::normalize_sql;

/// One logical database session: a connection, its settings layer, and its query log.
///
/// A session is single-threaded; run independent sessions for independent work.
///
/// ```rust,no_run
/// use sql_stencil::prelude::*;
///
/// # fn demo() -> Result<(), SqlStencilError> {
/// let conn = SqliteConnection::open_in_memory()?;
/// let mut session = Session::with_connection(conn)?;
/// session.query("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT)")?;
/// session.query("INSERT INTO t (name) VALUES (<%alice%>)")?;
/// let name = session.query_with(
///     "SELECT name FROM t WHERE id = <%1%>",
///     &SettingsOverrides::new().set("omitSingleKey", true),
/// )?;
/// assert_eq!(name, QueryOutput::Scalar(RowValues::Text("alice".into())));
/// # Ok(()) }
/// ```
#[derive(Default)]
pub struct Session {
    pub(crate) conn: Option<Box<dyn Connection>>,
    settings: Option<QuerySettings>,
    pub(crate) log: QueryLog,
    pub(crate) last_error: Option<String>,
    saved_queries: HashMap<String, String>,
    pub(crate) tx_depth: usize,
}

impl Session {
    /// A session with no connection yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A session attached to `conn`.
    ///
    /// # Errors
    /// Returns `MissingCapability` if the driver lacks prepared statements or transactions.
    pub fn with_connection(conn: impl Connection + 'static) -> Result<Self, SqlStencilError> {
        let mut session = Self::new();
        session.connect(conn)?;
        Ok(session)
    }

    /// Attach `conn`, closing any connection already attached.
    ///
    /// # Errors
    /// Returns `MissingCapability` if the driver lacks prepared statements or transactions,
    /// or `ConnectionTeardownFailed` if the previous connection does not close cleanly.
    pub fn connect(&mut self, conn: impl Connection + 'static) -> Result<(), SqlStencilError> {
        self.connect_boxed(Box::new(conn))
    }

    /// Attach an already boxed connection.
    ///
    /// # Errors
    /// See [`Session::connect`].
    pub fn connect_boxed(&mut self, conn: Box<dyn Connection>) -> Result<(), SqlStencilError> {
        let caps = conn.capabilities();
        if !caps.prepared_statements {
            return Err(SqlStencilError::MissingCapability(
                "prepared statements".into(),
            ));
        }
        if !caps.transactions {
            return Err(SqlStencilError::MissingCapability("transactions".into()));
        }
        self.disconnect()?;
        tracing::debug!(database = conn.database_name(), "session connected");
        self.conn = Some(conn);
        Ok(())
    }

    /// Close and detach the connection. A session without a connection is left as is.
    ///
    /// # Errors
    /// Returns `ConnectionTeardownFailed` if the driver reports an error while closing; the
    /// connection is detached regardless.
    pub fn disconnect(&mut self) -> Result<(), SqlStencilError> {
        match self.conn.take() {
            Some(mut conn) => conn
                .close()
                .map_err(SqlStencilError::ConnectionTeardownFailed),
            None => Ok(()),
        }
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    /// The attached connection.
    ///
    /// # Errors
    /// Returns `NoActiveConnection` if nothing is attached.
    pub fn connection_mut(&mut self) -> Result<&mut dyn Connection, SqlStencilError> {
        match self.conn.as_deref_mut() {
            Some(conn) => Ok(conn),
            None => Err(SqlStencilError::NoActiveConnection),
        }
    }

    /// Session-level settings: the configured snapshot, or the process-wide defaults.
    #[must_use]
    pub fn settings(&self) -> QuerySettings {
        self.settings.clone().unwrap_or_else(settings::defaults)
    }

    /// Layer `overrides` onto this session's settings.
    ///
    /// # Errors
    /// Returns `ConfigError` if an override has the wrong shape; settings are unchanged.
    pub fn configure(
        &mut self,
        overrides: &SettingsOverrides,
    ) -> Result<QuerySettings, SqlStencilError> {
        let updated = normalize(overrides, &self.settings())?;
        self.settings = Some(updated.clone());
        Ok(updated)
    }

    /// Forget session-level settings and follow the process-wide defaults again.
    pub fn reset_configuration(&mut self) {
        self.settings = None;
    }

    /// Settings for one call: `overrides` on top of the session layer.
    ///
    /// # Errors
    /// Returns `ConfigError` if an override has the wrong shape.
    pub fn effective_settings(
        &self,
        overrides: &SettingsOverrides,
    ) -> Result<QuerySettings, SqlStencilError> {
        normalize(overrides, &self.settings())
    }

    #[must_use]
    pub fn log(&self) -> &QueryLog {
        &self.log
    }

    /// Drop every log entry. Indices handed out before the call no longer refer to the
    /// same entries; new entries are numbered from zero again.
    pub fn clear_log(&mut self) {
        self.log.clear();
    }

    /// Message of the most recent error, whether or not it was raised.
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Whether a `transact` call is currently running on this session.
    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.tx_depth > 0
    }

    pub(crate) fn record_error(&mut self, err: &SqlStencilError) {
        tracing::warn!(%err, "query failed");
        self.last_error = Some(err.to_string());
    }

    /// Remember `sql` under `name` for [`Session::run_saved`].
    pub fn save_query(&mut self, name: impl Into<String>, sql: impl Into<String>) {
        self.saved_queries.insert(name.into(), sql.into());
    }

    #[must_use]
    pub fn saved_query(&self, name: &str) -> Option<&str> {
        self.saved_queries.get(name).map(String::as_str)
    }

    /// Run a query saved with [`Session::save_query`].
    ///
    /// # Errors
    /// Returns `NamedResourceNotFound` for an unknown name, otherwise as
    /// [`Session::query_with`].
    pub fn run_saved(
        &mut self,
        name: &str,
        overrides: &SettingsOverrides,
    ) -> Result<QueryOutput, SqlStencilError> {
        let sql = self
            .saved_queries
            .get(name)
            .cloned()
            .ok_or_else(|| SqlStencilError::NamedResourceNotFound(format!("saved query `{name}`")))?;
        self.query_with(&sql, overrides)
    }

    /// Execute every statement in a SQL file inside one transaction.
    ///
    /// Returns `false` when the file failed and errors are not thrown.
    ///
    /// # Errors
    /// Returns `NamedResourceNotFound` if the file does not exist, `Io` if it cannot be read,
    /// and `QueryExecutionFailed` when a statement fails and `throw_errors` is set.
    pub fn run_file(&mut self, path: impl AsRef<Path>) -> Result<bool, SqlStencilError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(SqlStencilError::NamedResourceNotFound(format!(
                "SQL file {}",
                path.display()
            )));
        }
        let contents = fs::read_to_string(path)?;
        let settings = self.settings();
        let outcome = self.transact(settings.throw_errors, |tx| {
            tx.run_batch(&contents, &settings)
        })?;
        Ok(outcome.is_some())
    }

    /// Run a multi-statement script as one log entry.
    pub(crate) fn run_batch(
        &mut self,
        sql: &str,
        settings: &QuerySettings,
    ) -> Result<(), SqlStencilError> {
        let normalized = normalize_sql(sql, &settings.delimiters);
        let conn = self
            .conn
            .as_deref_mut()
            .ok_or(SqlStencilError::NoActiveConnection)?;
        let index = self.log.push(QueryLogEntry::new(
            sql,
            &normalized,
            conn.database_name(),
            settings,
            &[],
        ));

        let result = conn
            .set_charset(&settings.charset)
            .and_then(|()| conn.execute_batch(&normalized));
        let affected = conn.last_affected_rows();
        if let Some(entry) = self.log.entry_mut(index) {
            match &result {
                Ok(()) => {
                    entry.affected_rows = affected;
                    entry.result = Some(QueryOutput::Bool(true));
                }
                Err(err) => {
                    entry.error = Some(err.clone());
                    entry.result = Some(QueryOutput::Bool(false));
                }
            }
        }
        result.map_err(SqlStencilError::QueryExecutionFailed)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("connected", &self.conn.is_some())
            .field("database", &self.conn.as_ref().map(|c| c.database_name().to_string()))
            .field("settings", &self.settings)
            .field("log_entries", &self.log.len())
            .field("tx_depth", &self.tx_depth)
            .finish_non_exhaustive()
    }
}
