//! Test doubles for the driver seam.
//!
//! [`ScriptedConnection`] never touches a database. It answers from a script (canned row
//! sets, injected failures, fixed insert ids) and writes every statement it is asked to
//! run to a shared [`ScriptLog`], so tests can assert on exactly what a session issued.

use std::fs;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::driver::{BulkLoad, Capabilities, Connection, RawOutcome, Statement};
use crate::error::DriverError;
use crate::query_utils::is_insert_statement;
use crate::results::ResultSet;
use crate::types::TypedParameter;

mod test_helpers;

pub use test_helpers::{create_test_row, result_set};

#[derive(Debug, Default)]
struct Recorded {
    statements: Vec<String>,
    bound: Vec<Vec<TypedParameter>>,
    alive: bool,
}

/// Shared view of what a [`ScriptedConnection`] was asked to do.
#[derive(Debug, Clone)]
pub struct ScriptLog(Arc<Mutex<Recorded>>);

impl ScriptLog {
    fn lock(&self) -> MutexGuard<'_, Recorded> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, statement: impl Into<String>) {
        self.lock().statements.push(statement.into());
    }

    /// Every statement in issue order. Transaction control appears as `BEGIN`, `COMMIT`,
    /// `ROLLBACK` and `SET autocommit = 0|1`; savepoints as their SQL.
    #[must_use]
    pub fn statements(&self) -> Vec<String> {
        self.lock().statements.clone()
    }

    /// Parameter lists bound to prepared statements, in order.
    #[must_use]
    pub fn bound(&self) -> Vec<Vec<TypedParameter>> {
        self.lock().bound.clone()
    }

    /// Statements containing `fragment`.
    #[must_use]
    pub fn matching(&self, fragment: &str) -> Vec<String> {
        self.lock()
            .statements
            .iter()
            .filter(|s| s.contains(fragment))
            .cloned()
            .collect()
    }

    /// Simulate the server dropping the connection.
    pub fn drop_connection(&self) {
        self.lock().alive = false;
    }
}

/// A [`Connection`] driven by a script.
#[derive(Debug)]
pub struct ScriptedConnection {
    log: ScriptLog,
    capabilities: Capabilities,
    database: String,
    autocommit: bool,
    failures: Vec<(String, DriverError)>,
    row_sets: Vec<(String, ResultSet)>,
    insert_id: i64,
    insert_affected: u64,
    last_insert_id: i64,
    last_affected: u64,
}

impl Default for ScriptedConnection {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedConnection {
    #[must_use]
    pub fn new() -> Self {
        let log = ScriptLog(Arc::new(Mutex::new(Recorded {
            alive: true,
            ..Recorded::default()
        })));
        Self {
            log,
            capabilities: Capabilities::all(),
            database: "scripted".to_string(),
            autocommit: true,
            failures: Vec::new(),
            row_sets: Vec::new(),
            insert_id: 1,
            insert_affected: 1,
            last_insert_id: 0,
            last_affected: 0,
        }
    }

    /// Handle for inspecting the statements issued through this connection.
    #[must_use]
    pub fn script_log(&self) -> ScriptLog {
        self.log.clone()
    }

    #[must_use]
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    #[must_use]
    pub fn with_database(mut self, name: impl Into<String>) -> Self {
        self.database = name.into();
        self
    }

    /// Fail every statement containing `fragment`.
    #[must_use]
    pub fn fail_on(mut self, fragment: impl Into<String>, error: DriverError) -> Self {
        self.failures.push((fragment.into(), error));
        self
    }

    /// Answer statements containing `fragment` with `rows`.
    #[must_use]
    pub fn returning(mut self, fragment: impl Into<String>, rows: ResultSet) -> Self {
        self.row_sets.push((fragment.into(), rows));
        self
    }

    /// Report `affected` rows starting at `first_id` for every insert.
    #[must_use]
    pub fn with_insert_result(mut self, first_id: i64, affected: u64) -> Self {
        self.insert_id = first_id;
        self.insert_affected = affected;
        self
    }

    fn run(&mut self, sql: &str) -> Result<RawOutcome, DriverError> {
        self.log.record(sql);
        if !self.log.lock().alive {
            return Err(DriverError::new(2006, "server has gone away"));
        }
        if let Some((_, err)) = self.failures.iter().find(|(f, _)| sql.contains(f.as_str())) {
            return Err(err.clone());
        }
        if is_insert_statement(sql) {
            self.last_insert_id = self.insert_id;
            self.last_affected = self.insert_affected;
        } else {
            self.last_affected = 0;
        }
        match self.row_sets.iter().find(|(f, _)| sql.contains(f.as_str())) {
            Some((_, rows)) => Ok(RawOutcome::Rows(rows.clone())),
            None => Ok(RawOutcome::Done(true)),
        }
    }

    fn control(&mut self, command: &str) -> Result<(), DriverError> {
        self.run(command).map(|_| ())
    }
}

/// Prepared statement handed out by [`ScriptedConnection`].
pub struct ScriptedStatement<'a> {
    conn: &'a mut ScriptedConnection,
    sql: String,
    outcome: Option<RawOutcome>,
}

impl Statement for ScriptedStatement<'_> {
    fn bind(&mut self, params: &[TypedParameter]) -> Result<(), DriverError> {
        self.conn.log.lock().bound.push(params.to_vec());
        Ok(())
    }

    fn execute(&mut self) -> Result<(), DriverError> {
        self.outcome = Some(self.conn.run(&self.sql)?);
        Ok(())
    }

    fn fetch_result(&mut self) -> Result<RawOutcome, DriverError> {
        self.outcome
            .take()
            .ok_or_else(|| DriverError::new(2014, "statement has not been executed"))
    }

    fn close(self: Box<Self>) {}
}

impl Connection for ScriptedConnection {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn database_name(&self) -> &str {
        &self.database
    }

    fn is_alive(&mut self) -> bool {
        self.log.lock().alive
    }

    fn reconnect(&mut self) -> Result<(), DriverError> {
        let mut recorded = self.log.lock();
        recorded.statements.push("RECONNECT".to_string());
        recorded.alive = true;
        Ok(())
    }

    fn set_charset(&mut self, _name: &str) -> Result<(), DriverError> {
        Ok(())
    }

    fn prepare<'a>(&'a mut self, sql: &str) -> Result<Box<dyn Statement + 'a>, DriverError> {
        Ok(Box::new(ScriptedStatement {
            conn: self,
            sql: sql.to_string(),
            outcome: None,
        }))
    }

    fn query(&mut self, sql: &str) -> Result<RawOutcome, DriverError> {
        self.run(sql)
    }

    fn execute_batch(&mut self, sql: &str) -> Result<(), DriverError> {
        self.run(sql).map(|_| ())
    }

    fn begin_transaction(&mut self) -> Result<(), DriverError> {
        self.control("BEGIN")
    }

    fn commit(&mut self) -> Result<(), DriverError> {
        self.control("COMMIT")
    }

    fn rollback(&mut self) -> Result<(), DriverError> {
        self.control("ROLLBACK")
    }

    fn autocommit(&self) -> bool {
        self.autocommit
    }

    fn set_autocommit(&mut self, enabled: bool) -> Result<(), DriverError> {
        self.control(if enabled { "SET autocommit = 1" } else { "SET autocommit = 0" })?;
        self.autocommit = enabled;
        Ok(())
    }

    fn last_insert_id(&self) -> i64 {
        self.last_insert_id
    }

    fn last_affected_rows(&self) -> u64 {
        self.last_affected
    }

    /// Records the load statement and reports one affected row per staged line.
    fn load_file(&mut self, load: &BulkLoad) -> Result<u64, DriverError> {
        let staged = fs::read_to_string(&load.path)
            .map_err(|e| DriverError::new(2, format!("cannot read staged file: {e}")))?;
        self.run(&load.statement())?;
        self.last_affected = staged.lines().count() as u64;
        Ok(self.last_affected)
    }

    fn close(&mut self) -> Result<(), DriverError> {
        self.control("CLOSE")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_statements_and_injected_failures() {
        let mut conn = ScriptedConnection::new().fail_on("broken", DriverError::new(1064, "syntax"));
        let log = conn.script_log();
        conn.begin_transaction().unwrap();
        assert!(conn.query("SELECT broken").is_err());
        assert_eq!(log.statements(), vec!["BEGIN", "SELECT broken"]);
    }

    #[test]
    fn dropped_connection_refuses_until_reconnected() {
        let mut conn = ScriptedConnection::new();
        let log = conn.script_log();
        log.drop_connection();
        assert!(!conn.is_alive());
        assert_eq!(conn.query("SELECT 1").unwrap_err().code, 2006);
        conn.reconnect().unwrap();
        assert!(conn.is_alive());
    }
}
