use crate::driver::{RawOutcome, Statement};
use crate::error::DriverError;
use crate::types::TypedParameter;

use super::connection::LastStatement;
use super::params::typed_param_to_sqlite_value;
use super::query::build_result_set;
use super::{SQLITE_MISUSE, SQLITE_RANGE};

/// Prepared statement tied to a borrowed `SQLite` connection.
pub struct SqlitePrepared<'a> {
    stmt: rusqlite::Statement<'a>,
    conn: &'a rusqlite::Connection,
    last: &'a mut LastStatement,
    is_insert: bool,
    outcome: Option<RawOutcome>,
}

impl<'a> SqlitePrepared<'a> {
    pub(crate) fn new(
        stmt: rusqlite::Statement<'a>,
        conn: &'a rusqlite::Connection,
        last: &'a mut LastStatement,
        is_insert: bool,
    ) -> Self {
        Self {
            stmt,
            conn,
            last,
            is_insert,
            outcome: None,
        }
    }

    fn record(&mut self, affected: u64) {
        self.last.affected = affected;
        if self.is_insert && affected > 0 {
            let affected = i64::try_from(affected).unwrap_or(i64::MAX);
            self.last.insert_id = self.conn.last_insert_rowid() - affected + 1;
        }
    }
}

impl Statement for SqlitePrepared<'_> {
    fn bind(&mut self, params: &[TypedParameter]) -> Result<(), DriverError> {
        let expected = self.stmt.parameter_count();
        if expected != params.len() {
            return Err(DriverError::new(
                SQLITE_RANGE,
                format!("statement expects {expected} parameters, got {}", params.len()),
            ));
        }
        for (idx, param) in params.iter().enumerate() {
            self.stmt
                .raw_bind_parameter(idx + 1, typed_param_to_sqlite_value(param))?;
        }
        Ok(())
    }

    fn execute(&mut self) -> Result<(), DriverError> {
        let (outcome, affected) = if self.stmt.column_count() > 0 {
            let rows = build_result_set(&mut self.stmt)?;
            let affected = if self.is_insert {
                self.conn.changes()
            } else {
                0
            };
            (RawOutcome::Rows(rows), affected)
        } else {
            let changed = self.stmt.raw_execute()?;
            (RawOutcome::Done(true), changed as u64)
        };
        self.record(affected);
        self.outcome = Some(outcome);
        Ok(())
    }

    fn fetch_result(&mut self) -> Result<RawOutcome, DriverError> {
        self.outcome
            .take()
            .ok_or_else(|| DriverError::new(SQLITE_MISUSE, "statement has not been executed"))
    }

    fn close(self: Box<Self>) {
        let this = *self;
        if let Err(err) = this.stmt.finalize() {
            tracing::warn!(%err, "failed to finalize statement");
        }
    }
}
