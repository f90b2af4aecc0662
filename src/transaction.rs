//! Transactions and savepoint-based nesting.
//!
//! [`Session::transact`] runs a unit of work atomically. The outermost call owns the real
//! transaction and the autocommit flag; a call made while another is running on the same
//! session becomes a savepoint instead. Nesting is tracked by the session's depth counter
//! and handed to the unit of work through [`Transaction::is_nested`].

use std::ops::{Deref, DerefMut};

use chrono::Utc;

use crate::driver::quote_identifier;
use crate::error::SqlStencilError;
use crate::session::Session;

/// Handle passed to a unit of work. Derefs to the [`Session`], so queries (and nested
/// `transact` calls) go through it directly.
pub struct Transaction<'s> {
    session: &'s mut Session,
    savepoint: Option<String>,
    settled: bool,
}

impl<'s> Transaction<'s> {
    fn new(session: &'s mut Session, savepoint: Option<String>) -> Self {
        Self {
            session,
            savepoint,
            settled: false,
        }
    }

    /// `true` when this unit of work runs inside another transaction.
    #[must_use]
    pub fn is_nested(&self) -> bool {
        self.savepoint.is_some()
    }

    /// Savepoint guarding this unit of work, when nested.
    #[must_use]
    pub fn savepoint_name(&self) -> Option<&str> {
        self.savepoint.as_deref()
    }

    /// Commit now instead of when the unit of work returns.
    ///
    /// Nested units never commit; for them this only marks the work as settled.
    ///
    /// # Errors
    /// Returns `QueryExecutionFailed` if the driver rejects the commit.
    pub fn commit(&mut self) -> Result<(), SqlStencilError> {
        self.settled = true;
        if self.is_nested() {
            tracing::debug!("commit inside nested transaction is deferred to the outer one");
            return Ok(());
        }
        self.session
            .connection_mut()?
            .commit()
            .map_err(SqlStencilError::QueryExecutionFailed)
    }

    /// Roll back this unit of work: the whole transaction when outermost, otherwise only
    /// back to this unit's savepoint.
    ///
    /// # Errors
    /// Returns `QueryExecutionFailed` if the driver rejects the rollback.
    pub fn rollback(&mut self) -> Result<(), SqlStencilError> {
        self.settled = true;
        match self.savepoint.clone() {
            Some(name) => rollback_to_savepoint(self.session, &name),
            None => self
                .session
                .connection_mut()?
                .rollback()
                .map_err(SqlStencilError::QueryExecutionFailed),
        }
    }

    /// Roll back to a savepoint created earlier in this transaction. The transaction stays
    /// open and still commits when the unit of work returns.
    ///
    /// # Errors
    /// Returns `QueryExecutionFailed` if the savepoint is unknown to the database.
    pub fn rollback_to(&mut self, name: &str) -> Result<(), SqlStencilError> {
        rollback_to_savepoint(self.session, name)
    }

    /// Create a named savepoint.
    ///
    /// # Errors
    /// Returns `QueryExecutionFailed` if the driver rejects the statement.
    pub fn savepoint(&mut self, name: &str) -> Result<(), SqlStencilError> {
        issue(self.session, &format!("SAVEPOINT {}", quote_identifier(name)))
    }
}

impl Deref for Transaction<'_> {
    type Target = Session;

    fn deref(&self) -> &Self::Target {
        self.session
    }
}

impl DerefMut for Transaction<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.session
    }
}

impl Session {
    /// Run `work` atomically.
    ///
    /// Outermost call: autocommit is switched off, a transaction begins, and it commits
    /// when `work` returns `Ok` without having committed or rolled back itself. Any `Err`
    /// rolls the transaction back. The previous autocommit flag is always restored.
    ///
    /// Nested call (made through the [`Transaction`] of a running call): a savepoint is
    /// created first and an `Err` rolls back to it, leaving the outer work intact.
    ///
    /// A failure is returned as `Err` when `propagate` is set; otherwise it is recorded in
    /// [`Session::last_error`] and `Ok(None)` is returned.
    ///
    /// # Errors
    /// Returns `NoActiveConnection` without a connection, `QueryExecutionFailed` if the
    /// transaction cannot be started, and the unit of work's own error when `propagate` is
    /// set.
    ///
    /// ```rust,no_run
    /// use sql_stencil::prelude::*;
    ///
    /// # fn demo(session: &mut Session) -> Result<(), SqlStencilError> {
    /// session.transact(true, |tx| {
    ///     tx.query("INSERT INTO accounts (owner) VALUES (<%ana%>)")?;
    ///     // Runs under a savepoint; its failure only undoes its own insert.
    ///     tx.transact(false, |inner| {
    ///         inner.query("INSERT INTO audit (note) VALUES (<%opened%>)")?;
    ///         Err::<(), _>(SqlStencilError::Other("audit disabled".into()))
    ///     })?;
    ///     Ok(())
    /// })?;
    /// # Ok(()) }
    /// ```
    pub fn transact<T, F>(&mut self, propagate: bool, work: F) -> Result<Option<T>, SqlStencilError>
    where
        F: FnOnce(&mut Transaction<'_>) -> Result<T, SqlStencilError>,
    {
        let outcome = if self.tx_depth > 0 {
            self.transact_nested(work)?
        } else {
            self.transact_outermost(work)?
        };

        match outcome {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                self.record_error(&err);
                if propagate { Err(err) } else { Ok(None) }
            }
        }
    }

    /// Returns the unit of work's outcome; the outer `Result` fails only when the
    /// transaction could not be set up.
    fn transact_outermost<T, F>(
        &mut self,
        work: F,
    ) -> Result<Result<T, SqlStencilError>, SqlStencilError>
    where
        F: FnOnce(&mut Transaction<'_>) -> Result<T, SqlStencilError>,
    {
        let conn = self.connection_mut()?;
        let prior_autocommit = conn.autocommit();
        conn.set_autocommit(false)
            .map_err(SqlStencilError::QueryExecutionFailed)?;
        if let Err(err) = conn.begin_transaction() {
            if let Err(restore) = conn.set_autocommit(prior_autocommit) {
                tracing::warn!(%restore, "failed to restore autocommit");
            }
            return Err(SqlStencilError::QueryExecutionFailed(err));
        }
        tracing::debug!("transaction started");

        self.tx_depth += 1;
        let (result, settled) = {
            let mut tx = Transaction::new(self, None);
            let result = work(&mut tx);
            (result, tx.settled)
        };

        let result = match result {
            Ok(value) if settled => Ok(value),
            Ok(value) => self.commit_or_rollback().map(|()| value),
            Err(err) => {
                self.rollback_quietly();
                Err(err)
            }
        };
        self.tx_depth -= 1;

        let restored = self
            .conn
            .as_deref_mut()
            .map(|conn| conn.set_autocommit(prior_autocommit));
        if let Some(Err(err)) = restored {
            tracing::warn!(%err, "failed to restore autocommit");
            if result.is_ok() {
                return Ok(Err(SqlStencilError::QueryExecutionFailed(err)));
            }
        }
        Ok(result)
    }

    fn transact_nested<T, F>(
        &mut self,
        work: F,
    ) -> Result<Result<T, SqlStencilError>, SqlStencilError>
    where
        F: FnOnce(&mut Transaction<'_>) -> Result<T, SqlStencilError>,
    {
        let name = savepoint_name(self.tx_depth);
        issue(self, &format!("SAVEPOINT {}", quote_identifier(&name)))?;

        self.tx_depth += 1;
        let result = {
            let mut tx = Transaction::new(self, Some(name.clone()));
            work(&mut tx)
        };
        self.tx_depth -= 1;

        if result.is_err() {
            self.revive_connection();
            if let Err(err) = rollback_to_savepoint(self, &name) {
                tracing::warn!(%err, savepoint = %name, "rollback to savepoint failed");
            }
        }
        Ok(result)
    }

    /// Reopen a connection that died mid-transaction so the savepoint rollback can run.
    fn revive_connection(&mut self) {
        let Some(conn) = self.conn.as_deref_mut() else {
            return;
        };
        if conn.is_alive() {
            return;
        }
        tracing::warn!("connection lost inside nested transaction, reconnecting");
        if let Err(err) = conn.reconnect() {
            tracing::warn!(%err, "reconnect failed");
        }
    }

    fn commit_or_rollback(&mut self) -> Result<(), SqlStencilError> {
        let committed = self
            .connection_mut()?
            .commit()
            .map_err(SqlStencilError::QueryExecutionFailed);
        if committed.is_err() {
            self.rollback_quietly();
        } else {
            tracing::debug!("transaction committed");
        }
        committed
    }

    fn rollback_quietly(&mut self) {
        match self.conn.as_deref_mut().map(|conn| conn.rollback()) {
            Some(Ok(())) => tracing::debug!("transaction rolled back"),
            Some(Err(err)) => tracing::warn!(%err, "rollback failed"),
            None => tracing::warn!("connection gone before rollback"),
        }
    }
}

fn rollback_to_savepoint(session: &mut Session, name: &str) -> Result<(), SqlStencilError> {
    issue(
        session,
        &format!("ROLLBACK TO SAVEPOINT {}", quote_identifier(name)),
    )
}

fn issue(session: &mut Session, sql: &str) -> Result<(), SqlStencilError> {
    tracing::debug!(sql, "transaction control");
    session
        .connection_mut()?
        .query(sql)
        .map(|_| ())
        .map_err(SqlStencilError::QueryExecutionFailed)
}

/// Time-derived savepoint name, made unique per depth.
fn savepoint_name(depth: usize) -> String {
    format!("sp_{}_{depth}", Utc::now().format("%Y%m%d%H%M%S%6f"))
}
