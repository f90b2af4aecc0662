//! The database driver seam.
//!
//! Everything that actually talks to a database goes through [`Connection`] and
//! [`Statement`]. The crate ships a rusqlite implementation (`sqlite` feature) and, with
//! `test-utils`, a scripted one that records what it was asked to run.

use std::path::PathBuf;

use crate::error::DriverError;
use crate::results::ResultSet;
use crate::types::TypedParameter;

/// What the driver hands back after running a statement.
#[derive(Debug, Clone, PartialEq)]
pub enum RawOutcome {
    /// The statement produced a row set (possibly empty).
    Rows(ResultSet),
    /// The statement produced no row set; `true` on success.
    Done(bool),
}

/// Optional driver features the session relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub prepared_statements: bool,
    pub transactions: bool,
    pub savepoints: bool,
    pub bulk_load: bool,
}

impl Capabilities {
    #[must_use]
    pub fn all() -> Self {
        Self {
            prepared_statements: true,
            transactions: true,
            savepoints: true,
            bulk_load: true,
        }
    }
}

/// A staged file ready to be loaded into `table`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkLoad {
    pub path: PathBuf,
    pub table: String,
    pub columns: Vec<String>,
    /// Field separator used in the staged file.
    pub field_terminator: char,
    /// Marker written for NULL fields.
    pub null_marker: String,
}

impl BulkLoad {
    /// The file-load statement for this staged file.
    #[must_use]
    pub fn statement(&self) -> String {
        let columns = self
            .columns
            .iter()
            .map(|c| quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "LOAD DATA LOCAL INFILE '{}' INTO TABLE {} FIELDS TERMINATED BY '{}' ESCAPED BY '\\\\' LINES TERMINATED BY '\\n' ({columns})",
            self.path.display().to_string().replace('\'', "''"),
            quote_identifier(&self.table),
            self.field_terminator.escape_default(),
        )
    }
}

/// Backtick-quote an identifier, doubling embedded backticks.
#[must_use]
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// A prepared statement borrowed from its connection.
pub trait Statement {
    /// Bind parameters positionally; their type tags come from the values themselves.
    ///
    /// # Errors
    /// Returns the driver error when a value cannot be bound.
    fn bind(&mut self, params: &[TypedParameter]) -> Result<(), DriverError>;

    /// Run the statement with the bound parameters.
    ///
    /// # Errors
    /// Returns the driver error when execution fails.
    fn execute(&mut self) -> Result<(), DriverError>;

    /// The outcome of the last `execute`.
    ///
    /// # Errors
    /// Returns the driver error when the result cannot be read.
    fn fetch_result(&mut self) -> Result<RawOutcome, DriverError>;

    /// Release the statement.
    fn close(self: Box<Self>);
}

/// A single live database connection.
pub trait Connection {
    fn capabilities(&self) -> Capabilities;

    /// Name of the database this connection targets, recorded in the query log.
    fn database_name(&self) -> &str;

    fn is_alive(&mut self) -> bool;

    /// Re-establish the connection after it dropped.
    ///
    /// # Errors
    /// Returns the driver error when reconnecting fails.
    fn reconnect(&mut self) -> Result<(), DriverError>;

    /// # Errors
    /// Returns the driver error when the charset is rejected.
    fn set_charset(&mut self, name: &str) -> Result<(), DriverError>;

    /// # Errors
    /// Returns the driver error when the statement cannot be prepared.
    fn prepare<'a>(&'a mut self, sql: &str) -> Result<Box<dyn Statement + 'a>, DriverError>;

    /// Run a single statement without parameters.
    ///
    /// # Errors
    /// Returns the driver error when execution fails.
    fn query(&mut self, sql: &str) -> Result<RawOutcome, DriverError>;

    /// Run several `;`-separated statements.
    ///
    /// # Errors
    /// Returns the driver error when any statement fails.
    fn execute_batch(&mut self, sql: &str) -> Result<(), DriverError>;

    /// # Errors
    /// Returns the driver error when the transaction cannot be started.
    fn begin_transaction(&mut self) -> Result<(), DriverError>;

    /// # Errors
    /// Returns the driver error when committing fails.
    fn commit(&mut self) -> Result<(), DriverError>;

    /// # Errors
    /// Returns the driver error when rolling back fails.
    fn rollback(&mut self) -> Result<(), DriverError>;

    fn autocommit(&self) -> bool;

    /// # Errors
    /// Returns the driver error when the mode cannot be changed.
    fn set_autocommit(&mut self, enabled: bool) -> Result<(), DriverError>;

    /// First id generated by the most recent insert.
    fn last_insert_id(&self) -> i64;

    /// Rows changed by the most recent statement.
    fn last_affected_rows(&self) -> u64;

    /// Load a staged file. The default issues the generated `LOAD DATA` statement.
    ///
    /// # Errors
    /// Returns the driver error when the load fails.
    fn load_file(&mut self, load: &BulkLoad) -> Result<u64, DriverError> {
        self.query(&load.statement())?;
        Ok(self.last_affected_rows())
    }

    /// # Errors
    /// Returns the driver error when the connection cannot be closed cleanly.
    fn close(&mut self) -> Result<(), DriverError>;
}
