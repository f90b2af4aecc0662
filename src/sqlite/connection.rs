use std::fmt;
use std::fs;

use rusqlite::types::Value;

use crate::driver::{BulkLoad, Capabilities, Connection, RawOutcome, Statement};
use crate::error::DriverError;
use crate::query_utils::is_insert_statement;

use super::config::SqliteOptions;
use super::prepared::SqlitePrepared;
use super::{SQLITE_MISUSE, SQLITE_RANGE};

/// Bookkeeping from the most recently executed statement.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct LastStatement {
    pub(crate) insert_id: i64,
    pub(crate) affected: u64,
}

/// Connection wrapper around a single rusqlite connection.
///
/// `SQLite` has no connection charset, so the charset is only recorded. Autocommit is a
/// flag: turning it back on while a transaction is open commits that transaction.
pub struct SqliteConnection {
    conn: Option<rusqlite::Connection>,
    options: SqliteOptions,
    database: String,
    charset: String,
    autocommit: bool,
    last: LastStatement,
}

impl SqliteConnection {
    /// Open a connection with `options`.
    ///
    /// # Errors
    /// Returns the driver error if the database cannot be opened.
    pub fn open(options: SqliteOptions) -> Result<Self, DriverError> {
        let conn = open_raw(&options)?;
        Ok(Self {
            conn: Some(conn),
            database: options.database_name(),
            options,
            charset: String::new(),
            autocommit: true,
            last: LastStatement::default(),
        })
    }

    /// Open a private in-memory database.
    ///
    /// # Errors
    /// Returns the driver error if `SQLite` cannot allocate the database.
    pub fn open_in_memory() -> Result<Self, DriverError> {
        Self::open(SqliteOptions::in_memory())
    }

    /// Charset most recently requested through [`Connection::set_charset`].
    #[must_use]
    pub fn charset(&self) -> &str {
        &self.charset
    }

    fn raw(&self) -> Result<&rusqlite::Connection, DriverError> {
        self.conn
            .as_ref()
            .ok_or_else(|| DriverError::new(SQLITE_MISUSE, "connection is closed"))
    }

    fn batch(&mut self, sql: &str) -> Result<(), DriverError> {
        tracing::debug!(sql, "sqlite batch");
        self.raw()?.execute_batch(sql)?;
        Ok(())
    }
}

fn open_raw(options: &SqliteOptions) -> Result<rusqlite::Connection, DriverError> {
    let conn = match &options.db_path {
        Some(path) => rusqlite::Connection::open(path)?,
        None => rusqlite::Connection::open_in_memory()?,
    };
    if let Some(timeout) = options.busy_timeout {
        conn.busy_timeout(timeout)?;
    }
    Ok(conn)
}

impl Connection for SqliteConnection {
    fn capabilities(&self) -> Capabilities {
        Capabilities::all()
    }

    fn database_name(&self) -> &str {
        &self.database
    }

    fn is_alive(&mut self) -> bool {
        self.raw()
            .and_then(|conn| {
                conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
                    .map_err(DriverError::from)
            })
            .is_ok()
    }

    fn reconnect(&mut self) -> Result<(), DriverError> {
        tracing::debug!(database = %self.database, "reopening sqlite connection");
        self.conn = Some(open_raw(&self.options)?);
        self.autocommit = true;
        self.last = LastStatement::default();
        Ok(())
    }

    fn set_charset(&mut self, name: &str) -> Result<(), DriverError> {
        if self.charset != name {
            tracing::debug!(charset = name, "sqlite ignores connection charset");
            self.charset = name.to_string();
        }
        Ok(())
    }

    fn prepare<'a>(&'a mut self, sql: &str) -> Result<Box<dyn Statement + 'a>, DriverError> {
        let SqliteConnection { conn, last, .. } = self;
        let conn = conn
            .as_ref()
            .ok_or_else(|| DriverError::new(SQLITE_MISUSE, "connection is closed"))?;
        let stmt = conn.prepare(sql)?;
        Ok(Box::new(SqlitePrepared::new(
            stmt,
            conn,
            last,
            is_insert_statement(sql),
        )))
    }

    fn query(&mut self, sql: &str) -> Result<RawOutcome, DriverError> {
        let mut stmt = self.prepare(sql)?;
        stmt.execute()?;
        let outcome = stmt.fetch_result();
        stmt.close();
        outcome
    }

    fn execute_batch(&mut self, sql: &str) -> Result<(), DriverError> {
        self.batch(sql)?;
        self.last.affected = self.raw()?.changes();
        Ok(())
    }

    fn begin_transaction(&mut self) -> Result<(), DriverError> {
        self.batch("BEGIN")
    }

    fn commit(&mut self) -> Result<(), DriverError> {
        self.batch("COMMIT")
    }

    fn rollback(&mut self) -> Result<(), DriverError> {
        self.batch("ROLLBACK")
    }

    fn autocommit(&self) -> bool {
        self.autocommit
    }

    fn set_autocommit(&mut self, enabled: bool) -> Result<(), DriverError> {
        if enabled && !self.autocommit && !self.raw()?.is_autocommit() {
            self.batch("COMMIT")?;
        }
        self.autocommit = enabled;
        Ok(())
    }

    fn last_insert_id(&self) -> i64 {
        self.last.insert_id
    }

    fn last_affected_rows(&self) -> u64 {
        self.last.affected
    }

    /// Reads the staged file and inserts its rows through one prepared statement.
    fn load_file(&mut self, load: &BulkLoad) -> Result<u64, DriverError> {
        let contents = fs::read_to_string(&load.path)
            .map_err(|e| DriverError::new(-1, format!("cannot read {}: {e}", load.path.display())))?;
        let columns = load.columns.len();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            crate::driver::quote_identifier(&load.table),
            load.columns
                .iter()
                .map(|c| crate::driver::quote_identifier(c))
                .collect::<Vec<_>>()
                .join(", "),
            vec!["?"; columns].join(", "),
        );

        let conn = self.raw()?;
        let mut stmt = conn.prepare(&sql)?;
        let mut loaded: u64 = 0;
        let mut first_id = None;
        for (line_no, line) in contents.lines().enumerate() {
            let fields: Vec<Value> = line
                .split(load.field_terminator)
                .map(|field| unescape_field(field, &load.null_marker))
                .collect();
            if fields.len() != columns {
                return Err(DriverError::new(
                    SQLITE_RANGE,
                    format!(
                        "line {} has {} fields, expected {columns}",
                        line_no + 1,
                        fields.len()
                    ),
                ));
            }
            stmt.execute(rusqlite::params_from_iter(fields))?;
            first_id.get_or_insert_with(|| conn.last_insert_rowid());
            loaded += 1;
        }
        drop(stmt);

        self.last.affected = loaded;
        if let Some(id) = first_id {
            self.last.insert_id = id;
        }
        Ok(loaded)
    }

    fn close(&mut self) -> Result<(), DriverError> {
        match self.conn.take() {
            Some(conn) => conn.close().map_err(|(conn, err)| {
                self.conn = Some(conn);
                DriverError::from(err)
            }),
            None => Ok(()),
        }
    }
}

/// Undo the staging escapes: `\\`, `\t`, `\n`, `\r`, `\0`, and the NULL marker.
fn unescape_field(field: &str, null_marker: &str) -> Value {
    if field == null_marker {
        return Value::Null;
    }
    let mut out = String::with_capacity(field.len());
    let mut chars = field.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    Value::Text(out)
}

impl fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("database", &self.database)
            .field("open", &self.conn.is_some())
            .field("autocommit", &self.autocommit)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unescapes_staged_fields() {
        assert_eq!(unescape_field("\\N", "\\N"), Value::Null);
        assert_eq!(
            unescape_field("a\\tb\\\\c\\n", "\\N"),
            Value::Text("a\tb\\c\n".into())
        );
    }

    #[test]
    fn prepared_insert_reports_first_generated_id() {
        let mut conn = SqliteConnection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY, v TEXT)")
            .unwrap();
        conn.query("INSERT INTO t (v) VALUES ('a')").unwrap();
        assert_eq!(conn.last_insert_id(), 1);
        conn.query("INSERT INTO t (v) VALUES ('b'), ('c'), ('d')")
            .unwrap();
        assert_eq!(conn.last_affected_rows(), 3);
        assert_eq!(conn.last_insert_id(), 2);
    }

    #[test]
    fn reenabling_autocommit_commits_open_transaction() {
        let mut conn = SqliteConnection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (id INTEGER)").unwrap();
        conn.set_autocommit(false).unwrap();
        conn.begin_transaction().unwrap();
        conn.query("INSERT INTO t VALUES (1)").unwrap();
        conn.set_autocommit(true).unwrap();
        assert!(conn.raw().unwrap().is_autocommit());
        match conn.query("SELECT COUNT(*) FROM t").unwrap() {
            RawOutcome::Rows(rs) => assert_eq!(rs.results[0].rows[0], crate::types::RowValues::Int(1)),
            RawOutcome::Done(_) => panic!("expected rows"),
        }
    }

    #[test]
    fn closed_connection_refuses_work() {
        let mut conn = SqliteConnection::open_in_memory().unwrap();
        conn.close().unwrap();
        assert!(!conn.is_alive());
        assert!(conn.query("SELECT 1").is_err());
        conn.reconnect().unwrap();
        assert!(conn.is_alive());
    }
}
