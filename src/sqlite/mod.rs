// SQLite module - the rusqlite-backed reference driver
//
// - config: Connection options
// - connection: `Connection` implementation (transactions, autocommit, bulk load)
// - prepared: `Statement` implementation
// - params: Conversion of bound parameters to SQLite values
// - query: Result extraction and building

pub mod config;
pub mod connection;
pub mod params;
pub mod prepared;
pub mod query;

pub use config::{SqliteOptions, SqliteOptionsBuilder};
pub use connection::SqliteConnection;
pub use prepared::SqlitePrepared;
pub use query::build_result_set;

use crate::error::DriverError;

pub(crate) const SQLITE_MISUSE: i32 = 21;
pub(crate) const SQLITE_RANGE: i32 = 25;

impl From<rusqlite::Error> for DriverError {
    fn from(err: rusqlite::Error) -> Self {
        let code = match &err {
            rusqlite::Error::SqliteFailure(failure, _) => failure.extended_code,
            _ => -1,
        };
        DriverError::new(code, err.to_string())
    }
}
