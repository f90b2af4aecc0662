//! Delimiter-templated SQL for a single database session.
//!
//! Literal values are written straight into the query between a delimiter pair
//! (`<%` / `%>` by default). Before the statement runs they are lifted out, typed as
//! integer, double or string, and bound as parameters; `NULL` and `''` are written back
//! into the text. Results are shaped by a three-layer settings cascade, every statement is
//! recorded in a query log, and transactions nest through savepoints.
//!
//! ```rust,no_run
//! use sql_stencil::prelude::*;
//!
//! # fn demo() -> Result<(), SqlStencilError> {
//! let mut session = Session::with_connection(SqliteConnection::open_in_memory()?)?;
//! session.query("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT, score REAL)")?;
//! session.query("INSERT INTO users (name, score) VALUES (<%ann%>, <%9.5%>)")?;
//!
//! let row = session.query("SELECT name, score FROM users WHERE id = <%1%>")?;
//! assert_eq!(row.as_row().and_then(|r| r.get("name")), Some(&RowValues::Text("ann".into())));
//! assert_eq!(session.log().last().map(|e| e.param_types.as_str()), Some("i"));
//! # Ok(()) }
//! ```

pub mod bulk;
pub mod driver;
pub mod error;
pub mod executor;
pub mod prelude;
pub mod query_log;
pub mod query_utils;
pub mod results;
pub mod session;
pub mod settings;
#[cfg(feature = "sqlite")]
pub mod sqlite;
#[cfg(feature = "test-utils")]
pub mod test_utils;
pub mod transaction;
pub mod translation;
pub mod types;

pub use bulk::secure_sql_value;
pub use driver::{BulkLoad, Capabilities, Connection, RawOutcome, Statement};
pub use error::{DelimiterSide, DriverError, SqlStencilError};
pub use query_log::{QueryLog, QueryLogEntry};
pub use results::{CustomDbRow, QueryOutput, ResultSet};
pub use session::Session;
pub use settings::{QuerySettings, SettingsOverrides};
pub use transaction::Transaction;
pub use types::{ParamType, RowValues, TypedParameter};

#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteConnection, SqliteOptions};
