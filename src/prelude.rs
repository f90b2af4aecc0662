//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types and functions
//! to make it easier to get started with the library.

pub use crate::bulk::secure_sql_value;
pub use crate::driver::{BulkLoad, Capabilities, Connection, RawOutcome, Statement};
pub use crate::error::{DelimiterSide, DriverError, SqlStencilError};
pub use crate::query_log::{QueryLog, QueryLogEntry};
pub use crate::results::{CustomDbRow, QueryOutput, ResultSet};
pub use crate::session::Session;
pub use crate::settings::{
    QuerySettings, SettingsOverrides, configure_defaults, defaults, reset_defaults,
};
pub use crate::transaction::Transaction;
pub use crate::translation::{DelimiterPair, extract, normalize_sql, type_values};
pub use crate::types::{RowValues, TypedParameter};

#[cfg(feature = "sqlite")]
pub use crate::sqlite::{SqliteConnection, SqliteOptions};
