use std::path::PathBuf;
use std::time::Duration;

/// Options for opening a `SQLite` connection.
#[derive(Debug, Clone)]
pub struct SqliteOptions {
    /// Database file; `None` opens a private in-memory database.
    pub db_path: Option<PathBuf>,
    pub busy_timeout: Option<Duration>,
}

impl SqliteOptions {
    #[must_use]
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: Some(db_path.into()),
            busy_timeout: None,
        }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            db_path: None,
            busy_timeout: None,
        }
    }

    /// Name recorded in query log entries: the file stem, or `memory`.
    #[must_use]
    pub fn database_name(&self) -> String {
        self.db_path
            .as_ref()
            .and_then(|path| path.file_stem())
            .map_or_else(|| "memory".to_string(), |stem| stem.to_string_lossy().into_owned())
    }
}

/// Fluent builder for `SQLite` options.
#[derive(Debug, Clone)]
pub struct SqliteOptionsBuilder {
    opts: SqliteOptions,
}

impl SqliteOptionsBuilder {
    #[must_use]
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            opts: SqliteOptions::new(db_path),
        }
    }

    #[must_use]
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.opts.busy_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn finish(self) -> SqliteOptions {
        self.opts
    }

    /// Open the connection.
    ///
    /// # Errors
    /// Returns the driver error if the database cannot be opened.
    pub fn connect(self) -> Result<super::SqliteConnection, crate::error::DriverError> {
        super::SqliteConnection::open(self.finish())
    }
}
