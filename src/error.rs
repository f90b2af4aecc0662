use std::fmt;

use thiserror::Error;

/// Error reported by the underlying database driver: the `(code, message)` pair.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DriverError {
    pub code: i32,
    pub message: String,
}

impl DriverError {
    #[must_use]
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for DriverError {}

/// Which side of a delimiter pair was left without a partner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelimiterSide {
    Opening,
    Closing,
}

impl fmt::Display for DelimiterSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DelimiterSide::Opening => f.write_str("opening"),
            DelimiterSide::Closing => f.write_str("closing"),
        }
    }
}

#[derive(Debug, Error)]
pub enum SqlStencilError {
    #[error("Missing driver capability: {0}")]
    MissingCapability(String),

    #[error("No active database connection")]
    NoActiveConnection,

    /// Opening a connection failed. Driver errors raised with `?` land here.
    #[error("Connection failed: {0}")]
    ConnectionFailed(#[from] DriverError),

    #[error("Unmatched {kind} delimiter at offset {offset}")]
    UnmatchedDelimiter { kind: DelimiterSide, offset: usize },

    #[error("Statement preparation failed: {0}")]
    StatementPreparationFailed(DriverError),

    #[error("Statement execution failed: {0}")]
    StatementExecutionFailed(DriverError),

    #[error("Query execution failed: {0}")]
    QueryExecutionFailed(DriverError),

    #[error("Connection teardown failed: {0}")]
    ConnectionTeardownFailed(DriverError),

    #[error("Named resource not found: {0}")]
    NamedResourceNotFound(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Parameter conversion error: {0}")]
    ParameterError(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Other database error: {0}")]
    Other(String),
}

impl SqlStencilError {
    /// The driver-level error carried by execution failures, if any.
    #[must_use]
    pub fn driver_error(&self) -> Option<&DriverError> {
        match self {
            SqlStencilError::ConnectionFailed(err)
            | SqlStencilError::StatementPreparationFailed(err)
            | SqlStencilError::StatementExecutionFailed(err)
            | SqlStencilError::QueryExecutionFailed(err)
            | SqlStencilError::ConnectionTeardownFailed(err) => Some(err),
            _ => None,
        }
    }
}
