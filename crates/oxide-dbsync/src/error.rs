//! Error types for the comparison engine.

use std::fmt;

/// Exit status used for configuration mistakes detected before connecting.
pub const CONFIGURATION_EXIT_CODE: u8 = 128;

/// Exit status used for every other fatal error.
pub const FAILURE_EXIT_CODE: u8 = 1;

/// Which of the two compared databases an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// The database the script converges towards.
    Source,
    /// The database the script is meant to run against.
    Target,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => f.write_str("source"),
            Self::Target => f.write_str("target"),
        }
    }
}

/// Errors that can occur while comparing two databases.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The server could not be reached or rejected the credentials.
    #[error("Cannot connect to {side} database: {source}")]
    Connection {
        /// The side that failed to connect.
        side: Side,
        /// The underlying driver error.
        #[source]
        source: sqlx::Error,
    },

    /// A metadata or row query failed while a table was being processed.
    #[error("Failed to read table '{table}': {source}")]
    Introspection {
        /// The table being read.
        table: String,
        /// The underlying driver error.
        #[source]
        source: sqlx::Error,
    },

    /// The options are missing or invalid.
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Database error outside of a specific table, such as the version query.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// IO error (writing the output document).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A worker task panicked or was cancelled.
    #[error("Worker failed: {0}")]
    Worker(String),
}

impl SyncError {
    /// Wraps a driver error raised while reading `table`.
    pub fn introspection(table: impl Into<String>, source: sqlx::Error) -> Self {
        Self::Introspection {
            table: table.into(),
            source,
        }
    }

    /// Returns the process exit status for this error.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Configuration(_) => CONFIGURATION_EXIT_CODE,
            _ => FAILURE_EXIT_CODE,
        }
    }
}

/// Result type for comparison operations.
pub type Result<T> = std::result::Result<T, SyncError>;
