//! Error types for the query and entity layer
//!
//! One enum covers the whole taxonomy: configuration mistakes and binding
//! mismatches fail fast before any I/O, execution failures carry the SQL
//! text alongside the driver message, and "not found" is its own condition
//! distinct from an execution failure.

use thiserror::Error;

/// Result type alias for all ORM operations
pub type OrmResult<T> = Result<T, OrmError>;

/// Error type for query building, execution and entity operations
#[derive(Debug, Clone, Error, PartialEq)]
pub enum OrmError {
    /// Malformed query configuration (bad operator for the column arity,
    /// missing entity binding, unknown registry entry). Always a programming
    /// mistake, raised before any statement is sent to the database.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Placeholder/binding mismatch detected at compile time, before
    /// execution is attempted.
    #[error("Parameter binding error: {0}")]
    Binding(String),

    /// The execution adaptor reported a failure. Carries the failed SQL so
    /// callers can log or inspect it.
    #[error("Query execution failed: {message}. Query: {sql}")]
    Execution { sql: String, message: String },

    /// Zero rows where the caller expected at least one.
    #[error("No results found in table '{0}'")]
    NotFound(String),

    /// Connection-level failure (pool creation, invalid URL).
    #[error("Connection error: {0}")]
    Connection(String),

    /// Paginator usage error (next past the last page, previous before the
    /// first).
    #[error("Pagination error: {0}")]
    Pagination(String),
}

impl OrmError {
    /// Shorthand for an execution error wrapping an adaptor failure.
    pub fn execution(sql: impl Into<String>, message: impl Into<String>) -> Self {
        OrmError::Execution {
            sql: sql.into(),
            message: message.into(),
        }
    }

    /// Whether this error came from statement execution (as opposed to a
    /// build-time configuration or binding problem). Read paths that
    /// suppress failures only ever suppress this kind.
    pub fn is_execution(&self) -> bool {
        matches!(self, OrmError::Execution { .. })
    }
}

// Convert from anyhow errors at the adaptor edge
impl From<anyhow::Error> for OrmError {
    fn from(err: anyhow::Error) -> Self {
        OrmError::Connection(err.to_string())
    }
}
