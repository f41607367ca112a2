//! Execution adaptor traits
//!
//! The statement builder never talks to a driver directly: it hands a
//! compiled SQL string plus an ordered binding list to a `Database`
//! implementation and gets back rows, an affected-row count, or a generated
//! identifier. Implementations are injected explicitly; there is no
//! ambient or global connection.

use async_trait::async_trait;

use crate::error::OrmResult;
use crate::value::{DatabaseValue, Row};

/// Outcome of a non-SELECT statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecuteResult {
    /// Rows affected by the statement.
    pub rows_affected: u64,
    /// Identifier generated by an INSERT, when the backend reports one.
    pub last_insert_id: Option<u64>,
}

/// Abstract execution adaptor.
///
/// The compiled wire format is fixed: backtick identifier quoting and `?`
/// positional placeholders, one binding per placeholder in order.
#[async_trait]
pub trait Database: Send + Sync {
    /// Execute a statement expected to produce rows, in database order.
    async fn fetch_all(&self, sql: &str, params: &[DatabaseValue]) -> OrmResult<Vec<Row>>;

    /// Execute a statement for its side effect (INSERT/UPDATE/DELETE).
    async fn execute(&self, sql: &str, params: &[DatabaseValue]) -> OrmResult<ExecuteResult>;
}

/// Connection pool configuration shared by concrete backends.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_seconds: u64,
    pub idle_timeout_seconds: Option<u64>,
    pub max_lifetime_seconds: Option<u64>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 1,
            acquire_timeout_seconds: 30,
            idle_timeout_seconds: Some(600),
            max_lifetime_seconds: Some(1800),
        }
    }
}
