//! In-memory test double for the execution adaptor
//!
//! Responses are queued ahead of time and consumed in order; every executed
//! statement is logged with its bindings so tests can assert on the exact
//! SQL and parameter order the builder produced.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::backends::core::{Database, ExecuteResult};
use crate::error::{OrmError, OrmResult};
use crate::value::{DatabaseValue, Row};

/// One canned response handed out by [`MockDatabase`].
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Rows for a fetch.
    Rows(Vec<Row>),
    /// Affected-row count for a mutation.
    Affected(u64),
    /// Affected count plus a generated identifier, for inserts.
    Inserted(u64),
    /// Simulated driver failure.
    Error(String),
}

/// A statement the mock saw, verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedQuery {
    pub sql: String,
    pub bindings: Vec<DatabaseValue>,
}

/// Queued-response execution adaptor for tests.
///
/// When the queue is empty, fetches yield no rows and mutations report one
/// affected row, so tests only queue what they assert on.
#[derive(Debug, Default)]
pub struct MockDatabase {
    responses: Mutex<VecDeque<MockResponse>>,
    log: Mutex<Vec<ExecutedQuery>>,
}

impl MockDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response; returned in FIFO order.
    pub fn push_response(&self, response: MockResponse) {
        self.responses
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push_back(response);
    }

    /// Queue a row set.
    pub fn push_rows(&self, rows: Vec<Row>) {
        self.push_response(MockResponse::Rows(rows));
    }

    /// Queue a failure.
    pub fn push_error(&self, message: impl Into<String>) {
        self.push_response(MockResponse::Error(message.into()));
    }

    /// Everything executed so far, in order.
    pub fn executed(&self) -> Vec<ExecutedQuery> {
        self.log
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// The most recent executed statement.
    pub fn last_executed(&self) -> Option<ExecutedQuery> {
        self.executed().pop()
    }

    fn record(&self, sql: &str, params: &[DatabaseValue]) {
        self.log
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(ExecutedQuery {
                sql: sql.to_string(),
                bindings: params.to_vec(),
            });
    }

    fn next_response(&self) -> Option<MockResponse> {
        self.responses
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front()
    }
}

#[async_trait]
impl Database for MockDatabase {
    async fn fetch_all(&self, sql: &str, params: &[DatabaseValue]) -> OrmResult<Vec<Row>> {
        self.record(sql, params);
        match self.next_response() {
            Some(MockResponse::Rows(rows)) => Ok(rows),
            Some(MockResponse::Error(message)) => Err(OrmError::execution(sql, message)),
            Some(MockResponse::Affected(_)) | Some(MockResponse::Inserted(_)) => Err(
                OrmError::execution(sql, "mock queued a mutation response for a fetch"),
            ),
            None => Ok(Vec::new()),
        }
    }

    async fn execute(&self, sql: &str, params: &[DatabaseValue]) -> OrmResult<ExecuteResult> {
        self.record(sql, params);
        match self.next_response() {
            Some(MockResponse::Affected(rows_affected)) => Ok(ExecuteResult {
                rows_affected,
                last_insert_id: None,
            }),
            Some(MockResponse::Inserted(id)) => Ok(ExecuteResult {
                rows_affected: 1,
                last_insert_id: Some(id),
            }),
            Some(MockResponse::Error(message)) => Err(OrmError::execution(sql, message)),
            Some(MockResponse::Rows(_)) => Err(OrmError::execution(
                sql,
                "mock queued a row response for a mutation",
            )),
            None => Ok(ExecuteResult {
                rows_affected: 1,
                last_insert_id: None,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_responses_consumed_in_order() {
        let db = MockDatabase::new();
        db.push_rows(vec![Row::from_pairs([("id", 1i64)])]);
        db.push_error("gone away");

        let rows = db.fetch_all("SELECT 1", &[]).await.unwrap();
        assert_eq!(rows.len(), 1);

        let err = db.fetch_all("SELECT 2", &[]).await.unwrap_err();
        assert!(err.is_execution());
    }

    #[tokio::test]
    async fn test_defaults_when_queue_empty() {
        let db = MockDatabase::new();

        assert!(db.fetch_all("SELECT 1", &[]).await.unwrap().is_empty());
        let result = db.execute("DELETE FROM `t`", &[]).await.unwrap();
        assert_eq!(result.rows_affected, 1);
    }

    #[tokio::test]
    async fn test_statement_log() {
        let db = MockDatabase::new();
        db.execute("UPDATE `t` SET `a` = ?", &[DatabaseValue::Int(9)])
            .await
            .unwrap();

        let executed = db.last_executed().unwrap();
        assert_eq!(executed.sql, "UPDATE `t` SET `a` = ?");
        assert_eq!(executed.bindings, vec![DatabaseValue::Int(9)]);
    }
}
