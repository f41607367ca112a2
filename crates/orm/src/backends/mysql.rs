//! MySQL backend
//!
//! sqlx-backed implementation of the execution adaptor. The compiled SQL this
//! crate emits (backtick quoting, `?` placeholders) is the MySQL dialect, so
//! strings go to the driver unmodified.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::mysql::{MySqlPoolOptions, MySqlRow};
use sqlx::{Column, MySql, Pool, Row as SqlxRow, TypeInfo};
use tracing::debug;

use crate::backends::core::{Database, ExecuteResult, PoolConfig};
use crate::error::{OrmError, OrmResult};
use crate::value::{DatabaseValue, Row};

/// MySQL execution adaptor over a sqlx connection pool.
pub struct MySqlBackend {
    pool: Arc<Pool<MySql>>,
}

impl MySqlBackend {
    pub fn new(pool: Arc<Pool<MySql>>) -> Self {
        Self { pool }
    }

    /// Connect and build a pool from a `mysql://` URL.
    pub async fn connect(database_url: &str, config: PoolConfig) -> OrmResult<Self> {
        if !database_url.starts_with("mysql://") {
            return Err(OrmError::Connection("Invalid MySQL URL scheme".to_string()));
        }

        let mut options = MySqlPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(std::time::Duration::from_secs(config.acquire_timeout_seconds));

        if let Some(idle_timeout) = config.idle_timeout_seconds {
            options = options.idle_timeout(std::time::Duration::from_secs(idle_timeout));
        }

        if let Some(max_lifetime) = config.max_lifetime_seconds {
            options = options.max_lifetime(std::time::Duration::from_secs(max_lifetime));
        }

        let pool = options
            .connect(database_url)
            .await
            .map_err(|e| OrmError::Connection(format!("Failed to create MySQL pool: {}", e)))?;

        Ok(Self::new(Arc::new(pool)))
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl Database for MySqlBackend {
    async fn fetch_all(&self, sql: &str, params: &[DatabaseValue]) -> OrmResult<Vec<Row>> {
        debug!(sql = %sql, bindings = params.len(), "executing fetch");

        let mut query = sqlx::query(sql);
        for param in params {
            query = bind_database_value(query, param);
        }

        let rows = query
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| OrmError::execution(sql, e.to_string()))?;

        rows.iter().map(mysql_row_to_row).collect()
    }

    async fn execute(&self, sql: &str, params: &[DatabaseValue]) -> OrmResult<ExecuteResult> {
        debug!(sql = %sql, bindings = params.len(), "executing statement");

        let mut query = sqlx::query(sql);
        for param in params {
            query = bind_database_value(query, param);
        }

        let result = query
            .execute(&*self.pool)
            .await
            .map_err(|e| OrmError::execution(sql, e.to_string()))?;

        let last_insert_id = match result.last_insert_id() {
            0 => None,
            id => Some(id),
        };

        Ok(ExecuteResult {
            rows_affected: result.rows_affected(),
            last_insert_id,
        })
    }
}

/// Bind one value to a sqlx query in placeholder order.
fn bind_database_value<'a>(
    query: sqlx::query::Query<'a, MySql, sqlx::mysql::MySqlArguments>,
    value: &'a DatabaseValue,
) -> sqlx::query::Query<'a, MySql, sqlx::mysql::MySqlArguments> {
    match value {
        DatabaseValue::Null => query.bind(Option::<String>::None),
        DatabaseValue::Bool(b) => query.bind(*b),
        DatabaseValue::Int(i) => query.bind(*i),
        DatabaseValue::Float(f) => query.bind(*f),
        DatabaseValue::String(s) => query.bind(s.as_str()),
        DatabaseValue::Bytes(b) => query.bind(b.as_slice()),
        DatabaseValue::Uuid(u) => query.bind(u.to_string()),
        DatabaseValue::DateTime(dt) => query.bind(*dt),
        DatabaseValue::Date(d) => query.bind(*d),
        DatabaseValue::Time(t) => query.bind(*t),
    }
}

/// Materialize one driver row into the crate's column map.
fn mysql_row_to_row(row: &MySqlRow) -> OrmResult<Row> {
    let mut out = Row::new();
    for (index, column) in row.columns().iter().enumerate() {
        out.insert(column.name(), mysql_value_to_database_value(row, index)?);
    }
    Ok(out)
}

fn mysql_value_to_database_value(row: &MySqlRow, index: usize) -> OrmResult<DatabaseValue> {
    let column = &row.columns()[index];
    let type_name = column.type_info().name();

    let decode_err = |kind: &str, e: sqlx::Error| {
        OrmError::Connection(format!(
            "Failed to decode {} column '{}': {}",
            kind,
            column.name(),
            e
        ))
    };

    match type_name {
        "BOOLEAN" => {
            let value: Option<bool> = row.try_get(index).map_err(|e| decode_err("bool", e))?;
            Ok(value.map(DatabaseValue::Bool).unwrap_or(DatabaseValue::Null))
        }
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
            let value: Option<i64> = row.try_get(index).map_err(|e| decode_err("integer", e))?;
            Ok(value.map(DatabaseValue::Int).unwrap_or(DatabaseValue::Null))
        }
        "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
        | "BIGINT UNSIGNED" => {
            let value: Option<u64> = row.try_get(index).map_err(|e| decode_err("integer", e))?;
            Ok(value
                .map(|v| DatabaseValue::Int(v as i64))
                .unwrap_or(DatabaseValue::Null))
        }
        "FLOAT" => {
            let value: Option<f32> = row.try_get(index).map_err(|e| decode_err("float", e))?;
            Ok(value
                .map(|v| DatabaseValue::Float(v as f64))
                .unwrap_or(DatabaseValue::Null))
        }
        "DOUBLE" => {
            let value: Option<f64> = row.try_get(index).map_err(|e| decode_err("double", e))?;
            Ok(value
                .map(DatabaseValue::Float)
                .unwrap_or(DatabaseValue::Null))
        }
        "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BINARY" | "VARBINARY" => {
            let value: Option<Vec<u8>> = row.try_get(index).map_err(|e| decode_err("bytes", e))?;
            Ok(value
                .map(DatabaseValue::Bytes)
                .unwrap_or(DatabaseValue::Null))
        }
        "TIMESTAMP" | "DATETIME" => {
            let value: Option<chrono::DateTime<chrono::Utc>> =
                row.try_get(index).map_err(|e| decode_err("datetime", e))?;
            Ok(value
                .map(DatabaseValue::DateTime)
                .unwrap_or(DatabaseValue::Null))
        }
        "DATE" => {
            let value: Option<chrono::NaiveDate> =
                row.try_get(index).map_err(|e| decode_err("date", e))?;
            Ok(value.map(DatabaseValue::Date).unwrap_or(DatabaseValue::Null))
        }
        "TIME" => {
            let value: Option<chrono::NaiveTime> =
                row.try_get(index).map_err(|e| decode_err("time", e))?;
            Ok(value.map(DatabaseValue::Time).unwrap_or(DatabaseValue::Null))
        }
        // DECIMAL, CHAR/VARCHAR/TEXT, ENUM and anything else come back as
        // strings.
        _ => {
            let value: Option<String> = row.try_get(index).map_err(|e| decode_err("string", e))?;
            Ok(value
                .map(DatabaseValue::String)
                .unwrap_or(DatabaseValue::Null))
        }
    }
}
