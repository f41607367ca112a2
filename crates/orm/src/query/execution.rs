//! Terminal methods
//!
//! The methods that compile and run a statement. Read paths split in two:
//! `get`/`get_models` propagate execution failures, while `first*` and
//! `count` suppress them to an empty default so optional lookups stay cheap
//! for callers. Mutations always propagate. Build-time configuration and
//! binding errors are never suppressed anywhere.

use tracing::{debug, warn};

use crate::backends::core::{Database, ExecuteResult};
use crate::error::{OrmError, OrmResult};
use crate::model::Entity;
use crate::query::builder::Query;
use crate::query::types::QueryAction;
use crate::value::{DatabaseValue, Row};

impl Query {
    /// Run the statement and return all rows, in database order.
    pub async fn get(&self, db: &dyn Database) -> OrmResult<Vec<Row>> {
        let (sql, bindings) = self.generate_query()?;
        debug!(sql = %sql, "executing query");
        db.fetch_all(&sql, &bindings).await
    }

    /// Run the statement and materialize every row into an entity. Requires
    /// an entity binding.
    pub async fn get_models(&self, db: &dyn Database) -> OrmResult<Vec<Entity>> {
        let descriptor = self
            .descriptor
            .clone()
            .ok_or_else(|| {
                OrmError::Configuration(
                    "Cannot materialize entities from a query without an entity binding"
                        .to_string(),
                )
            })?;

        let rows = self.get(db).await?;
        Ok(rows
            .into_iter()
            .map(|row| Entity::from_row(descriptor.clone(), row))
            .collect())
    }

    /// Fetch the first row, or `None`. Execution failures are suppressed to
    /// `None`.
    pub async fn first_row(&mut self, db: &dyn Database) -> OrmResult<Option<Row>> {
        self.limit = Some(1);

        match self.get(db).await {
            Ok(rows) => Ok(rows.into_iter().next()),
            Err(err) if err.is_execution() => {
                warn!(error = %err, "suppressing execution failure in first()");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Fetch the first entity, or `None`. Execution failures are suppressed
    /// to `None`.
    pub async fn first(&mut self, db: &dyn Database) -> OrmResult<Option<Entity>> {
        let descriptor = self
            .descriptor
            .clone()
            .ok_or_else(|| {
                OrmError::Configuration(
                    "Cannot materialize an entity from a query without an entity binding"
                        .to_string(),
                )
            })?;

        Ok(self
            .first_row(db)
            .await?
            .map(|row| Entity::from_row(descriptor, row)))
    }

    /// Fetch the first entity or fail with [`OrmError::NotFound`].
    pub async fn first_or_fail(&mut self, db: &dyn Database) -> OrmResult<Entity> {
        let table = self.table.clone();
        self.first(db)
            .await?
            .ok_or(OrmError::NotFound(table))
    }

    /// Count the matching rows. Execution failures are suppressed to zero.
    pub async fn count(&mut self, db: &dyn Database) -> OrmResult<u64> {
        self.action = QueryAction::Count;

        let rows = match self.get(db).await {
            Ok(rows) => rows,
            Err(err) if err.is_execution() => {
                warn!(error = %err, "suppressing execution failure in count()");
                return Ok(0);
            }
            Err(err) => return Err(err),
        };

        let count = rows
            .first()
            .and_then(|row| row.get("count"))
            .and_then(|value| match value {
                DatabaseValue::Int(i) => Some(*i as u64),
                DatabaseValue::String(s) => s.parse().ok(),
                _ => None,
            })
            .unwrap_or(0);
        Ok(count)
    }

    /// Insert a row and return the generated identifier, when the backend
    /// reports one.
    pub async fn insert<I, K, V>(&mut self, data: I, db: &dyn Database) -> OrmResult<Option<u64>>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<DatabaseValue>,
    {
        self.action = QueryAction::Insert;
        self.write_data = data
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        let result = self.execute(db).await?;
        Ok(result.last_insert_id)
    }

    /// Update the matching rows and return how many were affected.
    pub async fn update<I, K, V>(&mut self, changes: I, db: &dyn Database) -> OrmResult<u64>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<DatabaseValue>,
    {
        self.action = QueryAction::Update;
        self.write_data = changes
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        let result = self.execute(db).await?;
        Ok(result.rows_affected)
    }

    /// Delete the matching rows and return how many were affected.
    ///
    /// When the bound entity type soft deletes and `force` is false, the
    /// delete is rewritten into an UPDATE stamping `deleted_at` instead.
    pub async fn delete(&mut self, force: bool, db: &dyn Database) -> OrmResult<u64> {
        let soft = self
            .descriptor
            .as_ref()
            .map(|d| d.soft_deletes())
            .unwrap_or(false);

        if soft && !force {
            let now = DatabaseValue::DateTime(chrono::Utc::now());
            return self.update([("deleted_at", now)], db).await;
        }

        self.action = QueryAction::Delete;
        let result = self.execute(db).await?;
        Ok(result.rows_affected)
    }

    /// Compile and run the statement for its side effect.
    pub async fn execute(&self, db: &dyn Database) -> OrmResult<ExecuteResult> {
        let (sql, bindings) = self.generate_query()?;
        debug!(sql = %sql, "executing statement");
        db.execute(&sql, &bindings).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::backends::mock::{MockDatabase, MockResponse};
    use crate::model::EntityDescriptor;

    fn users() -> Arc<EntityDescriptor> {
        Arc::new(EntityDescriptor::new("User", "users"))
    }

    fn soft_posts() -> Arc<EntityDescriptor> {
        Arc::new(EntityDescriptor::new("Post", "posts").with_soft_deletes())
    }

    #[tokio::test]
    async fn test_get_propagates_execution_errors() {
        let db = MockDatabase::new();
        db.push_error("server has gone away");

        let err = Query::table("users").get(&db).await.unwrap_err();
        assert!(err.is_execution());
    }

    #[tokio::test]
    async fn test_first_suppresses_execution_errors() {
        let db = MockDatabase::new();
        db.push_error("server has gone away");

        let result = Query::for_entity(users()).first(&db).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_first_sets_limit_one() {
        let db = MockDatabase::new();
        let _ = Query::for_entity(users()).first(&db).await.unwrap();

        let executed = db.last_executed().unwrap();
        assert!(executed.sql.ends_with("LIMIT 0, 1"));
    }

    #[tokio::test]
    async fn test_first_or_fail_maps_to_not_found() {
        let db = MockDatabase::new();

        let err = Query::for_entity(users())
            .first_or_fail(&db)
            .await
            .unwrap_err();
        assert_eq!(err, OrmError::NotFound("users".to_string()));
    }

    #[tokio::test]
    async fn test_count_reads_aggregate_alias() {
        let db = MockDatabase::new();
        db.push_rows(vec![Row::from_pairs([("count", 47i64)])]);

        let count = Query::table("users").count(&db).await.unwrap();
        assert_eq!(count, 47);
        assert!(db.last_executed().unwrap().sql.contains("COUNT(*) AS count"));
    }

    #[tokio::test]
    async fn test_count_suppresses_execution_errors() {
        let db = MockDatabase::new();
        db.push_error("deadlock");

        let count = Query::table("users").count(&db).await.unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_insert_returns_generated_id() {
        let db = MockDatabase::new();
        db.push_response(MockResponse::Inserted(11));

        let id = Query::table("users")
            .insert([("name", "Ada")], &db)
            .await
            .unwrap();
        assert_eq!(id, Some(11));
    }

    #[tokio::test]
    async fn test_soft_delete_rewrites_to_update() {
        let db = MockDatabase::new();

        let affected = Query::for_entity(soft_posts())
            .where_eq("id", 5)
            .delete(false, &db)
            .await
            .unwrap();
        assert_eq!(affected, 1);

        let executed = db.last_executed().unwrap();
        assert!(executed.sql.starts_with("UPDATE `posts` SET `deleted_at` = ?"));
        assert!(!executed.sql.contains("DELETE"));
    }

    #[tokio::test]
    async fn test_forced_delete_emits_delete() {
        let db = MockDatabase::new();

        Query::for_entity(soft_posts())
            .where_eq("id", 5)
            .delete(true, &db)
            .await
            .unwrap();

        let executed = db.last_executed().unwrap();
        assert!(executed.sql.starts_with("DELETE FROM `posts`"));
    }
}
