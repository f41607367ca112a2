//! Many-to-many relation

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::backends::core::Database;
use crate::error::{OrmError, OrmResult};
use crate::model::{Entity, EntityDescriptor};
use crate::query::Query;
use crate::relations::traits::{Attachable, Relation, Savable};
use crate::relations::pluck_ids;
use crate::value::DatabaseValue;

/// Many-to-many through an intermediate table holding one row per link.
/// The intermediate table is addressed directly, with no entity type of its
/// own.
pub struct BelongsToMany {
    query: Query,
    related: Arc<EntityDescriptor>,
    intermediate_table: String,
    /// Intermediate column referencing the parent.
    local_key: String,
    /// Intermediate column referencing the related type.
    foreign_key: String,
    parent_id: DatabaseValue,
}

impl BelongsToMany {
    /// Look the attached ids up in the intermediate table and scope the
    /// related type to them. A failed lookup scopes to the empty set.
    pub async fn new(
        parent: &Entity,
        related: Arc<EntityDescriptor>,
        intermediate_table: impl Into<String>,
        local_key: impl Into<String>,
        foreign_key: impl Into<String>,
        db: &dyn Database,
    ) -> Self {
        let mut relation = Self {
            query: Query::for_entity(related.clone()),
            related,
            intermediate_table: intermediate_table.into(),
            local_key: local_key.into(),
            foreign_key: foreign_key.into(),
            parent_id: parent.get_value(parent.descriptor().identifier_key()),
        };

        let attached = relation.attached_ids(db).await;
        relation.query = Query::for_entity(relation.related.clone())
            .where_in(relation.related.identifier_key(), attached);
        relation
    }

    fn intermediate(&self) -> Query {
        Query::table(&self.intermediate_table)
    }
}

impl Relation for BelongsToMany {
    fn query(&self) -> &Query {
        &self.query
    }

    fn related(&self) -> &Arc<EntityDescriptor> {
        &self.related
    }
}

#[async_trait]
impl Attachable for BelongsToMany {
    async fn attached_ids(&self, db: &dyn Database) -> Vec<i64> {
        let lookup = self
            .intermediate()
            .where_eq(&self.local_key, self.parent_id.clone())
            .get(db)
            .await;

        match lookup {
            Ok(rows) => pluck_ids(&rows, &self.foreign_key),
            Err(err) => {
                warn!(error = %err, table = %self.intermediate_table,
                    "attached-id lookup failed, treating as empty");
                Vec::new()
            }
        }
    }

    async fn attach(&self, ids: &[i64], db: &dyn Database) -> OrmResult<()> {
        let attached = self.attached_ids(db).await;

        for id in ids.iter().filter(|id| !attached.contains(id)) {
            self.intermediate()
                .insert(
                    [
                        (self.local_key.clone(), self.parent_id.clone()),
                        (self.foreign_key.clone(), DatabaseValue::Int(*id)),
                    ],
                    db,
                )
                .await?;
        }
        Ok(())
    }

    async fn detach(&self, ids: &[i64], db: &dyn Database) -> OrmResult<()> {
        self.intermediate()
            .where_eq(&self.local_key, self.parent_id.clone())
            .where_in(&self.foreign_key, ids.iter().copied())
            .delete(false, db)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Savable for BelongsToMany {
    /// Persist the related entity, then link it through the intermediate
    /// table.
    async fn save_related(&self, related: &mut Entity, db: &dyn Database) -> OrmResult<()> {
        related.save(db).await?;

        let id = related.identifier().ok_or_else(|| {
            OrmError::Configuration(
                "Cannot attach a related entity without an identifier".to_string(),
            )
        })?;
        self.attach(&[id], db).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::mock::{MockDatabase, MockResponse};
    use crate::value::Row;

    fn users() -> Arc<EntityDescriptor> {
        Arc::new(EntityDescriptor::new("User", "users"))
    }

    fn roles() -> Arc<EntityDescriptor> {
        Arc::new(EntityDescriptor::new("Role", "roles"))
    }

    fn user(id: i64) -> Entity {
        Entity::from_row(users(), Row::from_pairs([("id", id)]))
    }

    fn pivot_rows(ids: &[i64]) -> Vec<Row> {
        ids.iter()
            .map(|id| Row::from_pairs([("role_id", *id)]))
            .collect()
    }

    async fn relation(attached: &[i64], db: &MockDatabase) -> BelongsToMany {
        db.push_rows(pivot_rows(attached));
        BelongsToMany::new(&user(1), roles(), "role_user", "user_id", "role_id", db).await
    }

    #[tokio::test]
    async fn test_scopes_to_attached_ids() {
        let db = MockDatabase::new();
        let rel = relation(&[1, 2], &db).await;

        let lookup = &db.executed()[0];
        assert_eq!(
            lookup.sql,
            "SELECT * FROM `role_user` WHERE `user_id` = ?"
        );

        let (sql, bindings) = rel.query().generate_query().unwrap();
        assert_eq!(sql, "SELECT * FROM `roles` WHERE `id` IN (?,?)");
        assert_eq!(bindings, vec![DatabaseValue::Int(1), DatabaseValue::Int(2)]);
    }

    #[tokio::test]
    async fn test_failed_lookup_scopes_to_empty_set() {
        let db = MockDatabase::new();
        db.push_error("intermediate table missing");

        let rel =
            BelongsToMany::new(&user(1), roles(), "role_user", "user_id", "role_id", &db).await;

        let (sql, _) = rel.query().generate_query().unwrap();
        assert_eq!(sql, "SELECT * FROM `roles` WHERE FALSE");
    }

    #[tokio::test]
    async fn test_attach_skips_already_attached() {
        let db = MockDatabase::new();
        let rel = relation(&[1], &db).await;

        db.push_rows(pivot_rows(&[1]));
        rel.attach(&[1, 2], &db).await.unwrap();

        let inserts: Vec<_> = db
            .executed()
            .iter()
            .filter(|q| q.sql.starts_with("INSERT"))
            .cloned()
            .collect();
        assert_eq!(inserts.len(), 1);
        assert_eq!(
            inserts[0].sql,
            "INSERT INTO `role_user`(`role_id`, `user_id`) VALUES(?, ?)"
        );
        assert_eq!(
            inserts[0].bindings,
            vec![DatabaseValue::Int(2), DatabaseValue::Int(1)]
        );
    }

    #[tokio::test]
    async fn test_attach_after_failed_lookup_inserts_unconditionally() {
        let db = MockDatabase::new();
        let rel = relation(&[], &db).await;

        // The attach-time lookup fails, so id 5 reads as not attached.
        db.push_error("lookup failed");
        rel.attach(&[5], &db).await.unwrap();

        let inserts: Vec<_> = db
            .executed()
            .iter()
            .filter(|q| q.sql.starts_with("INSERT"))
            .cloned()
            .collect();
        assert_eq!(inserts.len(), 1);
    }

    #[tokio::test]
    async fn test_detach_is_scoped_to_parent() {
        let db = MockDatabase::new();
        let rel = relation(&[1, 2], &db).await;

        rel.detach(&[1], &db).await.unwrap();

        let executed = db.last_executed().unwrap();
        assert_eq!(
            executed.sql,
            "DELETE FROM `role_user` WHERE `user_id` = ? AND `role_id` IN (?)"
        );
        assert_eq!(
            executed.bindings,
            vec![DatabaseValue::Int(1), DatabaseValue::Int(1)]
        );
    }

    #[tokio::test]
    async fn test_sync_detaches_stale_and_attaches_missing() {
        let db = MockDatabase::new();
        let rel = relation(&[1, 2], &db).await;

        // sync's own lookup, the detach, then attach's re-derivation.
        db.push_rows(pivot_rows(&[1, 2]));
        db.push_response(MockResponse::Affected(1));
        db.push_rows(pivot_rows(&[2]));
        rel.sync(&[2, 3], &db).await.unwrap();

        let deletes: Vec<_> = db
            .executed()
            .iter()
            .filter(|q| q.sql.starts_with("DELETE"))
            .cloned()
            .collect();
        let inserts: Vec<_> = db
            .executed()
            .iter()
            .filter(|q| q.sql.starts_with("INSERT"))
            .cloned()
            .collect();

        assert_eq!(deletes.len(), 1);
        assert_eq!(
            deletes[0].bindings,
            vec![DatabaseValue::Int(1), DatabaseValue::Int(1)]
        );
        assert_eq!(inserts.len(), 1);
        assert_eq!(
            inserts[0].bindings,
            vec![DatabaseValue::Int(3), DatabaseValue::Int(1)]
        );
    }

    #[tokio::test]
    async fn test_sync_with_no_changes_issues_no_mutations() {
        let db = MockDatabase::new();
        let rel = relation(&[1, 2], &db).await;

        // Only sync's own lookup runs; nothing to detach or attach.
        db.push_rows(pivot_rows(&[1, 2]));
        rel.sync(&[1, 2], &db).await.unwrap();

        // The constructor lookup and sync's lookup are the only statements.
        let executed = db.executed();
        assert_eq!(executed.len(), 2);
        assert!(executed.iter().all(|q| q.sql.starts_with("SELECT")));
    }

    #[tokio::test]
    async fn test_toggle_flips_membership() {
        let db = MockDatabase::new();
        let rel = relation(&[1, 2], &db).await;

        db.push_rows(pivot_rows(&[1, 2]));
        db.push_response(MockResponse::Affected(1));
        db.push_rows(pivot_rows(&[2]));
        rel.toggle(&[1, 3], &db).await.unwrap();

        let deletes: Vec<_> = db
            .executed()
            .iter()
            .filter(|q| q.sql.starts_with("DELETE"))
            .cloned()
            .collect();
        let inserts: Vec<_> = db
            .executed()
            .iter()
            .filter(|q| q.sql.starts_with("INSERT"))
            .cloned()
            .collect();

        // 1 was attached so it detaches; 3 was missing so it attaches.
        assert_eq!(deletes.len(), 1);
        assert_eq!(inserts.len(), 1);
        assert_eq!(
            inserts[0].bindings,
            vec![DatabaseValue::Int(3), DatabaseValue::Int(1)]
        );
    }
}
