//! Inverse polymorphic many-to-many relation

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::backends::core::Database;
use crate::error::OrmResult;
use crate::model::{Entity, EntityDescriptor};
use crate::query::Query;
use crate::relations::traits::{Attachable, Relation};
use crate::relations::{morph_id_column, morph_type_column, pluck_ids};
use crate::value::DatabaseValue;

/// The inverse of [`MorphToMany`](crate::relations::MorphToMany): the parent
/// is the plain side (a tag), the related type is one of the morphed types
/// (posts), and the intermediate rows are filtered by the related type's
/// discriminator.
pub struct MorphedByMany {
    query: Query,
    related: Arc<EntityDescriptor>,
    intermediate_table: String,
    /// Intermediate column referencing the parent.
    local_key: String,
    morph_key: String,
    parent_id: DatabaseValue,
}

impl MorphedByMany {
    pub async fn new(
        parent: &Entity,
        related: Arc<EntityDescriptor>,
        local_key: impl Into<String>,
        morph_key: impl Into<String>,
        intermediate_table: impl Into<String>,
        db: &dyn Database,
    ) -> Self {
        let mut relation = Self {
            query: Query::for_entity(related.clone()),
            related,
            intermediate_table: intermediate_table.into(),
            local_key: local_key.into(),
            morph_key: morph_key.into(),
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

    /// Scope an intermediate-table statement to this parent's links to the
    /// related type.
    fn scoped_intermediate(&self) -> Query {
        self.intermediate()
            .where_eq(&self.local_key, self.parent_id.clone())
            .where_eq(
                &morph_type_column(&self.morph_key),
                self.related.name(),
            )
    }
}

impl Relation for MorphedByMany {
    fn query(&self) -> &Query {
        &self.query
    }

    fn related(&self) -> &Arc<EntityDescriptor> {
        &self.related
    }
}

#[async_trait]
impl Attachable for MorphedByMany {
    async fn attached_ids(&self, db: &dyn Database) -> Vec<i64> {
        match self.scoped_intermediate().get(db).await {
            Ok(rows) => pluck_ids(&rows, &morph_id_column(&self.morph_key)),
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
                        (
                            morph_type_column(&self.morph_key),
                            DatabaseValue::String(self.related.name().to_string()),
                        ),
                        (morph_id_column(&self.morph_key), DatabaseValue::Int(*id)),
                        (self.local_key.clone(), self.parent_id.clone()),
                    ],
                    db,
                )
                .await?;
        }
        Ok(())
    }

    async fn detach(&self, ids: &[i64], db: &dyn Database) -> OrmResult<()> {
        self.scoped_intermediate()
            .where_in(&morph_id_column(&self.morph_key), ids.iter().copied())
            .delete(false, db)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::mock::MockDatabase;
    use crate::value::Row;

    fn tags() -> Arc<EntityDescriptor> {
        Arc::new(EntityDescriptor::new("Tag", "tags"))
    }

    fn posts() -> Arc<EntityDescriptor> {
        Arc::new(EntityDescriptor::new("Post", "posts"))
    }

    fn tag(id: i64) -> Entity {
        Entity::from_row(tags(), Row::from_pairs([("id", id)]))
    }

    fn pivot_rows(ids: &[i64]) -> Vec<Row> {
        ids.iter()
            .map(|id| Row::from_pairs([("taggable_id", *id)]))
            .collect()
    }

    async fn relation(attached: &[i64], db: &MockDatabase) -> MorphedByMany {
        db.push_rows(pivot_rows(attached));
        MorphedByMany::new(&tag(2), posts(), "tag_id", "taggable", "taggables", db).await
    }

    #[tokio::test]
    async fn test_lookup_filters_by_related_type() {
        let db = MockDatabase::new();
        let rel = relation(&[10, 11], &db).await;

        let lookup = &db.executed()[0];
        assert_eq!(
            lookup.sql,
            "SELECT * FROM `taggables` WHERE `tag_id` = ? AND `taggable_type` = ?"
        );
        assert_eq!(
            lookup.bindings,
            vec![DatabaseValue::Int(2), DatabaseValue::String("Post".into())]
        );

        let (sql, bindings) = rel.query().generate_query().unwrap();
        assert_eq!(sql, "SELECT * FROM `posts` WHERE `id` IN (?,?)");
        assert_eq!(
            bindings,
            vec![DatabaseValue::Int(10), DatabaseValue::Int(11)]
        );
    }

    #[tokio::test]
    async fn test_attach_inserts_related_type_discriminator() {
        let db = MockDatabase::new();
        let rel = relation(&[], &db).await;

        db.push_rows(pivot_rows(&[]));
        rel.attach(&[10], &db).await.unwrap();

        let executed = db.last_executed().unwrap();
        assert_eq!(
            executed.sql,
            "INSERT INTO `taggables`(`tag_id`, `taggable_id`, `taggable_type`) VALUES(?, ?, ?)"
        );
        assert_eq!(
            executed.bindings,
            vec![
                DatabaseValue::Int(2),
                DatabaseValue::Int(10),
                DatabaseValue::String("Post".into())
            ]
        );
    }

    #[tokio::test]
    async fn test_detach_filters_morphed_ids() {
        let db = MockDatabase::new();
        let rel = relation(&[10], &db).await;

        rel.detach(&[10], &db).await.unwrap();

        let executed = db.last_executed().unwrap();
        assert_eq!(
            executed.sql,
            "DELETE FROM `taggables` WHERE `tag_id` = ? AND `taggable_type` = ? AND `taggable_id` IN (?)"
        );
    }
}
