//! Polymorphic many-to-many relation

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::backends::core::Database;
use crate::error::{OrmError, OrmResult};
use crate::model::{Entity, EntityDescriptor};
use crate::query::Query;
use crate::relations::traits::{Attachable, Relation, Savable};
use crate::relations::{morph_id_column, morph_type_column, pluck_ids};
use crate::value::DatabaseValue;

/// Many-to-many where the intermediate rows carry the parent's type next to
/// its id, so several parent types can share one link table (tags on posts
/// and videos, say).
pub struct MorphToMany {
    query: Query,
    related: Arc<EntityDescriptor>,
    intermediate_table: String,
    /// Intermediate column referencing the related type.
    related_key: String,
    morph_key: String,
    parent_type: String,
    parent_id: DatabaseValue,
}

impl MorphToMany {
    /// Look the attached ids up in the intermediate table, filtered by the
    /// parent's type discriminator, and scope the related type to them.
    pub async fn new(
        parent: &Entity,
        related: Arc<EntityDescriptor>,
        related_key: impl Into<String>,
        morph_key: impl Into<String>,
        intermediate_table: impl Into<String>,
        db: &dyn Database,
    ) -> Self {
        let mut relation = Self {
            query: Query::for_entity(related.clone()),
            related,
            intermediate_table: intermediate_table.into(),
            related_key: related_key.into(),
            morph_key: morph_key.into(),
            parent_type: parent.descriptor().name().to_string(),
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

    /// Scope an intermediate-table statement to this parent's links.
    fn scoped_intermediate(&self) -> Query {
        self.intermediate()
            .where_eq(&morph_id_column(&self.morph_key), self.parent_id.clone())
            .where_eq(
                &morph_type_column(&self.morph_key),
                self.parent_type.as_str(),
            )
    }
}

impl Relation for MorphToMany {
    fn query(&self) -> &Query {
        &self.query
    }

    fn related(&self) -> &Arc<EntityDescriptor> {
        &self.related
    }
}

#[async_trait]
impl Attachable for MorphToMany {
    async fn attached_ids(&self, db: &dyn Database) -> Vec<i64> {
        match self.scoped_intermediate().get(db).await {
            Ok(rows) => pluck_ids(&rows, &self.related_key),
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
                            DatabaseValue::String(self.parent_type.clone()),
                        ),
                        (morph_id_column(&self.morph_key), self.parent_id.clone()),
                        (self.related_key.clone(), DatabaseValue::Int(*id)),
                    ],
                    db,
                )
                .await?;
        }
        Ok(())
    }

    async fn detach(&self, ids: &[i64], db: &dyn Database) -> OrmResult<()> {
        self.scoped_intermediate()
            .where_in(&self.related_key, ids.iter().copied())
            .delete(false, db)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Savable for MorphToMany {
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
