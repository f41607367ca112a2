//! Polymorphic one-to-many relation

use std::sync::Arc;

use async_trait::async_trait;

use crate::backends::core::Database;
use crate::error::OrmResult;
use crate::model::{Entity, EntityDescriptor};
use crate::query::Query;
use crate::relations::traits::{Associatable, Relation, Savable};
use crate::relations::{morph_id_column, morph_type_column};
use crate::value::DatabaseValue;

/// [`MorphOne`](crate::relations::MorphOne) without the row cap: every
/// related row carrying the parent's type and id.
pub struct MorphMany {
    query: Query,
    related: Arc<EntityDescriptor>,
    morph_key: String,
    parent_type: String,
    parent_id: DatabaseValue,
}

impl MorphMany {
    pub fn new(parent: &Entity, related: Arc<EntityDescriptor>, morph_key: &str) -> Self {
        let parent_type = parent.descriptor().name().to_string();
        let parent_id = parent.get_value(parent.descriptor().identifier_key());

        let query = Query::for_entity(related.clone())
            .where_eq(&morph_type_column(morph_key), parent_type.as_str())
            .where_eq(&morph_id_column(morph_key), parent_id.clone());

        Self {
            query,
            related,
            morph_key: morph_key.to_string(),
            parent_type,
            parent_id,
        }
    }
}

impl Relation for MorphMany {
    fn query(&self) -> &Query {
        &self.query
    }

    fn related(&self) -> &Arc<EntityDescriptor> {
        &self.related
    }
}

impl Associatable for MorphMany {
    fn associate(&self, _parent: &mut Entity, related: &mut Entity) {
        related.set(morph_type_column(&self.morph_key), self.parent_type.as_str());
        related.set(morph_id_column(&self.morph_key), self.parent_id.clone());
    }

    fn dissociate(&self, _parent: &mut Entity, related: Option<&mut Entity>) -> bool {
        match related {
            Some(entity) => {
                entity.set(morph_type_column(&self.morph_key), DatabaseValue::Null);
                entity.set(morph_id_column(&self.morph_key), DatabaseValue::Null);
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl Savable for MorphMany {
    async fn save_related(&self, related: &mut Entity, db: &dyn Database) -> OrmResult<()> {
        related.set(morph_type_column(&self.morph_key), self.parent_type.as_str());
        related.set(morph_id_column(&self.morph_key), self.parent_id.clone());
        related.save(db).await
    }
}
