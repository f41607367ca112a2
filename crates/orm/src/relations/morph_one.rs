//! Polymorphic one-to-one relation

use std::sync::Arc;

use async_trait::async_trait;

use crate::backends::core::Database;
use crate::error::OrmResult;
use crate::model::{Entity, EntityDescriptor};
use crate::query::Query;
use crate::relations::traits::{Associatable, Relation, Savable};
use crate::relations::{morph_id_column, morph_type_column};
use crate::value::DatabaseValue;

/// A has-one where the related row stores the parent's type name next to
/// its id, so multiple parent types can share the related table.
pub struct MorphOne {
    query: Query,
    related: Arc<EntityDescriptor>,
    morph_key: String,
    parent_type: String,
    parent_id: DatabaseValue,
}

impl MorphOne {
    pub fn new(parent: &Entity, related: Arc<EntityDescriptor>, morph_key: &str) -> Self {
        let parent_type = parent.descriptor().name().to_string();
        let parent_id = parent.get_value(parent.descriptor().identifier_key());

        let query = Query::for_entity(related.clone())
            .where_eq(&morph_type_column(morph_key), parent_type.as_str())
            .where_eq(&morph_id_column(morph_key), parent_id.clone())
            .limit(1);

        Self {
            query,
            related,
            morph_key: morph_key.to_string(),
            parent_type,
            parent_id,
        }
    }

    /// Fetch the currently associated entity and null its discriminator
    /// columns in memory. The caller persists the returned entity to make
    /// the dissociation stick.
    pub async fn dissociate_current(&self, db: &dyn Database) -> OrmResult<Option<Entity>> {
        let mut query = self.query.clone();
        let Some(mut current) = query.first(db).await? else {
            return Ok(None);
        };

        current.set(morph_type_column(&self.morph_key), DatabaseValue::Null);
        current.set(morph_id_column(&self.morph_key), DatabaseValue::Null);
        Ok(Some(current))
    }
}

impl Relation for MorphOne {
    fn query(&self) -> &Query {
        &self.query
    }

    fn related(&self) -> &Arc<EntityDescriptor> {
        &self.related
    }

    fn singular(&self) -> bool {
        true
    }
}

impl Associatable for MorphOne {
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
impl Savable for MorphOne {
    async fn save_related(&self, related: &mut Entity, db: &dyn Database) -> OrmResult<()> {
        related.set(morph_type_column(&self.morph_key), self.parent_type.as_str());
        related.set(morph_id_column(&self.morph_key), self.parent_id.clone());
        related.save(db).await
    }
}
