//! One-to-many relation

use std::sync::Arc;

use async_trait::async_trait;

use crate::backends::core::Database;
use crate::error::OrmResult;
use crate::model::{Entity, EntityDescriptor};
use crate::query::Query;
use crate::relations::traits::{Associatable, Relation, Savable};
use crate::value::DatabaseValue;

/// Like [`HasOne`](crate::relations::HasOne) without the row cap: every
/// related row whose foreign key matches the parent.
pub struct HasMany {
    query: Query,
    related: Arc<EntityDescriptor>,
    foreign_key: String,
    local_value: DatabaseValue,
}

impl HasMany {
    pub fn new(
        parent: &Entity,
        related: Arc<EntityDescriptor>,
        foreign_key: impl Into<String>,
        local_key: Option<&str>,
    ) -> Self {
        let foreign_key = foreign_key.into();
        let local_value =
            parent.get_value(local_key.unwrap_or(parent.descriptor().identifier_key()));

        let query = Query::for_entity(related.clone())
            .where_eq(&foreign_key, local_value.clone());

        Self {
            query,
            related,
            foreign_key,
            local_value,
        }
    }
}

impl Relation for HasMany {
    fn query(&self) -> &Query {
        &self.query
    }

    fn related(&self) -> &Arc<EntityDescriptor> {
        &self.related
    }
}

impl Associatable for HasMany {
    fn associate(&self, _parent: &mut Entity, related: &mut Entity) {
        related.set(&self.foreign_key, self.local_value.clone());
    }

    fn dissociate(&self, _parent: &mut Entity, related: Option<&mut Entity>) -> bool {
        match related {
            Some(entity) => {
                entity.set(&self.foreign_key, DatabaseValue::Null);
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl Savable for HasMany {
    async fn save_related(&self, related: &mut Entity, db: &dyn Database) -> OrmResult<()> {
        related.set(&self.foreign_key, self.local_value.clone());
        related.save(db).await
    }
}
