//! One-to-one relation

use std::sync::Arc;

use async_trait::async_trait;

use crate::backends::core::Database;
use crate::error::OrmResult;
use crate::model::{Entity, EntityDescriptor};
use crate::query::Query;
use crate::relations::traits::{Associatable, Relation, Savable};
use crate::value::DatabaseValue;

/// The related row holds a foreign key pointing back at the parent; at most
/// one related row is read.
pub struct HasOne {
    query: Query,
    related: Arc<EntityDescriptor>,
    foreign_key: String,
    /// The parent's local key value, captured at construction.
    local_value: DatabaseValue,
}

impl HasOne {
    /// Scope the related type to rows whose foreign key matches the parent.
    /// `local_key` defaults to the parent's identifier key.
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
            .where_eq(&foreign_key, local_value.clone())
            .limit(1);

        Self {
            query,
            related,
            foreign_key,
            local_value,
        }
    }
}

impl Relation for HasOne {
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

impl Associatable for HasOne {
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
impl Savable for HasOne {
    async fn save_related(&self, related: &mut Entity, db: &dyn Database) -> OrmResult<()> {
        related.set(&self.foreign_key, self.local_value.clone());
        related.save(db).await
    }
}
