//! Child-to-owner relation

use std::sync::Arc;

use crate::model::{Entity, EntityDescriptor};
use crate::query::Query;
use crate::relations::traits::{Associatable, Relation};
use crate::value::DatabaseValue;

/// The inverse of a has-one/has-many: the parent row holds the foreign key
/// pointing at the owning row.
pub struct BelongsTo {
    query: Query,
    related: Arc<EntityDescriptor>,
    foreign_key: String,
    owner_key: String,
}

impl BelongsTo {
    /// Scope the related type to the row the parent's foreign key points at.
    /// `owner_key` defaults to the related type's identifier key.
    pub fn new(
        parent: &Entity,
        related: Arc<EntityDescriptor>,
        foreign_key: impl Into<String>,
        owner_key: Option<&str>,
    ) -> Self {
        let foreign_key = foreign_key.into();
        let owner_key = owner_key
            .unwrap_or(related.identifier_key())
            .to_string();

        let query = Query::for_entity(related.clone())
            .where_eq(&owner_key, parent.get_value(&foreign_key))
            .limit(1);

        Self {
            query,
            related,
            foreign_key,
            owner_key,
        }
    }
}

impl Relation for BelongsTo {
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

impl Associatable for BelongsTo {
    /// Point the parent's foreign key at the related entity.
    fn associate(&self, parent: &mut Entity, related: &mut Entity) {
        parent.set(&self.foreign_key, related.get_value(&self.owner_key));
    }

    /// Null the parent's foreign key. Fails at save time if the column is
    /// not nullable.
    fn dissociate(&self, parent: &mut Entity, _related: Option<&mut Entity>) -> bool {
        parent.set(&self.foreign_key, DatabaseValue::Null);
        true
    }
}
