//! Through relations
//!
//! Both kinds hop over an intermediate entity type: the through rows are
//! resolved at construction and the related statement is scoped to the
//! collected linkage values. A missing through row collapses the predicate
//! to an always-empty `IN ()` filter instead of erroring.

use std::sync::Arc;

use crate::backends::core::Database;
use crate::error::OrmResult;
use crate::model::{Entity, EntityDescriptor};
use crate::query::Query;
use crate::relations::traits::Relation;
use crate::value::DatabaseValue;

/// One related row reached through an intermediate entity type.
pub struct HasOneThrough {
    query: Query,
    related: Arc<EntityDescriptor>,
}

impl HasOneThrough {
    /// Resolve the first through row linked to the parent, then scope the
    /// related type to that row's owner value. `first_owner` defaults to the
    /// parent's identifier key, `second_owner` to the through type's.
    #[allow(clippy::too_many_arguments)]
    pub async fn new(
        parent: &Entity,
        related: Arc<EntityDescriptor>,
        through: Arc<EntityDescriptor>,
        first_foreign: &str,
        second_foreign: &str,
        first_owner: Option<&str>,
        second_owner: Option<&str>,
        db: &dyn Database,
    ) -> OrmResult<Self> {
        let first_value =
            parent.get_value(first_owner.unwrap_or(parent.descriptor().identifier_key()));

        let through_row = Query::for_entity(through.clone())
            .where_eq(first_foreign, first_value)
            .first(db)
            .await?;

        let query = match through_row {
            Some(entry) => Query::for_entity(related.clone())
                .where_eq(
                    second_foreign,
                    entry.get_value(second_owner.unwrap_or(through.identifier_key())),
                )
                .limit(1),
            None => Query::for_entity(related.clone())
                .where_in(second_foreign, Vec::<i64>::new())
                .limit(1),
        };

        Ok(Self { query, related })
    }
}

impl Relation for HasOneThrough {
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

/// All related rows reached through an intermediate entity type.
pub struct HasManyThrough {
    query: Query,
    related: Arc<EntityDescriptor>,
}

impl HasManyThrough {
    /// Resolve every through row linked to the parent and scope the related
    /// type to the collected owner values.
    #[allow(clippy::too_many_arguments)]
    pub async fn new(
        parent: &Entity,
        related: Arc<EntityDescriptor>,
        through: Arc<EntityDescriptor>,
        first_foreign: &str,
        second_foreign: &str,
        first_owner: Option<&str>,
        second_owner: Option<&str>,
        db: &dyn Database,
    ) -> OrmResult<Self> {
        let first_value =
            parent.get_value(first_owner.unwrap_or(parent.descriptor().identifier_key()));

        let through_rows = Query::for_entity(through.clone())
            .where_eq(first_foreign, first_value)
            .get_models(db)
            .await?;

        let owner_key = second_owner.unwrap_or(through.identifier_key());
        let linkage: Vec<DatabaseValue> = through_rows
            .iter()
            .map(|entry| entry.get_value(owner_key))
            .collect();

        let query = Query::for_entity(related.clone()).where_in(second_foreign, linkage);

        Ok(Self { query, related })
    }
}

impl Relation for HasManyThrough {
    fn query(&self) -> &Query {
        &self.query
    }

    fn related(&self) -> &Arc<EntityDescriptor> {
        &self.related
    }
}
