//! Relation capability traits
//!
//! [`Relation`] is the common surface: expose the scoped statement and load
//! it at the relation's cardinality. The capability traits layer on top of
//! it per kind: [`Associatable`] for foreign-key wiring on in-memory
//! entities, [`Savable`] for persist-and-link, [`Attachable`] for the
//! intermediate-table set operations of the many-to-many family.

use std::sync::Arc;

use async_trait::async_trait;

use crate::backends::core::Database;
use crate::error::OrmResult;
use crate::model::{Entity, EntityDescriptor};
use crate::query::Query;
use crate::relations::RelationResult;
use crate::value::DatabaseValue;

/// Common surface of every relation kind.
#[async_trait]
pub trait Relation: Send + Sync {
    /// The scoped statement, predicates already applied.
    fn query(&self) -> &Query;

    /// The related entity type.
    fn related(&self) -> &Arc<EntityDescriptor>;

    /// Whether loading reduces to first-or-none instead of the full set.
    fn singular(&self) -> bool {
        false
    }

    /// Fetch the related rows, reduced to this relation's cardinality.
    async fn load(&self, db: &dyn Database) -> OrmResult<RelationResult> {
        let mut query = self.query().clone();
        if self.singular() {
            Ok(RelationResult::One(query.first(db).await?))
        } else {
            Ok(RelationResult::Many(query.get_models(db).await?))
        }
    }
}

/// Foreign-key (or morph type + id) wiring on in-memory entities. Neither
/// method persists anything; the caller saves the mutated side afterwards.
pub trait Associatable: Relation {
    /// Link the related entity to the parent by writing the linkage fields.
    /// Depending on the kind the fields land on the parent or on the related
    /// entity.
    fn associate(&self, parent: &mut Entity, related: &mut Entity);

    /// Null the linkage fields. Returns false when there was nothing to
    /// dissociate (a kind that writes to the related entity got `None`).
    fn dissociate(&self, parent: &mut Entity, related: Option<&mut Entity>) -> bool;
}

/// Persist-and-link: wire the linkage fields and save the related entity.
#[async_trait]
pub trait Savable: Relation {
    async fn save_related(&self, related: &mut Entity, db: &dyn Database) -> OrmResult<()>;

    /// Build a new related entity from the data, link it, and persist it.
    async fn create(
        &self,
        data: Vec<(String, DatabaseValue)>,
        db: &dyn Database,
    ) -> OrmResult<Entity> {
        let mut entity = Entity::make(self.related().clone(), data);
        self.save_related(&mut entity, db).await?;
        Ok(entity)
    }
}

/// Intermediate-table set operations for the many-to-many family.
///
/// The attached-id set is re-derived from the intermediate table on every
/// call; a failed lookup reads as an empty set rather than an error, so the
/// mutations proceed as if nothing were attached. The mutations themselves
/// still report their own failures.
#[async_trait]
pub trait Attachable: Relation {
    /// The ids currently attached to the parent. Lookup failures read as
    /// empty.
    async fn attached_ids(&self, db: &dyn Database) -> Vec<i64>;

    /// Insert intermediate rows for the ids not already attached.
    async fn attach(&self, ids: &[i64], db: &dyn Database) -> OrmResult<()>;

    /// Delete the parent's intermediate rows matching the ids.
    async fn detach(&self, ids: &[i64], db: &dyn Database) -> OrmResult<()>;

    /// Make the attached set exactly `ids`: detach what is no longer listed,
    /// attach what is missing. A half with nothing to do issues no
    /// statements.
    async fn sync(&self, ids: &[i64], db: &dyn Database) -> OrmResult<()> {
        let attached = self.attached_ids(db).await;

        let deprecated: Vec<i64> = attached
            .iter()
            .copied()
            .filter(|id| !ids.contains(id))
            .collect();
        let missing: Vec<i64> = ids
            .iter()
            .copied()
            .filter(|id| !attached.contains(id))
            .collect();

        if !deprecated.is_empty() {
            self.detach(&deprecated, db).await?;
        }
        if !missing.is_empty() {
            self.attach(&missing, db).await?;
        }
        Ok(())
    }

    /// Flip membership per id: attached ids get detached, missing ids get
    /// attached.
    async fn toggle(&self, ids: &[i64], db: &dyn Database) -> OrmResult<()> {
        let attached = self.attached_ids(db).await;

        let existing: Vec<i64> = attached
            .iter()
            .copied()
            .filter(|id| ids.contains(id))
            .collect();
        let missing: Vec<i64> = ids
            .iter()
            .copied()
            .filter(|id| !attached.contains(id))
            .collect();

        if !existing.is_empty() {
            self.detach(&existing, db).await?;
        }
        if !missing.is_empty() {
            self.attach(&missing, db).await?;
        }
        Ok(())
    }
}
