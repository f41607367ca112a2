//! Entities
//!
//! An entity is one row held in memory: an attribute map with a snapshot of
//! its load-time state for dirty tracking, plus a per-instance cache of
//! resolved relations. Attribute access is an explicit get/set API; nothing
//! is intercepted or conjured dynamically.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::warn;

use crate::backends::core::Database;
use crate::error::OrmResult;
use crate::model::descriptor::EntityDescriptor;
use crate::query::{CompareOp, Query};
use crate::relations::RelationResult;
use crate::value::{DatabaseValue, Row};

/// One database row as an in-memory attribute map with dirty tracking.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    descriptor: Arc<EntityDescriptor>,
    attributes: BTreeMap<String, DatabaseValue>,
    /// Snapshot of the attributes as last loaded or saved.
    original: BTreeMap<String, DatabaseValue>,
    /// Never persisted yet.
    fresh: bool,
    relations: HashMap<String, RelationResult>,
}

impl Entity {
    /// Materialize an entity from a fetched row.
    pub fn from_row(descriptor: Arc<EntityDescriptor>, row: Row) -> Self {
        let attributes: BTreeMap<String, DatabaseValue> = row.into_values().into_iter().collect();
        Self {
            descriptor,
            original: attributes.clone(),
            attributes,
            fresh: false,
            relations: HashMap::new(),
        }
    }

    /// Build a new, unpersisted entity from caller data.
    pub fn make<I, K, V>(descriptor: Arc<EntityDescriptor>, data: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<DatabaseValue>,
    {
        Self {
            descriptor,
            attributes: data
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            original: BTreeMap::new(),
            fresh: true,
            relations: HashMap::new(),
        }
    }

    pub fn descriptor(&self) -> &Arc<EntityDescriptor> {
        &self.descriptor
    }

    pub fn is_fresh(&self) -> bool {
        self.fresh
    }

    /// Read one attribute.
    pub fn get(&self, name: &str) -> Option<&DatabaseValue> {
        self.attributes.get(name)
    }

    /// Read one attribute, cloning it (missing attributes read as null).
    pub fn get_value(&self, name: &str) -> DatabaseValue {
        self.attributes
            .get(name)
            .cloned()
            .unwrap_or(DatabaseValue::Null)
    }

    /// Write one attribute.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<DatabaseValue>) {
        self.attributes.insert(name.into(), value.into());
    }

    pub fn attributes(&self) -> &BTreeMap<String, DatabaseValue> {
        &self.attributes
    }

    /// The identifier value, when present and numeric.
    pub fn identifier(&self) -> Option<i64> {
        match self.attributes.get(self.descriptor.identifier_key())? {
            DatabaseValue::Int(i) => Some(*i),
            DatabaseValue::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn set_identifier(&mut self, id: i64) {
        let key = self.descriptor.identifier_key().to_string();
        self.attributes.insert(key, DatabaseValue::Int(id));
    }

    /// Attributes that differ from the load-time snapshot. A fresh entity is
    /// fully dirty.
    pub fn changes(&self) -> BTreeMap<String, DatabaseValue> {
        if self.fresh {
            return self.attributes.clone();
        }

        self.attributes
            .iter()
            .filter(|(key, value)| self.original.get(*key) != Some(*value))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn is_dirty(&self) -> bool {
        !self.changes().is_empty()
    }

    /// A new statement builder bound to this entity's type.
    pub fn query(&self) -> Query {
        Query::for_entity(self.descriptor.clone())
    }

    /// Persist dirty attributes: INSERT for a fresh entity (capturing the
    /// generated identifier), UPDATE keyed on the identifier otherwise.
    /// A clean entity is a no-op.
    pub async fn save(&mut self, db: &dyn Database) -> OrmResult<()> {
        if !self.is_dirty() {
            return Ok(());
        }

        if self.fresh || self.identifier().is_none() {
            if self.descriptor.timestamps() {
                let now = DatabaseValue::DateTime(chrono::Utc::now());
                self.set("created_at", now.clone());
                self.set("updated_at", now);
            }

            let changes = self.changes();
            let generated = self.query().insert(changes, db).await?;
            if let Some(id) = generated {
                self.set_identifier(id as i64);
            }
            self.fresh = false;
        } else {
            if self.descriptor.timestamps() {
                self.set("updated_at", DatabaseValue::DateTime(chrono::Utc::now()));
            }

            let changes = self.changes();
            let key = self.descriptor.identifier_key().to_string();
            let id = self.get_value(&key);
            self.query()
                .where_eq(&key, id)
                .limit(1)
                .update(changes, db)
                .await?;
        }

        self.original = self.attributes.clone();
        Ok(())
    }

    /// Apply more changes and persist.
    pub async fn update<I, K, V>(&mut self, changes: I, db: &dyn Database) -> OrmResult<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<DatabaseValue>,
    {
        for (key, value) in changes {
            self.set(key, value);
        }
        self.save(db).await
    }

    /// Remove the row. Soft-deleting types get their `deleted_at` stamped
    /// unless `force` is set.
    pub async fn delete(&mut self, force: bool, db: &dyn Database) -> OrmResult<bool> {
        let key = self.descriptor.identifier_key().to_string();
        let id = self.get_value(&key);

        let affected = self
            .query()
            .where_eq(&key, id)
            .limit(1)
            .delete(force, db)
            .await?;
        Ok(affected > 0)
    }

    pub async fn force_delete(&mut self, db: &dyn Database) -> OrmResult<bool> {
        self.delete(true, db).await
    }

    /// Clear the delete timestamp and persist.
    pub async fn restore(&mut self, db: &dyn Database) -> OrmResult<()> {
        self.set("deleted_at", DatabaseValue::Null);
        self.save(db).await
    }

    /// Whether the row carries a delete timestamp.
    pub fn is_deleted(&self) -> bool {
        if !self.descriptor.soft_deletes() {
            return false;
        }
        matches!(self.get("deleted_at"), Some(value) if !value.is_null())
    }

    /// Reload the row from the database, replacing all attributes and
    /// clearing the relation cache. Returns false when the row is gone.
    pub async fn refresh(&mut self, db: &dyn Database) -> OrmResult<bool> {
        let key = self.descriptor.identifier_key().to_string();
        let id = self.get_value(&key);

        let Some(reloaded) = self.query().where_eq(&key, id).first(db).await? else {
            return Ok(false);
        };

        self.attributes = reloaded.attributes;
        self.original = self.attributes.clone();
        self.relations.clear();
        Ok(true)
    }

    /// Read a memoized relation result.
    pub fn relation_cached(&self, name: &str) -> Option<&RelationResult> {
        self.relations.get(name)
    }

    /// Memoize a relation result on this instance.
    pub fn cache_relation(&mut self, name: impl Into<String>, result: RelationResult) {
        self.relations.insert(name.into(), result);
    }
}

// Type-level query helpers. These take the descriptor explicitly; there is
// no ambient connection or registry to fall back on.
impl Entity {
    /// Make and immediately persist an entity.
    pub async fn create<I, K, V>(
        descriptor: Arc<EntityDescriptor>,
        data: I,
        db: &dyn Database,
    ) -> OrmResult<Entity>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<DatabaseValue>,
    {
        let mut entity = Entity::make(descriptor, data);
        entity.save(db).await?;
        Ok(entity)
    }

    /// Look an entity up by identifier.
    pub async fn find(
        descriptor: Arc<EntityDescriptor>,
        id: impl Into<DatabaseValue>,
        db: &dyn Database,
    ) -> OrmResult<Option<Entity>> {
        let key = descriptor.identifier_key().to_string();
        Query::for_entity(descriptor)
            .where_eq(&key, id)
            .first(db)
            .await
    }

    /// Look an entity up by identifier or fail with [`crate::OrmError::NotFound`].
    pub async fn find_or_fail(
        descriptor: Arc<EntityDescriptor>,
        id: impl Into<DatabaseValue>,
        db: &dyn Database,
    ) -> OrmResult<Entity> {
        let key = descriptor.identifier_key().to_string();
        Query::for_entity(descriptor)
            .where_eq(&key, id)
            .first_or_fail(db)
            .await
    }

    /// Fetch every row of the type. Execution failures read as an empty set.
    pub async fn all(
        descriptor: Arc<EntityDescriptor>,
        db: &dyn Database,
    ) -> OrmResult<Vec<Entity>> {
        match Query::for_entity(descriptor).get_models(db).await {
            Ok(entities) => Ok(entities),
            Err(err) if err.is_execution() => {
                warn!(error = %err, "suppressing execution failure in all()");
                Ok(Vec::new())
            }
            Err(err) => Err(err),
        }
    }

    /// Find the first entity matching the search pairs, or make (without
    /// saving) a new one from search + create data.
    pub async fn first_or_new(
        descriptor: Arc<EntityDescriptor>,
        search: Vec<(String, DatabaseValue)>,
        create: Vec<(String, DatabaseValue)>,
        db: &dyn Database,
    ) -> OrmResult<Entity> {
        let triples = search
            .iter()
            .map(|(k, v)| (k.clone(), CompareOp::Eq, v.clone()));

        if let Some(found) = Query::for_entity(descriptor.clone())
            .where_all(triples)
            .first(db)
            .await?
        {
            return Ok(found);
        }

        Ok(Entity::make(
            descriptor,
            search.into_iter().chain(create),
        ))
    }

    /// Find the first entity matching the search pairs, or create and save
    /// one.
    pub async fn first_or_create(
        descriptor: Arc<EntityDescriptor>,
        search: Vec<(String, DatabaseValue)>,
        create: Vec<(String, DatabaseValue)>,
        db: &dyn Database,
    ) -> OrmResult<Entity> {
        let mut entity = Self::first_or_new(descriptor, search, create, db).await?;
        if entity.is_fresh() {
            entity.save(db).await?;
        }
        Ok(entity)
    }

    /// Update every row matching the search pairs, or create one when none
    /// match. Returns the new entity when one was created, `None` when
    /// existing rows were updated.
    pub async fn update_or_create(
        descriptor: Arc<EntityDescriptor>,
        search: Vec<(String, DatabaseValue)>,
        update: Vec<(String, DatabaseValue)>,
        db: &dyn Database,
    ) -> OrmResult<Option<Entity>> {
        let triples = search
            .iter()
            .map(|(k, v)| (k.clone(), CompareOp::Eq, v.clone()));

        let matching = Query::for_entity(descriptor.clone())
            .where_all(triples.clone())
            .count(db)
            .await?;

        if matching == 0 {
            let entity = Self::create(
                descriptor,
                search.into_iter().chain(update),
                db,
            )
            .await?;
            return Ok(Some(entity));
        }

        Query::for_entity(descriptor)
            .where_all(triples)
            .update(update, db)
            .await?;
        Ok(None)
    }

    /// Delete rows by identifier.
    pub async fn destroy(
        descriptor: Arc<EntityDescriptor>,
        ids: &[i64],
        db: &dyn Database,
    ) -> OrmResult<u64> {
        let key = descriptor.identifier_key().to_string();
        Query::for_entity(descriptor)
            .where_in(&key, ids.iter().copied())
            .delete(false, db)
            .await
    }
}
