//! Entity-type descriptors and the type registry
//!
//! A descriptor is the static metadata for one entity type: its name (which
//! doubles as the morph discriminator value stored in `*_type` columns), the
//! backing table, the identifier key, and the soft-delete/timestamp flags.
//! Descriptors are shared as `Arc` and never mutated after construction.
//!
//! The registry maps type names back to descriptors. Polymorphic relations
//! consult it to resolve the type stored in a discriminator column; types
//! are registered explicitly, never conjured from a runtime string.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{OrmError, OrmResult};

/// Static metadata for one entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDescriptor {
    name: String,
    table: String,
    identifier_key: String,
    soft_deletes: bool,
    timestamps: bool,
}

impl EntityDescriptor {
    /// Create a descriptor. Timestamps default to on, soft deletes to off,
    /// and the identifier key to `id`.
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            identifier_key: "id".to_string(),
            soft_deletes: false,
            timestamps: true,
        }
    }

    pub fn with_identifier_key(mut self, key: impl Into<String>) -> Self {
        self.identifier_key = key.into();
        self
    }

    pub fn with_soft_deletes(mut self) -> Self {
        self.soft_deletes = true;
        self
    }

    pub fn with_timestamps(mut self) -> Self {
        self.timestamps = true;
        self
    }

    pub fn without_timestamps(mut self) -> Self {
        self.timestamps = false;
        self
    }

    /// The entity type name, also used as the morph discriminator value.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn identifier_key(&self) -> &str {
        &self.identifier_key
    }

    pub fn soft_deletes(&self) -> bool {
        self.soft_deletes
    }

    pub fn timestamps(&self) -> bool {
        self.timestamps
    }
}

/// Name-keyed descriptor registry for polymorphic type resolution.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    descriptors: HashMap<String, Arc<EntityDescriptor>>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor under its type name. Re-registering a name
    /// replaces the previous entry.
    pub fn register(&mut self, descriptor: Arc<EntityDescriptor>) {
        self.descriptors
            .insert(descriptor.name().to_string(), descriptor);
    }

    /// Look a descriptor up by type name.
    pub fn get(&self, name: &str) -> OrmResult<Arc<EntityDescriptor>> {
        self.descriptors.get(name).cloned().ok_or_else(|| {
            OrmError::Configuration(format!("Entity type '{}' is not registered", name))
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.descriptors.contains_key(name)
    }
}
