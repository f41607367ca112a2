//! Relation resolvers
//!
//! Each relation kind is a small strategy type that owns a statement builder
//! scoped to the related entity type. Constructing a relation applies its
//! defining predicates immediately; nothing is fetched until the relation is
//! read through [`Relation::load`]. The relations that need a database round
//! trip to compute their predicates (the through and many-to-many kinds)
//! have async constructors.
//!
//! Results can be memoized per parent instance via
//! [`Entity::cache_relation`](crate::model::Entity::cache_relation);
//! refreshing the parent clears the cache.

pub mod belongs_to;
pub mod belongs_to_many;
pub mod has_many;
pub mod has_one;
pub mod morph_many;
pub mod morph_one;
pub mod morph_to;
pub mod morph_to_many;
pub mod morphed_by_many;
pub mod through;
pub mod traits;

pub use belongs_to::BelongsTo;
pub use belongs_to_many::BelongsToMany;
pub use has_many::HasMany;
pub use has_one::HasOne;
pub use morph_many::MorphMany;
pub use morph_one::MorphOne;
pub use morph_to::MorphTo;
pub use morph_to_many::MorphToMany;
pub use morphed_by_many::MorphedByMany;
pub use through::{HasManyThrough, HasOneThrough};
pub use traits::{Associatable, Attachable, Relation, Savable};

use crate::model::Entity;
use crate::value::{DatabaseValue, Row};

/// A loaded relation, reduced to the relation's cardinality.
#[derive(Debug, Clone, PartialEq)]
pub enum RelationResult {
    One(Option<Entity>),
    Many(Vec<Entity>),
}

impl RelationResult {
    /// The singular entity, when this is a singular result.
    pub fn one(&self) -> Option<&Entity> {
        match self {
            RelationResult::One(entity) => entity.as_ref(),
            RelationResult::Many(_) => None,
        }
    }

    /// The entity list. A singular result reads as a zero-or-one element
    /// slice.
    pub fn many(&self) -> &[Entity] {
        match self {
            RelationResult::One(Some(entity)) => std::slice::from_ref(entity),
            RelationResult::One(None) => &[],
            RelationResult::Many(entities) => entities,
        }
    }
}

/// Extract an integer id column from a set of intermediate-table rows.
/// Backends that hand numeric columns back as strings still pluck cleanly.
pub(crate) fn pluck_ids(rows: &[Row], column: &str) -> Vec<i64> {
    rows.iter()
        .filter_map(|row| match row.get(column) {
            Some(DatabaseValue::Int(id)) => Some(*id),
            Some(DatabaseValue::String(s)) => s.parse().ok(),
            _ => None,
        })
        .collect()
}

/// The column the morph discriminator type name lives in.
pub(crate) fn morph_type_column(morph_key: &str) -> String {
    format!("{}_type", morph_key)
}

/// The column the morphed identifier lives in.
pub(crate) fn morph_id_column(morph_key: &str) -> String {
    format!("{}_id", morph_key)
}
