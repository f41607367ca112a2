//! Polymorphic child-to-owner relation

use std::sync::Arc;

use crate::error::{OrmError, OrmResult};
use crate::model::{Entity, EntityDescriptor, EntityRegistry};
use crate::query::Query;
use crate::relations::traits::{Associatable, Relation};
use crate::relations::{morph_id_column, morph_type_column};
use crate::value::DatabaseValue;

/// The polymorphic inverse: the parent stores both the related type name
/// (in `{morph_key}_type`) and the related identifier (in `{morph_key}_id`).
/// The type name is resolved to a descriptor through the registry, never
/// from a raw runtime string.
#[derive(Debug)]
pub struct MorphTo {
    query: Query,
    related: Arc<EntityDescriptor>,
    morph_key: String,
}

impl MorphTo {
    /// Resolve the related type from the parent's discriminator column and
    /// scope to the stored identifier.
    pub fn new(parent: &Entity, morph_key: &str, registry: &EntityRegistry) -> OrmResult<Self> {
        let type_column = morph_type_column(morph_key);
        let type_value = parent.get_value(&type_column);
        let type_name = type_value.as_str().ok_or_else(|| {
            OrmError::Configuration(format!(
                "Column '{}' does not hold an entity type name",
                type_column
            ))
        })?;

        let related = registry.get(type_name)?;
        let query = Query::for_entity(related.clone()).where_eq(
            related.identifier_key(),
            parent.get_value(&morph_id_column(morph_key)),
        );

        Ok(Self {
            query,
            related,
            morph_key: morph_key.to_string(),
        })
    }
}

impl Relation for MorphTo {
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

impl Associatable for MorphTo {
    /// Point the parent's discriminator columns at the related entity.
    fn associate(&self, parent: &mut Entity, related: &mut Entity) {
        parent.set(
            morph_type_column(&self.morph_key),
            related.descriptor().name(),
        );
        parent.set(
            morph_id_column(&self.morph_key),
            related.get_value(related.descriptor().identifier_key()),
        );
    }

    fn dissociate(&self, parent: &mut Entity, _related: Option<&mut Entity>) -> bool {
        parent.set(morph_type_column(&self.morph_key), DatabaseValue::Null);
        parent.set(morph_id_column(&self.morph_key), DatabaseValue::Null);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Row;

    fn comments() -> Arc<EntityDescriptor> {
        Arc::new(EntityDescriptor::new("Comment", "comments"))
    }

    fn posts() -> Arc<EntityDescriptor> {
        Arc::new(EntityDescriptor::new("Post", "posts"))
    }

    fn registry() -> EntityRegistry {
        let mut registry = EntityRegistry::new();
        registry.register(posts());
        registry
    }

    fn comment_on_post(post_id: i64) -> Entity {
        let mut row = Row::new();
        row.insert("id", 5i64);
        row.insert("commentable_type", "Post");
        row.insert("commentable_id", post_id);
        Entity::from_row(comments(), row)
    }

    #[test]
    fn test_resolves_type_through_registry() {
        let relation = MorphTo::new(&comment_on_post(9), "commentable", &registry()).unwrap();

        assert_eq!(relation.related().name(), "Post");
        let (sql, bindings) = relation.query().generate_query().unwrap();
        assert_eq!(sql, "SELECT * FROM `posts` WHERE `id` = ?");
        assert_eq!(bindings, vec![DatabaseValue::Int(9)]);
    }

    #[test]
    fn test_unregistered_type_is_a_configuration_error() {
        let mut row = Row::new();
        row.insert("commentable_type", "Video");
        row.insert("commentable_id", 9i64);
        let comment = Entity::from_row(comments(), row);

        let err = MorphTo::new(&comment, "commentable", &registry()).unwrap_err();
        assert!(matches!(err, OrmError::Configuration(_)));
    }

    #[test]
    fn test_missing_discriminator_is_a_configuration_error() {
        let comment = Entity::from_row(comments(), Row::from_pairs([("id", 5i64)]));

        let err = MorphTo::new(&comment, "commentable", &registry()).unwrap_err();
        assert!(matches!(err, OrmError::Configuration(_)));
    }

    #[test]
    fn test_associate_writes_both_discriminator_columns() {
        let relation = MorphTo::new(&comment_on_post(9), "commentable", &registry()).unwrap();

        let mut comment = comment_on_post(9);
        let mut post = Entity::from_row(posts(), Row::from_pairs([("id", 33i64)]));
        relation.associate(&mut comment, &mut post);

        assert_eq!(
            comment.get("commentable_type"),
            Some(&DatabaseValue::String("Post".into()))
        );
        assert_eq!(comment.get("commentable_id"), Some(&DatabaseValue::Int(33)));
    }

    #[test]
    fn test_dissociate_nulls_both_columns() {
        let relation = MorphTo::new(&comment_on_post(9), "commentable", &registry()).unwrap();

        let mut comment = comment_on_post(9);
        assert!(relation.dissociate(&mut comment, None));
        assert_eq!(comment.get("commentable_type"), Some(&DatabaseValue::Null));
        assert_eq!(comment.get("commentable_id"), Some(&DatabaseValue::Null));
    }
}
