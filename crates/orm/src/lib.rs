//! # groundwork-orm: Database layer for the Groundwork framework
//!
//! A fluent, consuming SQL statement builder with an ordered predicate tree,
//! sub-query support, soft-delete handling and pagination, plus
//! ActiveRecord-style entities and the full family of relation resolvers
//! (one-to-one through polymorphic many-to-many).
//!
//! Statements compile to backtick-quoted SQL with `?` positional
//! placeholders and execute through the [`Database`] trait; the bundled
//! MySQL backend is sqlx-based, and a scriptable mock backend backs the test
//! suite.

pub mod backends;
pub mod error;
pub mod model;
pub mod query;
pub mod relations;
pub mod value;

// Re-export the core surface
pub use backends::{Database, ExecuteResult, MockDatabase, MySqlBackend, PoolConfig};
pub use error::{OrmError, OrmResult};
pub use model::{Entity, EntityDescriptor, EntityRegistry};
pub use query::{
    CompareOp, Connector, OrderBy, OrderDirection, PageResult, Paginator, Query, QueryAction,
    SoftDeleteMode,
};
pub use relations::{
    Associatable, Attachable, BelongsTo, BelongsToMany, HasMany, HasManyThrough, HasOne,
    HasOneThrough, MorphMany, MorphOne, MorphTo, MorphToMany, MorphedByMany, Relation,
    RelationResult, Savable,
};
pub use value::{DatabaseValue, Row};
