//! Statement builder and friends
//!
//! The fluent [`Query`] builder, its predicate tree, sub-query support, SQL
//! compilation, terminal execution methods, and pagination.

pub mod builder;
pub mod execution;
pub mod pagination;
pub mod sql_generation;
pub mod subquery;
pub mod types;
pub mod where_clause;

pub use builder::Query;
pub use pagination::{PageResult, Paginator, UrlHandler};
pub use types::{
    CompareOp, Connector, OrderBy, OrderDirection, QueryAction, SelectColumn, SoftDeleteMode,
};
