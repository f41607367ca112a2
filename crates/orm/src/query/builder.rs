//! The statement builder
//!
//! `Query` accumulates configuration through a consuming fluent API and
//! compiles to parameterized SQL on demand. One builder serves one logical
//! statement; `Clone` is a deep copy, so a cloned builder can be mutated
//! freely without affecting the original (pagination relies on this for its
//! count pre-flight).

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::model::EntityDescriptor;
use crate::query::types::{
    OrderBy, OrderDirection, QueryAction, SelectColumn, SoftDeleteMode,
};
use crate::query::where_clause::{WhereNode, WhereStatement};
use crate::value::DatabaseValue;

/// Fluent SQL statement builder.
#[derive(Debug, Clone)]
pub struct Query {
    pub(crate) table: String,
    pub(crate) descriptor: Option<Arc<EntityDescriptor>>,
    pub(crate) action: QueryAction,
    pub(crate) columns: Vec<SelectColumn>,
    /// Column/value pairs pending for INSERT or UPDATE. A BTreeMap keeps the
    /// emitted column order deterministic.
    pub(crate) write_data: BTreeMap<String, DatabaseValue>,
    pub(crate) wheres: Vec<WhereNode>,
    pub(crate) group_depth: u32,
    pub(crate) order: Vec<OrderBy>,
    pub(crate) group: Vec<String>,
    pub(crate) having: Option<WhereStatement>,
    pub(crate) limit: Option<u64>,
    pub(crate) offset: u64,
    pub(crate) soft_delete_mode: SoftDeleteMode,
}

impl Query {
    /// Build a statement against a bare table, with no entity binding.
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            descriptor: None,
            action: QueryAction::Select,
            columns: Vec::new(),
            write_data: BTreeMap::new(),
            wheres: Vec::new(),
            group_depth: 0,
            order: Vec::new(),
            group: Vec::new(),
            having: None,
            limit: None,
            offset: 0,
            soft_delete_mode: SoftDeleteMode::default(),
        }
    }

    /// Build a statement bound to an entity type. The descriptor supplies the
    /// table name and drives soft-delete handling and entity materialization.
    pub fn for_entity(descriptor: Arc<EntityDescriptor>) -> Self {
        let mut query = Self::table(descriptor.table());
        query.descriptor = Some(descriptor);
        query
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    pub fn descriptor(&self) -> Option<&Arc<EntityDescriptor>> {
        self.descriptor.as_ref()
    }

    /// Configure as a SELECT and replace the column list.
    pub fn select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.action = QueryAction::Select;
        self.columns = columns
            .into_iter()
            .map(|c| {
                let c = c.into();
                if c == "*" {
                    SelectColumn::All
                } else {
                    SelectColumn::Column(c)
                }
            })
            .collect();
        self
    }

    /// Append a raw select fragment, passed through unescaped.
    pub fn select_raw(mut self, fragment: impl Into<String>) -> Self {
        self.columns.push(SelectColumn::Raw(fragment.into()));
        self
    }

    /// Append a scalar sub-select column, rendered as `(SELECT ...) AS alias`.
    /// The inner statement's bindings merge into this statement's binding
    /// list.
    pub fn add_select(mut self, query: Query, alias: impl Into<String>) -> Self {
        self.columns.push(SelectColumn::SubSelect {
            alias: alias.into(),
            query: Box::new(query),
        });
        self
    }

    /// Cap the number of returned (or, for mutations, affected) rows.
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Remove a previously set limit.
    pub fn unlimited(mut self) -> Self {
        self.limit = None;
        self
    }

    /// Set the row offset. Only emitted for SELECT statements.
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    pub(crate) fn set_offset(&mut self, offset: u64) {
        self.offset = offset;
    }

    /// Append an ascending ORDER BY entry.
    pub fn order(mut self, column: impl Into<String>) -> Self {
        self.order.push(OrderBy {
            column: column.into(),
            direction: OrderDirection::Asc,
        });
        self
    }

    /// Append a descending ORDER BY entry.
    pub fn order_desc(mut self, column: impl Into<String>) -> Self {
        self.order.push(OrderBy {
            column: column.into(),
            direction: OrderDirection::Desc,
        });
        self
    }

    /// Newest rows first, by `created_at` or a caller-supplied column.
    pub fn latest(self, column: Option<&str>) -> Self {
        self.order_desc(column.unwrap_or("created_at"))
    }

    /// Oldest rows first, by `created_at` or a caller-supplied column.
    pub fn oldest(self, column: Option<&str>) -> Self {
        self.order(column.unwrap_or("created_at"))
    }

    /// Drop all previously configured ordering.
    pub fn reorder(mut self) -> Self {
        self.order.clear();
        self
    }

    /// Append GROUP BY columns.
    pub fn group<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group.extend(columns.into_iter().map(Into::into));
        self
    }

    /// Set the HAVING predicate. Only emitted when a GROUP BY exists.
    pub fn having(
        mut self,
        column: &str,
        operator: crate::query::types::CompareOp,
        value: impl Into<DatabaseValue>,
    ) -> Self {
        self.having = Some(WhereStatement::and(
            format!(
                "{} {} ?",
                crate::query::types::quote_ident(column),
                operator
            ),
            vec![value.into()],
        ));
        self
    }

    /// Include soft-deleted rows instead of filtering them out.
    pub fn with_deleted(mut self) -> Self {
        self.soft_delete_mode = SoftDeleteMode::IncludeDeleted;
        self
    }

    /// Only match soft-deleted rows.
    pub fn only_deleted(mut self) -> Self {
        self.soft_delete_mode = SoftDeleteMode::OnlyDeleted;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::types::CompareOp;

    #[test]
    fn test_clone_is_independent() {
        let original = Query::table("users").where_eq("id", 1);
        let (sql_before, _) = original.generate_query().unwrap();

        let _mutated = original.clone().where_eq("active", true).limit(5);

        let (sql_after, _) = original.generate_query().unwrap();
        assert_eq!(sql_before, sql_after);
    }

    #[test]
    fn test_reorder_clears_ordering() {
        let query = Query::table("users")
            .order("name")
            .order_desc("id")
            .reorder();
        let (sql, _) = query.generate_query().unwrap();

        assert!(!sql.contains("ORDER BY"));
    }

    #[test]
    fn test_latest_orders_descending() {
        let (sql, _) = Query::table("posts").latest(None).generate_query().unwrap();
        assert!(sql.contains("ORDER BY `created_at` DESC"));

        let (sql, _) = Query::table("posts").oldest(None).generate_query().unwrap();
        assert!(sql.contains("ORDER BY `created_at` ASC"));
    }

    #[test]
    fn test_having_requires_group() {
        let (sql, bindings) = Query::table("orders")
            .having("total", CompareOp::Gt, 100)
            .generate_query()
            .unwrap();

        // No GROUP BY configured, so the HAVING must not leak into the SQL.
        assert!(!sql.contains("HAVING"));
        assert!(bindings.is_empty());

        let (sql, bindings) = Query::table("orders")
            .group(["customer_id"])
            .having("total", CompareOp::Gt, 100)
            .generate_query()
            .unwrap();

        assert!(sql.contains("GROUP BY `customer_id` HAVING `total` > ?"));
        assert_eq!(bindings, vec![DatabaseValue::Int(100)]);
    }
}
