//! Predicate tree construction
//!
//! WHERE conditions are stored as a flat, ordered node sequence. Statements
//! carry a pre-rendered fragment plus bindings and their connector; group
//! boundary nodes record depth transitions and bracket a contiguous run in
//! parentheses. Emission order is the append order, so the node sequence is
//! the single source of truth for how the clause reads.

use crate::query::builder::Query;
use crate::query::types::{quote_ident, CompareOp, Connector};
use crate::value::DatabaseValue;

/// One atomic predicate: a rendered SQL fragment, its bindings, and the
/// connector joining it to the preceding predicate in the same scope.
#[derive(Debug, Clone, PartialEq)]
pub struct WhereStatement {
    pub(crate) fragment: String,
    pub(crate) bindings: Vec<DatabaseValue>,
    pub(crate) connector: Connector,
}

impl WhereStatement {
    pub(crate) fn new(
        fragment: impl Into<String>,
        bindings: Vec<DatabaseValue>,
        connector: Connector,
    ) -> Self {
        Self {
            fragment: fragment.into(),
            bindings,
            connector,
        }
    }

    pub(crate) fn and(fragment: impl Into<String>, bindings: Vec<DatabaseValue>) -> Self {
        Self::new(fragment, bindings, Connector::And)
    }
}

/// A depth transition in the predicate sequence. The connector is only read
/// when the transition opens a group.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupChange {
    pub(crate) depth: u32,
    pub(crate) connector: Connector,
}

/// A sub-query predicate: a rendered prefix (column(s) + operator) plus the
/// inner statement, compiled inline in parentheses.
#[derive(Debug, Clone)]
pub struct SubQueryNode {
    pub(crate) prefix: WhereStatement,
    pub(crate) query: Box<Query>,
}

/// One node in the predicate sequence.
#[derive(Debug, Clone)]
pub enum WhereNode {
    Statement(WhereStatement),
    Group(GroupChange),
    SubQuery(SubQueryNode),
}

impl Query {
    pub(crate) fn push_where(&mut self, statement: WhereStatement) {
        self.wheres.push(WhereNode::Statement(statement));
    }

    fn comparison(
        mut self,
        column: &str,
        operator: CompareOp,
        value: DatabaseValue,
        connector: Connector,
    ) -> Self {
        self.push_where(WhereStatement::new(
            format!("{} {} ?", quote_ident(column), operator),
            vec![value],
            connector,
        ));
        self
    }

    /// `column = value`, AND-joined.
    pub fn where_eq(self, column: &str, value: impl Into<DatabaseValue>) -> Self {
        self.comparison(column, CompareOp::Eq, value.into(), Connector::And)
    }

    /// `column = value`, OR-joined.
    pub fn or_where_eq(self, column: &str, value: impl Into<DatabaseValue>) -> Self {
        self.comparison(column, CompareOp::Eq, value.into(), Connector::Or)
    }

    /// An arbitrary comparison, AND-joined.
    pub fn where_cmp(
        self,
        column: &str,
        operator: CompareOp,
        value: impl Into<DatabaseValue>,
    ) -> Self {
        self.comparison(column, operator, value.into(), Connector::And)
    }

    /// An arbitrary comparison, OR-joined.
    pub fn or_where_cmp(
        self,
        column: &str,
        operator: CompareOp,
        value: impl Into<DatabaseValue>,
    ) -> Self {
        self.comparison(column, operator, value.into(), Connector::Or)
    }

    fn grouped(mut self, connector: Connector, f: impl FnOnce(Self) -> Self) -> Self {
        self.group_depth += 1;
        let opened_at = self.wheres.len();
        self.wheres.push(WhereNode::Group(GroupChange {
            depth: self.group_depth,
            connector,
        }));

        let mut query = f(self);

        query.group_depth -= 1;
        if query.wheres.len() == opened_at + 1 {
            // The closure added nothing. Drop the open marker so the clause
            // never contains an empty `( )`.
            query.wheres.pop();
            return query;
        }
        let depth = query.group_depth;
        query.wheres.push(WhereNode::Group(GroupChange {
            depth,
            connector: Connector::And,
        }));
        query
    }

    /// Open a parenthesized group, AND-joined to the preceding predicate.
    /// The closure receives the builder to fill in the group's contents; a
    /// group left empty is dropped.
    pub fn where_group(self, f: impl FnOnce(Self) -> Self) -> Self {
        self.grouped(Connector::And, f)
    }

    /// Open a parenthesized group, OR-joined to the preceding predicate.
    pub fn or_where_group(self, f: impl FnOnce(Self) -> Self) -> Self {
        self.grouped(Connector::Or, f)
    }

    fn all_of<I, K, V>(self, predicates: I, connector: Connector) -> Self
    where
        I: IntoIterator<Item = (K, CompareOp, V)>,
        K: AsRef<str>,
        V: Into<DatabaseValue>,
    {
        self.grouped(connector, |mut query| {
            for (column, operator, value) in predicates {
                query.push_where(WhereStatement::new(
                    format!("{} {} ?", quote_ident(column.as_ref()), operator),
                    vec![value.into()],
                    connector,
                ));
            }
            query
        })
    }

    /// Group a batch of comparison triples in parentheses, joined with AND.
    pub fn where_all<I, K, V>(self, predicates: I) -> Self
    where
        I: IntoIterator<Item = (K, CompareOp, V)>,
        K: AsRef<str>,
        V: Into<DatabaseValue>,
    {
        self.all_of(predicates, Connector::And)
    }

    /// Group a batch of comparison triples in parentheses, joined with OR
    /// (both inside the group and towards the preceding predicate).
    pub fn or_where_all<I, K, V>(self, predicates: I) -> Self
    where
        I: IntoIterator<Item = (K, CompareOp, V)>,
        K: AsRef<str>,
        V: Into<DatabaseValue>,
    {
        self.all_of(predicates, Connector::Or)
    }

    fn null_check(mut self, column: &str, negated: bool, connector: Connector) -> Self {
        let check = if negated { "IS NOT NULL" } else { "IS NULL" };
        self.push_where(WhereStatement::new(
            format!("{} {}", quote_ident(column), check),
            Vec::new(),
            connector,
        ));
        self
    }

    pub fn where_null(self, column: &str) -> Self {
        self.null_check(column, false, Connector::And)
    }

    pub fn where_not_null(self, column: &str) -> Self {
        self.null_check(column, true, Connector::And)
    }

    pub fn or_where_null(self, column: &str) -> Self {
        self.null_check(column, false, Connector::Or)
    }

    pub fn or_where_not_null(self, column: &str) -> Self {
        self.null_check(column, true, Connector::Or)
    }

    fn membership(
        mut self,
        column: &str,
        values: Vec<DatabaseValue>,
        negated: bool,
        connector: Connector,
    ) -> Self {
        if values.is_empty() {
            // `IN ()` is invalid SQL. An empty IN can never match and an
            // empty NOT IN always matches, so emit the literal truth value.
            let literal = if negated { "TRUE" } else { "FALSE" };
            self.push_where(WhereStatement::new(literal, Vec::new(), connector));
            return self;
        }

        let placeholders = vec!["?"; values.len()].join(",");
        let keyword = if negated { "NOT IN" } else { "IN" };
        self.push_where(WhereStatement::new(
            format!("{} {} ({})", quote_ident(column), keyword, placeholders),
            values,
            connector,
        ));
        self
    }

    /// `column IN (values)`, AND-joined. An empty list compiles to `FALSE`.
    pub fn where_in<I, V>(self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<DatabaseValue>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.membership(column, values, false, Connector::And)
    }

    /// `column NOT IN (values)`, AND-joined. An empty list compiles to
    /// `TRUE`.
    pub fn where_not_in<I, V>(self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<DatabaseValue>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.membership(column, values, true, Connector::And)
    }

    pub fn or_where_in<I, V>(self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<DatabaseValue>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.membership(column, values, false, Connector::Or)
    }

    pub fn or_where_not_in<I, V>(self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<DatabaseValue>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.membership(column, values, true, Connector::Or)
    }

    fn between(
        mut self,
        column: &str,
        low: DatabaseValue,
        high: DatabaseValue,
        negated: bool,
        connector: Connector,
    ) -> Self {
        let keyword = if negated { "NOT BETWEEN" } else { "BETWEEN" };
        self.push_where(WhereStatement::new(
            format!("{} {} ? AND ?", quote_ident(column), keyword),
            vec![low, high],
            connector,
        ));
        self
    }

    pub fn where_between(
        self,
        column: &str,
        low: impl Into<DatabaseValue>,
        high: impl Into<DatabaseValue>,
    ) -> Self {
        self.between(column, low.into(), high.into(), false, Connector::And)
    }

    pub fn where_not_between(
        self,
        column: &str,
        low: impl Into<DatabaseValue>,
        high: impl Into<DatabaseValue>,
    ) -> Self {
        self.between(column, low.into(), high.into(), true, Connector::And)
    }

    pub fn or_where_between(
        self,
        column: &str,
        low: impl Into<DatabaseValue>,
        high: impl Into<DatabaseValue>,
    ) -> Self {
        self.between(column, low.into(), high.into(), false, Connector::Or)
    }

    pub fn or_where_not_between(
        self,
        column: &str,
        low: impl Into<DatabaseValue>,
        high: impl Into<DatabaseValue>,
    ) -> Self {
        self.between(column, low.into(), high.into(), true, Connector::Or)
    }

    fn column_compare(
        mut self,
        left: &str,
        operator: CompareOp,
        right: &str,
        connector: Connector,
    ) -> Self {
        self.push_where(WhereStatement::new(
            format!("{} {} {}", quote_ident(left), operator, quote_ident(right)),
            Vec::new(),
            connector,
        ));
        self
    }

    /// Compare two columns to each other, AND-joined.
    pub fn where_column(self, left: &str, operator: CompareOp, right: &str) -> Self {
        self.column_compare(left, operator, right, Connector::And)
    }

    /// Compare two columns to each other, OR-joined.
    pub fn or_where_column(self, left: &str, operator: CompareOp, right: &str) -> Self {
        self.column_compare(left, operator, right, Connector::Or)
    }

    /// Append a raw WHERE fragment. The fragment is emitted unescaped;
    /// callers own its injection safety. Use `?` placeholders for values.
    pub fn where_raw(mut self, fragment: impl Into<String>, bindings: Vec<DatabaseValue>) -> Self {
        self.push_where(WhereStatement::and(fragment, bindings));
        self
    }

    /// OR-joined variant of [`Query::where_raw`].
    pub fn or_where_raw(
        mut self,
        fragment: impl Into<String>,
        bindings: Vec<DatabaseValue>,
    ) -> Self {
        self.push_where(WhereStatement::new(fragment, bindings, Connector::Or));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_where_in_placeholder_count() {
        let (sql, bindings) = Query::table("users")
            .where_in("id", [1, 2, 3])
            .generate_query()
            .unwrap();

        assert!(sql.contains("`id` IN (?,?,?)"));
        assert_eq!(
            bindings,
            vec![
                DatabaseValue::Int(1),
                DatabaseValue::Int(2),
                DatabaseValue::Int(3)
            ]
        );
    }

    #[test]
    fn test_empty_in_literalizes() {
        let (sql, bindings) = Query::table("users")
            .where_in("id", Vec::<i64>::new())
            .generate_query()
            .unwrap();
        assert!(sql.ends_with("WHERE FALSE"));
        assert!(bindings.is_empty());

        let (sql, bindings) = Query::table("users")
            .where_not_in("id", Vec::<i64>::new())
            .generate_query()
            .unwrap();
        assert!(sql.ends_with("WHERE TRUE"));
        assert!(bindings.is_empty());
    }

    #[test]
    fn test_between_binds_both_bounds() {
        let (sql, bindings) = Query::table("events")
            .where_between("day", 5, 9)
            .generate_query()
            .unwrap();

        assert!(sql.contains("`day` BETWEEN ? AND ?"));
        assert_eq!(bindings, vec![DatabaseValue::Int(5), DatabaseValue::Int(9)]);
    }

    #[test]
    fn test_column_compare_has_no_bindings() {
        let (sql, bindings) = Query::table("orders")
            .where_column("updated_at", CompareOp::Gt, "created_at")
            .generate_query()
            .unwrap();

        assert!(sql.contains("`updated_at` > `created_at`"));
        assert!(bindings.is_empty());
    }

    #[test]
    fn test_raw_fragment_passes_through() {
        let (sql, bindings) = Query::table("users")
            .where_raw("LOWER(`email`) = ?", vec!["a@b.c".into()])
            .generate_query()
            .unwrap();

        assert!(sql.contains("LOWER(`email`) = ?"));
        assert_eq!(bindings, vec![DatabaseValue::String("a@b.c".into())]);
    }
}
