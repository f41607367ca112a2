//! Sub-query predicates
//!
//! A sub-query predicate compares zero, one, or several columns against a
//! nested statement. Which operators are legal depends on that column arity;
//! an operator outside the whitelist is rejected when the predicate is built,
//! never deferred to the database.

use crate::error::{OrmError, OrmResult};
use crate::query::builder::Query;
use crate::query::types::{quote_ident, Connector};
use crate::query::where_clause::{SubQueryNode, WhereNode, WhereStatement};

const SINGLE_COLUMN_OPERATORS: &[&str] = &[
    "=", ">", ">=", "<", "<=", "!=", "<>", "<=>",
    "= ALL", "<> ALL", "= ANY", "<> ANY", "= SOME", "<> SOME",
    "IN", "NOT IN",
];

const MULTI_COLUMN_OPERATORS: &[&str] = &["=", ">", ">=", "<", "<=", "!=", "<>", "<=>"];

const NO_COLUMN_OPERATORS: &[&str] = &["EXISTS", "NOT EXISTS"];

fn validate_operator(operator: &str, allowed: &[&str]) -> OrmResult<()> {
    if allowed.contains(&operator) {
        Ok(())
    } else {
        Err(OrmError::Configuration(format!(
            "Operator '{}' is not valid for a sub-query with this column arity",
            operator
        )))
    }
}

impl Query {
    fn push_sub_query(&mut self, prefix: WhereStatement, query: Query) {
        self.wheres.push(WhereNode::SubQuery(SubQueryNode {
            prefix,
            query: Box::new(query),
        }));
    }

    /// Add a sub-query predicate with an arbitrary operator, validated
    /// against the whitelist for the given column count: zero columns allow
    /// `EXISTS`/`NOT EXISTS`, one column allows comparisons, quantified forms
    /// and `IN`/`NOT IN`, several columns allow comparisons only.
    pub fn sub_query(
        mut self,
        columns: &[&str],
        operator: &str,
        query: Query,
        connector: Connector,
    ) -> OrmResult<Self> {
        let prefix = match columns {
            [] => {
                validate_operator(operator, NO_COLUMN_OPERATORS)?;
                operator.to_string()
            }
            [column] => {
                validate_operator(operator, SINGLE_COLUMN_OPERATORS)?;
                format!("{} {}", quote_ident(column), operator)
            }
            many => {
                validate_operator(operator, MULTI_COLUMN_OPERATORS)?;
                let list = many
                    .iter()
                    .map(|c| quote_ident(c))
                    .collect::<Vec<_>>()
                    .join(",");
                format!("({}) {}", list, operator)
            }
        };

        self.push_sub_query(WhereStatement::new(prefix, Vec::new(), connector), query);
        Ok(self)
    }

    fn known_sub_query(
        mut self,
        column: &str,
        operator: &str,
        query: Query,
        connector: Connector,
    ) -> Self {
        let prefix = format!("{} {}", quote_ident(column), operator);
        self.push_sub_query(WhereStatement::new(prefix, Vec::new(), connector), query);
        self
    }

    /// `column IN (sub-query)`, AND-joined.
    pub fn sub_in(self, column: &str, query: Query) -> Self {
        self.known_sub_query(column, "IN", query, Connector::And)
    }

    pub fn or_sub_in(self, column: &str, query: Query) -> Self {
        self.known_sub_query(column, "IN", query, Connector::Or)
    }

    pub fn sub_not_in(self, column: &str, query: Query) -> Self {
        self.known_sub_query(column, "NOT IN", query, Connector::And)
    }

    pub fn or_sub_not_in(self, column: &str, query: Query) -> Self {
        self.known_sub_query(column, "NOT IN", query, Connector::Or)
    }

    /// `column = ALL (sub-query)`. The sub-query must select one column.
    pub fn sub_all(self, column: &str, query: Query) -> Self {
        self.known_sub_query(column, "= ALL", query, Connector::And)
    }

    pub fn or_sub_all(self, column: &str, query: Query) -> Self {
        self.known_sub_query(column, "= ALL", query, Connector::Or)
    }

    pub fn sub_not_all(self, column: &str, query: Query) -> Self {
        self.known_sub_query(column, "<> ALL", query, Connector::And)
    }

    pub fn or_sub_not_all(self, column: &str, query: Query) -> Self {
        self.known_sub_query(column, "<> ALL", query, Connector::Or)
    }

    /// `column = ANY (sub-query)`. The sub-query must select one column.
    pub fn sub_any(self, column: &str, query: Query) -> Self {
        self.known_sub_query(column, "= ANY", query, Connector::And)
    }

    pub fn or_sub_any(self, column: &str, query: Query) -> Self {
        self.known_sub_query(column, "= ANY", query, Connector::Or)
    }

    pub fn sub_not_any(self, column: &str, query: Query) -> Self {
        self.known_sub_query(column, "<> ANY", query, Connector::And)
    }

    pub fn or_sub_not_any(self, column: &str, query: Query) -> Self {
        self.known_sub_query(column, "<> ANY", query, Connector::Or)
    }

    /// `EXISTS (sub-query)`, AND-joined.
    pub fn sub_exists(mut self, query: Query) -> Self {
        self.push_sub_query(
            WhereStatement::new("EXISTS", Vec::new(), Connector::And),
            query,
        );
        self
    }

    pub fn or_sub_exists(mut self, query: Query) -> Self {
        self.push_sub_query(
            WhereStatement::new("EXISTS", Vec::new(), Connector::Or),
            query,
        );
        self
    }

    pub fn sub_not_exists(mut self, query: Query) -> Self {
        self.push_sub_query(
            WhereStatement::new("NOT EXISTS", Vec::new(), Connector::And),
            query,
        );
        self
    }

    pub fn or_sub_not_exists(mut self, query: Query) -> Self {
        self.push_sub_query(
            WhereStatement::new("NOT EXISTS", Vec::new(), Connector::Or),
            query,
        );
        self
    }
}
