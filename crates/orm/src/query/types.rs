//! Core statement-builder types
//!
//! Small enums shared across the query layer. Each SQL-facing enum carries a
//! `Display` impl that renders its exact SQL token.

use std::fmt;

/// The action a statement compiles to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryAction {
    Select,
    Insert,
    Update,
    Delete,
    Count,
}

/// Comparison operators accepted by the fluent where API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    NotLike,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = match self {
            CompareOp::Eq => "=",
            CompareOp::NotEq => "!=",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
            CompareOp::Like => "LIKE",
            CompareOp::NotLike => "NOT LIKE",
        };
        write!(f, "{}", token)
    }
}

/// Boolean connector between adjacent predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connector {
    And,
    Or,
}

impl fmt::Display for Connector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Connector::And => write!(f, "AND"),
            Connector::Or => write!(f, "OR"),
        }
    }
}

/// ORDER BY direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

impl fmt::Display for OrderDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderDirection::Asc => write!(f, "ASC"),
            OrderDirection::Desc => write!(f, "DESC"),
        }
    }
}

/// One ORDER BY entry.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub column: String,
    pub direction: OrderDirection,
}

/// Soft-delete row visibility for entity-bound statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SoftDeleteMode {
    /// Hide soft-deleted rows (injects `deleted_at IS NULL`).
    #[default]
    ExcludeDeleted,
    /// No visibility filter at all.
    IncludeDeleted,
    /// Only soft-deleted rows (injects `deleted_at IS NOT NULL`).
    OnlyDeleted,
}

/// One entry in the select-column list.
#[derive(Debug, Clone)]
pub enum SelectColumn {
    /// `*`
    All,
    /// A bare column name, quoted at compile time.
    Column(String),
    /// A raw fragment passed through unescaped.
    Raw(String),
    /// A scalar sub-select rendered as `(SELECT ...) AS alias`.
    SubSelect {
        alias: String,
        query: Box<crate::query::Query>,
    },
}

/// Quote an identifier with backticks; embedded backticks are doubled.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_tokens() {
        assert_eq!(CompareOp::Eq.to_string(), "=");
        assert_eq!(CompareOp::NotEq.to_string(), "!=");
        assert_eq!(CompareOp::NotLike.to_string(), "NOT LIKE");
        assert_eq!(Connector::Or.to_string(), "OR");
        assert_eq!(OrderDirection::Desc.to_string(), "DESC");
    }

    #[test]
    fn test_quote_ident_doubles_backticks() {
        assert_eq!(quote_ident("name"), "`name`");
        assert_eq!(quote_ident("weird`col"), "`weird``col`");
    }
}
