//! Statement compilation
//!
//! Turns accumulated builder state into `(sql, bindings)` per action. The
//! wire format is fixed: backtick identifier quoting and `?` positional
//! placeholders, with one binding per placeholder in emission order. The
//! placeholder and binding counts are verified before the pair is handed
//! out.

use crate::error::{OrmError, OrmResult};
use crate::query::builder::Query;
use crate::query::types::{QueryAction, SelectColumn, SoftDeleteMode};
use crate::query::where_clause::{WhereNode, WhereStatement};
use crate::value::DatabaseValue;

impl Query {
    /// Compile the statement into SQL text plus its ordered binding list.
    ///
    /// Clause order for reads: WHERE, ORDER BY, GROUP BY + HAVING, LIMIT.
    /// For mutations only WHERE and LIMIT apply, and the offset half of
    /// LIMIT is emitted for SELECT alone.
    pub fn generate_query(&self) -> OrmResult<(String, Vec<DatabaseValue>)> {
        let mut bindings = Vec::new();
        let mut sql = String::new();

        match self.action {
            QueryAction::Update => {
                if self.write_data.is_empty() {
                    return Err(OrmError::Configuration(
                        "UPDATE requires at least one column to set".to_string(),
                    ));
                }

                sql.push_str(&format!("UPDATE {} SET ", self.quoted_table()));
                let assignments = self
                    .write_data
                    .keys()
                    .map(|column| format!("{} = ?", super::types::quote_ident(column)))
                    .collect::<Vec<_>>()
                    .join(", ");
                sql.push_str(&assignments);
                bindings.extend(self.write_data.values().cloned());

                self.compile_where(&mut sql, &mut bindings)?;
                self.compile_limit(&mut sql);
            }
            QueryAction::Insert => {
                if self.write_data.is_empty() {
                    return Err(OrmError::Configuration(
                        "INSERT requires at least one column".to_string(),
                    ));
                }

                let columns = self
                    .write_data
                    .keys()
                    .map(|column| super::types::quote_ident(column))
                    .collect::<Vec<_>>()
                    .join(", ");
                let placeholders = vec!["?"; self.write_data.len()].join(", ");

                sql.push_str(&format!(
                    "INSERT INTO {}({}) VALUES({})",
                    self.quoted_table(),
                    columns,
                    placeholders
                ));
                bindings.extend(self.write_data.values().cloned());
            }
            QueryAction::Delete => {
                sql.push_str(&format!("DELETE FROM {}", self.quoted_table()));
                self.compile_where(&mut sql, &mut bindings)?;
                self.compile_limit(&mut sql);
            }
            QueryAction::Select | QueryAction::Count => {
                sql.push_str("SELECT ");
                sql.push_str(&self.compile_columns(&mut bindings)?);
                sql.push_str(&format!(" FROM {}", self.quoted_table()));

                self.compile_where(&mut sql, &mut bindings)?;
                self.compile_order(&mut sql);
                self.compile_group(&mut sql, &mut bindings);
                self.compile_limit(&mut sql);
            }
        }

        let placeholders = sql.matches('?').count();
        if placeholders != bindings.len() {
            return Err(OrmError::Binding(format!(
                "Statement has {} placeholders but {} bindings. Query: {}",
                placeholders,
                bindings.len(),
                sql
            )));
        }

        Ok((sql, bindings))
    }

    fn quoted_table(&self) -> String {
        super::types::quote_ident(&self.table)
    }

    fn compile_columns(&self, bindings: &mut Vec<DatabaseValue>) -> OrmResult<String> {
        if self.action == QueryAction::Count {
            // A count always collapses the column list to one aggregate.
            return Ok("COUNT(*) AS count".to_string());
        }

        if self.columns.is_empty() {
            return Ok("*".to_string());
        }

        let mut parts = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            match column {
                SelectColumn::All => parts.push("*".to_string()),
                SelectColumn::Column(name) => parts.push(super::types::quote_ident(name)),
                SelectColumn::Raw(fragment) => parts.push(fragment.clone()),
                SelectColumn::SubSelect { alias, query } => {
                    let (inner_sql, inner_bindings) = query.generate_query()?;
                    bindings.extend(inner_bindings);
                    parts.push(format!("({}) AS {}", inner_sql, alias));
                }
            }
        }
        Ok(parts.join(", "))
    }

    /// Compile the predicate sequence. When the bound entity type soft
    /// deletes, the visibility filter is injected as the first predicate so
    /// it can never be disabled by OR-chaining.
    fn compile_where(
        &self,
        sql: &mut String,
        bindings: &mut Vec<DatabaseValue>,
    ) -> OrmResult<()> {
        let injected = self.soft_delete_filter();
        let nodes: Vec<&WhereNode> = injected.iter().chain(self.wheres.iter()).collect();

        if nodes.is_empty() {
            return Ok(());
        }

        let mut pieces: Vec<String> = Vec::new();
        let mut current_depth: u32 = 0;
        // Per-scope running index: a predicate only carries its connector
        // when it is not the first one in its enclosing scope. Opening a
        // group resets the index; closing one does not.
        let mut current_index: usize = 0;

        for node in nodes {
            match node {
                WhereNode::Group(change) => {
                    while change.depth > current_depth {
                        if current_index > 0 {
                            pieces.push(change.connector.to_string());
                        }
                        pieces.push("(".to_string());
                        current_depth += 1;
                        current_index = 0;
                    }
                    while change.depth < current_depth {
                        pieces.push(")".to_string());
                        current_depth -= 1;
                    }
                }
                WhereNode::Statement(statement) => {
                    if current_index > 0 {
                        pieces.push(statement.connector.to_string());
                    }
                    pieces.push(statement.fragment.clone());
                    bindings.extend(statement.bindings.iter().cloned());
                    current_index += 1;
                }
                WhereNode::SubQuery(node) => {
                    if current_index > 0 {
                        pieces.push(node.prefix.connector.to_string());
                    }
                    let (inner_sql, inner_bindings) = node.query.generate_query()?;
                    pieces.push(format!("{} ({})", node.prefix.fragment, inner_sql));
                    bindings.extend(node.prefix.bindings.iter().cloned());
                    bindings.extend(inner_bindings);
                    current_index += 1;
                }
            }
        }

        while current_depth > 0 {
            pieces.push(")".to_string());
            current_depth -= 1;
        }

        sql.push_str(" WHERE ");
        sql.push_str(&pieces.join(" "));
        Ok(())
    }

    fn soft_delete_filter(&self) -> Option<WhereNode> {
        // Reads only. Injecting into mutations would make restoring a
        // soft-deleted row (or force-deleting one) target nothing.
        if !matches!(self.action, QueryAction::Select | QueryAction::Count) {
            return None;
        }

        let descriptor = self.descriptor.as_ref()?;
        if !descriptor.soft_deletes() {
            return None;
        }

        let fragment = match self.soft_delete_mode {
            SoftDeleteMode::ExcludeDeleted => "`deleted_at` IS NULL",
            SoftDeleteMode::OnlyDeleted => "`deleted_at` IS NOT NULL",
            SoftDeleteMode::IncludeDeleted => return None,
        };
        Some(WhereNode::Statement(WhereStatement::and(
            fragment,
            Vec::new(),
        )))
    }

    fn compile_order(&self, sql: &mut String) {
        if self.order.is_empty() {
            return;
        }

        let parts = self
            .order
            .iter()
            .map(|entry| {
                format!(
                    "{} {}",
                    super::types::quote_ident(&entry.column),
                    entry.direction
                )
            })
            .collect::<Vec<_>>()
            .join(", ");
        sql.push_str(&format!(" ORDER BY {}", parts));
    }

    fn compile_group(&self, sql: &mut String, bindings: &mut Vec<DatabaseValue>) {
        if self.group.is_empty() {
            return;
        }

        let parts = self
            .group
            .iter()
            .map(|column| super::types::quote_ident(column))
            .collect::<Vec<_>>()
            .join(", ");
        sql.push_str(&format!(" GROUP BY {}", parts));

        if let Some(having) = &self.having {
            sql.push_str(&format!(" HAVING {}", having.fragment));
            bindings.extend(having.bindings.iter().cloned());
        }
    }

    fn compile_limit(&self, sql: &mut String) {
        if let Some(limit) = self.limit {
            sql.push_str(" LIMIT ");
            if self.action == QueryAction::Select {
                sql.push_str(&format!("{}, ", self.offset));
            }
            sql.push_str(&limit.to_string());
        }
    }
}
