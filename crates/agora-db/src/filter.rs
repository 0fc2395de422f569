use rusqlite::types::Value;

use crate::error::{DbError, Result};

/// A WHERE clause built from column conditions. Values never reach the SQL
/// text; they are bound as positional parameters when the filter is rendered.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(&'static str, Value),
    IsNull(&'static str),
    And(Vec<Filter>),
}

impl Filter {
    pub fn eq(column: &'static str, value: impl Into<Value>) -> Self {
        Filter::Eq(column, value.into())
    }

    pub fn is_null(column: &'static str) -> Self {
        Filter::IsNull(column)
    }

    pub fn and(self, other: Filter) -> Self {
        match self {
            Filter::And(mut parts) => {
                parts.push(other);
                Filter::And(parts)
            }
            first => Filter::And(vec![first, other]),
        }
    }

    pub fn id(id: i64) -> Self {
        Filter::eq("id", id)
    }

    /// Children of `parent`, or the roots when `parent` is `None`.
    pub fn parent(parent: Option<i64>) -> Self {
        match parent {
            Some(id) => Filter::eq("id_parent", id),
            None => Filter::is_null("id_parent"),
        }
    }

    /// Appends the clause to `sql` and its bound values to `params`.
    /// Fails before any SQL runs if a column is not one of `columns`.
    pub(crate) fn render(
        &self,
        table: &'static str,
        columns: &[&str],
        sql: &mut String,
        params: &mut Vec<Value>,
    ) -> Result<()> {
        match self {
            Filter::Eq(column, value) => {
                check_column(table, columns, column)?;
                params.push(value.clone());
                sql.push_str(&format!("{} = ?{}", column, params.len()));
            }
            Filter::IsNull(column) => {
                check_column(table, columns, column)?;
                sql.push_str(&format!("{} IS NULL", column));
            }
            Filter::And(parts) if parts.is_empty() => sql.push_str("1 = 1"),
            Filter::And(parts) => {
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        sql.push_str(" AND ");
                    }
                    sql.push('(');
                    part.render(table, columns, sql, params)?;
                    sql.push(')');
                }
            }
        }
        Ok(())
    }
}

fn check_column(table: &'static str, columns: &[&str], column: &'static str) -> Result<()> {
    if columns.contains(&column) {
        Ok(())
    } else {
        Err(DbError::UnknownColumn { table, column })
    }
}
