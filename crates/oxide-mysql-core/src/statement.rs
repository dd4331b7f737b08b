//! Compiled statements and identifier quoting.

use crate::value::SqlValue;

/// Quotes an identifier with backticks, doubling embedded backticks.
#[must_use]
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Returns `` `table`.`field` ``.
#[must_use]
pub fn qualified(table: &str, field: &str) -> String {
    format!("{}.{}", quote_identifier(table), quote_identifier(field))
}

/// SQL text with positional parameters.
///
/// `params` is ordered exactly like the `?` placeholders in `sql`.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    /// SQL text with `?` placeholders.
    pub sql: String,
    /// Values for the placeholders, left to right.
    pub params: Vec<SqlValue>,
}

impl CompiledQuery {
    /// Creates a compiled query.
    #[must_use]
    pub fn new(sql: impl Into<String>, params: Vec<SqlValue>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// Creates a query without parameters.
    #[must_use]
    pub fn raw(sql: impl Into<String>) -> Self {
        Self::new(sql, Vec::new())
    }
}

/// How a statement's placeholders are bound.
#[derive(Debug, Clone, PartialEq)]
pub enum Bind {
    /// One value per `?`.
    Values(Vec<SqlValue>),
    /// A single `VALUES ?` placeholder bound to a list of row tuples.
    Rows(Vec<Vec<SqlValue>>),
}

/// One statement produced by the mutation compiler.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// SQL text.
    pub sql: String,
    /// Bound values.
    pub bind: Bind,
}

const BATCH_PLACEHOLDER: &str = "VALUES ?";

impl Statement {
    /// A statement with positional values.
    #[must_use]
    pub fn values(sql: impl Into<String>, params: Vec<SqlValue>) -> Self {
        Self {
            sql: sql.into(),
            bind: Bind::Values(params),
        }
    }

    /// A batched statement whose `VALUES ?` is bound to `rows`.
    #[must_use]
    pub fn rows(sql: impl Into<String>, rows: Vec<Vec<SqlValue>>) -> Self {
        Self {
            sql: sql.into(),
            bind: Bind::Rows(rows),
        }
    }

    /// Whether this is a batched multi-row statement.
    #[must_use]
    pub const fn is_batched(&self) -> bool {
        matches!(self.bind, Bind::Rows(_))
    }

    /// Number of data rows this statement writes or matches.
    #[must_use]
    pub fn row_count(&self) -> usize {
        match &self.bind {
            Bind::Values(_) => 1,
            Bind::Rows(rows) => rows.len(),
        }
    }

    /// Flattens the statement into plain positional form.
    ///
    /// A batched `VALUES ?` becomes `VALUES (?, ?), (?, ?)` with the row
    /// values concatenated in order. Drivers that can't bind a nested array
    /// execute the expanded form.
    #[must_use]
    pub fn expand(&self) -> CompiledQuery {
        match &self.bind {
            Bind::Values(params) => CompiledQuery::new(self.sql.clone(), params.clone()),
            Bind::Rows(rows) => {
                let tuples = rows
                    .iter()
                    .map(|row| {
                        let marks = vec!["?"; row.len()].join(", ");
                        format!("({marks})")
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                let sql = self
                    .sql
                    .replacen(BATCH_PLACEHOLDER, &format!("VALUES {tuples}"), 1);
                let params = rows.iter().flatten().cloned().collect();
                CompiledQuery::new(sql, params)
            }
        }
    }
}
