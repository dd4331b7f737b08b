//! Filters and the `WHERE` clause compiler.
//!
//! A [`Filter`] is an ordered list of field conditions plus optional `AND` /
//! `OR` groups of sibling filters. Top-level entries are always joined with
//! `AND`; a group is compiled sibling by sibling, joined with its own
//! operator and wrapped in parentheses.

use std::fmt;

use crate::error::{CompileError, Result};
use crate::schema::TableSchema;
use crate::statement::qualified;
use crate::value::{SqlValue, ToSqlValue};

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// Equal (=), or `IS NULL` against null.
    Equal,
    /// Not equal (!=), or `IS NOT NULL` against null.
    Not,
    /// Less than (<)
    Lt,
    /// Less than or equal (<=)
    Lte,
    /// Greater than (>)
    Gt,
    /// Greater than or equal (>=)
    Gte,
}

impl Operator {
    /// Name used in descriptors and error messages.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Equal => "equal",
            Self::Not => "not",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Gt => "gt",
            Self::Gte => "gte",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Equal => write!(f, "="),
            Self::Not => write!(f, "!="),
            Self::Lt => write!(f, "<"),
            Self::Lte => write!(f, "<="),
            Self::Gt => write!(f, ">"),
            Self::Gte => write!(f, ">="),
        }
    }
}

/// The condition attached to one field.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Plain equality (`IS NULL` for null).
    Value(SqlValue),
    /// One or more operator comparisons, ANDed together.
    Ops(Vec<(Operator, SqlValue)>),
}

impl Condition {
    /// An empty operator set; add comparisons with [`Condition::op`].
    #[must_use]
    pub const fn ops() -> Self {
        Self::Ops(Vec::new())
    }

    /// Adds a comparison.
    #[must_use]
    pub fn op<V: ToSqlValue>(self, op: Operator, value: V) -> Self {
        let value = value.to_sql_value();
        match self {
            Self::Ops(mut ops) => {
                ops.push((op, value));
                Self::Ops(ops)
            }
            Self::Value(existing) => Self::Ops(vec![(Operator::Equal, existing), (op, value)]),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Entry {
    Field(String, Condition),
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

/// A structured filter over one table.
///
/// # Example
///
/// ```rust
/// use oxide_mysql_core::condition::{Filter, Operator};
///
/// let filter = Filter::new()
///     .eq("author_id", 7)
///     .op("plays", Operator::Gte, 100)
///     .or(vec![Filter::new().eq("genre", "jazz"), Filter::new().is_null("genre")]);
/// assert!(!filter.is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    entries: Vec<Entry>,
}

impl Filter {
    /// Creates an empty filter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the filter has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether the filter compiles to more than one `AND`ed term.
    fn is_compound(&self) -> bool {
        self.entries.len() > 1
            || matches!(self.entries.first(), Some(Entry::Field(_, Condition::Ops(ops))) if ops.len() > 1)
    }

    /// Attaches a condition to a field.
    #[must_use]
    pub fn field(mut self, field: &str, condition: Condition) -> Self {
        self.entries.push(Entry::Field(field.to_string(), condition));
        self
    }

    /// `field = value`, or `field IS NULL` when the value normalises to null.
    #[must_use]
    pub fn eq<V: ToSqlValue>(self, field: &str, value: V) -> Self {
        self.field(field, Condition::Value(value.to_sql_value()))
    }

    /// `field IS NULL`.
    #[must_use]
    pub fn is_null(self, field: &str) -> Self {
        self.field(field, Condition::Value(SqlValue::Null))
    }

    /// `field IS NOT NULL`.
    #[must_use]
    pub fn is_not_null(self, field: &str) -> Self {
        self.op(field, Operator::Not, SqlValue::Null)
    }

    /// `field <op> value`.
    ///
    /// Consecutive calls on the same field collect into one operator set.
    #[must_use]
    pub fn op<V: ToSqlValue>(mut self, field: &str, op: Operator, value: V) -> Self {
        if let Some(Entry::Field(name, condition)) = self.entries.last_mut() {
            if name == field && matches!(condition, Condition::Ops(_)) {
                let taken = std::mem::replace(condition, Condition::ops());
                *condition = taken.op(op, value);
                return self;
            }
        }
        self.field(field, Condition::ops().op(op, value))
    }

    /// Adds a group whose siblings are joined with `AND`.
    #[must_use]
    pub fn and(mut self, filters: Vec<Filter>) -> Self {
        self.entries.push(Entry::And(filters));
        self
    }

    /// Adds a group whose siblings are joined with `OR`.
    #[must_use]
    pub fn or(mut self, filters: Vec<Filter>) -> Self {
        self.entries.push(Entry::Or(filters));
        self
    }
}

/// A compiled `WHERE` clause: boolean terms plus their parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WhereClause {
    /// Terms, to be joined with `AND`.
    pub clauses: Vec<String>,
    /// Values for the placeholders in `clauses`, left to right.
    pub params: Vec<SqlValue>,
}

impl WhereClause {
    /// Whether there is nothing to filter on.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// The terms joined with `AND` (without the `WHERE` keyword).
    #[must_use]
    pub fn to_sql(&self) -> String {
        self.clauses.join(" AND ")
    }

    /// Appends another clause's terms and parameters.
    pub fn extend(&mut self, other: WhereClause) {
        self.clauses.extend(other.clauses);
        self.params.extend(other.params);
    }
}

/// Compiles `filter` against `schema`.
///
/// Every referenced field must exist on the table.
pub fn compile_where(schema: &TableSchema, filter: &Filter) -> Result<WhereClause> {
    let mut out = WhereClause::default();
    for entry in &filter.entries {
        match entry {
            Entry::Field(field, condition) => {
                compile_condition(schema, field, condition, &mut out)?;
            }
            Entry::And(siblings) => compile_group(schema, siblings, "AND", &mut out)?,
            Entry::Or(siblings) => compile_group(schema, siblings, "OR", &mut out)?,
        }
    }
    Ok(out)
}

fn compile_group(
    schema: &TableSchema,
    siblings: &[Filter],
    joiner: &str,
    out: &mut WhereClause,
) -> Result<()> {
    if siblings.is_empty() {
        return Err(CompileError::InvalidDescriptor(format!(
            "empty {joiner} group on `{}`",
            schema.name()
        )));
    }

    let mut terms = Vec::with_capacity(siblings.len());
    for sibling in siblings {
        let compiled = compile_where(schema, sibling)?;
        if compiled.is_empty() {
            return Err(CompileError::InvalidDescriptor(format!(
                "empty filter inside {joiner} group on `{}`",
                schema.name()
            )));
        }
        if sibling.is_compound() {
            terms.push(format!("({})", compiled.to_sql()));
        } else {
            terms.push(compiled.to_sql());
        }
        out.params.extend(compiled.params);
    }
    out.clauses
        .push(format!("({})", terms.join(&format!(" {joiner} "))));
    Ok(())
}

fn compile_condition(
    schema: &TableSchema,
    field: &str,
    condition: &Condition,
    out: &mut WhereClause,
) -> Result<()> {
    schema.check_field(field)?;
    let column = qualified(schema.name(), field);

    match condition {
        Condition::Value(SqlValue::Null) => out.clauses.push(format!("{column} IS NULL")),
        Condition::Value(value) => {
            out.clauses.push(format!("{column} = ?"));
            out.params.push(value.clone());
        }
        Condition::Ops(ops) => {
            if ops.is_empty() {
                return Err(CompileError::InvalidDescriptor(format!(
                    "no operator given for {column}"
                )));
            }
            let mut terms = Vec::with_capacity(ops.len());
            for (op, value) in ops {
                if value.is_null() {
                    match op {
                        Operator::Equal => terms.push(format!("{column} IS NULL")),
                        Operator::Not => terms.push(format!("{column} IS NOT NULL")),
                        _ => {
                            return Err(CompileError::InvalidFilter {
                                table: schema.name().to_string(),
                                field: field.to_string(),
                                operator: op.name().to_string(),
                            })
                        }
                    }
                } else {
                    terms.push(format!("{column} {op} ?"));
                    out.params.push(value.clone());
                }
            }
            out.clauses.push(terms.join(" AND "));
        }
    }
    Ok(())
}
