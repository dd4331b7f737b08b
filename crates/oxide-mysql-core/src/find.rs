//! Query descriptors and the `SELECT` compiler.
//!
//! A [`Find`] targets one table and may include related tables, each
//! described by a nested [`Find`]. Compilation walks the tree depth-first and
//! produces a single `SELECT` with one `LEFT JOIN` per include.

use crate::condition::{compile_where, Filter, WhereClause};
use crate::error::{CompileError, Result};
use crate::schema::TableSchema;
use crate::statement::{qualified, quote_identifier, CompiledQuery};

/// MySQL's largest `LIMIT`, used when only an offset is requested.
const MAX_LIMIT: u64 = u64::MAX;

/// Sort direction for `ORDER BY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    /// Ascending order (ASC)
    Asc,
    /// Descending order (DESC)
    Desc,
}

impl OrderDirection {
    const fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Aggregate function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFn {
    /// COUNT
    Count,
    /// MAX
    Max,
    /// MIN
    Min,
    /// SUM
    Sum,
    /// AVG
    Avg,
}

impl AggregateFn {
    const fn as_sql(self) -> &'static str {
        match self {
            Self::Count => "COUNT",
            Self::Max => "MAX",
            Self::Min => "MIN",
            Self::Sum => "SUM",
            Self::Avg => "AVG",
        }
    }
}

/// One aggregate projection, e.g. `COUNT(*) AS total`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregate {
    /// Function to apply.
    pub function: AggregateFn,
    /// Aggregated field; `None` means `*`.
    pub field: Option<String>,
    /// Output column alias.
    pub alias: String,
}

impl Aggregate {
    /// `COUNT(*) AS alias`.
    #[must_use]
    pub fn count_all(alias: &str) -> Self {
        Self {
            function: AggregateFn::Count,
            field: None,
            alias: alias.to_string(),
        }
    }

    /// `FUNC(table.field) AS alias`.
    #[must_use]
    pub fn of(function: AggregateFn, field: &str, alias: &str) -> Self {
        Self {
            function,
            field: Some(field.to_string()),
            alias: alias.to_string(),
        }
    }

    /// `COUNT(table.field) AS alias`.
    #[must_use]
    pub fn count(field: &str, alias: &str) -> Self {
        Self::of(AggregateFn::Count, field, alias)
    }

    /// `MAX(table.field) AS alias`.
    #[must_use]
    pub fn max(field: &str, alias: &str) -> Self {
        Self::of(AggregateFn::Max, field, alias)
    }

    /// `MIN(table.field) AS alias`.
    #[must_use]
    pub fn min(field: &str, alias: &str) -> Self {
        Self::of(AggregateFn::Min, field, alias)
    }

    /// `SUM(table.field) AS alias`.
    #[must_use]
    pub fn sum(field: &str, alias: &str) -> Self {
        Self::of(AggregateFn::Sum, field, alias)
    }

    /// `AVG(table.field) AS alias`.
    #[must_use]
    pub fn avg(field: &str, alias: &str) -> Self {
        Self::of(AggregateFn::Avg, field, alias)
    }
}

/// A query descriptor over one table.
///
/// # Example
///
/// ```rust
/// use oxide_mysql_core::condition::Filter;
/// use oxide_mysql_core::find::{Find, OrderDirection};
/// use oxide_mysql_core::schema::{DbType, FieldDefinition, TableSchema};
///
/// let songs = TableSchema::new("songs")
///     .field(FieldDefinition::new("song_id", DbType::Int).primary_key())
///     .field(FieldDefinition::new("title", DbType::Varchar).size(200));
///
/// let query = Find::new(&songs)
///     .select(&["title"])
///     .filter(Filter::new().eq("song_id", 3))
///     .order_by("title", OrderDirection::Asc)
///     .take(10)
///     .build()
///     .unwrap();
///
/// assert_eq!(
///     query.sql,
///     "SELECT `songs`.`title` FROM `songs` WHERE `songs`.`song_id` = ? ORDER BY `songs`.`title` ASC LIMIT 10"
/// );
/// assert_eq!(query.params.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct Find<'a> {
    schema: &'a TableSchema,
    filter: Option<Filter>,
    select: Option<Vec<String>>,
    includes: Vec<(String, Find<'a>)>,
    order_by: Vec<(String, OrderDirection)>,
    aggregates: Vec<Aggregate>,
    skip: Option<u64>,
    take: Option<u64>,
}

/// State carried across the include tree.
#[derive(Default)]
struct FindState {
    select: Vec<String>,
    filter: WhereClause,
    joins: Vec<String>,
    order_by: Vec<String>,
    aggregate: bool,
}

impl<'a> Find<'a> {
    /// Creates a descriptor selecting every field of `schema`.
    #[must_use]
    pub fn new(schema: &'a TableSchema) -> Self {
        Self {
            schema,
            filter: None,
            select: None,
            includes: Vec::new(),
            order_by: Vec::new(),
            aggregates: Vec::new(),
            skip: None,
            take: None,
        }
    }

    /// The target table.
    #[must_use]
    pub fn schema(&self) -> &'a TableSchema {
        self.schema
    }

    /// Sets the filter.
    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Projects only `fields`.
    #[must_use]
    pub fn select(mut self, fields: &[&str]) -> Self {
        self.select = Some(fields.iter().map(|f| (*f).to_string()).collect());
        self
    }

    /// Joins a related table under the relation name `key`.
    ///
    /// When `key` names a foreign-key field of this table that points at the
    /// included table, that key drives the join.
    #[must_use]
    pub fn include(mut self, key: &str, find: Find<'a>) -> Self {
        self.includes.push((key.to_string(), find));
        self
    }

    /// Adds an `ORDER BY` entry.
    #[must_use]
    pub fn order_by(mut self, field: &str, direction: OrderDirection) -> Self {
        self.order_by.push((field.to_string(), direction));
        self
    }

    /// Adds an aggregate projection.
    #[must_use]
    pub fn aggregate(mut self, aggregate: Aggregate) -> Self {
        self.aggregates.push(aggregate);
        self
    }

    /// Skips the first `n` rows. Only valid on the outermost descriptor.
    #[must_use]
    pub const fn skip(mut self, n: u64) -> Self {
        self.skip = Some(n);
        self
    }

    /// Returns at most `n` rows. Only valid on the outermost descriptor.
    #[must_use]
    pub const fn take(mut self, n: u64) -> Self {
        self.take = Some(n);
        self
    }

    /// Compiles the descriptor into a single `SELECT`.
    pub fn build(&self) -> Result<CompiledQuery> {
        let mut state = FindState::default();
        self.walk(None, &mut state)?;

        let table = quote_identifier(self.schema.name());
        let mut parts = Vec::with_capacity(6);
        if state.select.is_empty() {
            parts.push("SELECT *".to_string());
        } else {
            parts.push(format!("SELECT {}", state.select.join(", ")));
        }
        parts.push(format!("FROM {table}"));
        if !state.joins.is_empty() {
            parts.push(state.joins.join(" "));
        }
        if !state.filter.is_empty() {
            parts.push(format!("WHERE {}", state.filter.to_sql()));
        }
        if !state.order_by.is_empty() {
            parts.push(format!("ORDER BY {}", state.order_by.join(", ")));
        }
        match (self.take, self.skip) {
            (Some(take), Some(skip)) => parts.push(format!("LIMIT {take} OFFSET {skip}")),
            (Some(take), None) => parts.push(format!("LIMIT {take}")),
            (None, Some(skip)) => parts.push(format!("LIMIT {MAX_LIMIT} OFFSET {skip}")),
            (None, None) => {}
        }

        Ok(CompiledQuery::new(parts.join(" "), state.filter.params))
    }

    fn walk(&self, parent: Option<(&str, &TableSchema)>, state: &mut FindState) -> Result<()> {
        let schema = self.schema;
        let table = schema.name();

        if parent.is_some() && (self.skip.is_some() || self.take.is_some()) {
            return Err(CompileError::InvalidDescriptor(format!(
                "skip/take on included table `{table}`; page the outermost query instead"
            )));
        }
        if self.select.is_some() && !self.aggregates.is_empty() {
            return Err(CompileError::InvalidDescriptor(format!(
                "select and aggregate are mutually exclusive on `{table}`"
            )));
        }

        if !self.aggregates.is_empty() {
            state.aggregate = true;
            for aggregate in &self.aggregates {
                let target = match &aggregate.field {
                    Some(field) => {
                        schema.check_field(field)?;
                        qualified(table, field)
                    }
                    None => "*".to_string(),
                };
                state.select.push(format!(
                    "{}({target}) AS {}",
                    aggregate.function.as_sql(),
                    quote_identifier(&aggregate.alias)
                ));
            }
        } else if !state.aggregate {
            match &self.select {
                Some(fields) => {
                    for field in fields {
                        schema.check_field(field)?;
                        state.select.push(qualified(table, field));
                    }
                }
                None => state
                    .select
                    .extend(schema.field_names().map(|field| qualified(table, field))),
            }
        }

        if let Some(filter) = &self.filter {
            state.filter.extend(compile_where(schema, filter)?);
        }

        if let Some((key, parent)) = parent {
            state.joins.push(join_clause(parent, key, schema)?);
        }

        for (field, direction) in &self.order_by {
            schema.check_field(field)?;
            state
                .order_by
                .push(format!("{} {}", qualified(table, field), direction.as_sql()));
        }

        for (key, include) in &self.includes {
            include.walk(Some((key.as_str(), schema)), state)?;
        }
        Ok(())
    }
}

/// Builds the `LEFT JOIN` linking `child` to `parent`.
///
/// Candidates are collected in `child` field order: a child field whose
/// foreign key targets the parent, or a child field targeted by one of the
/// parent's foreign keys. A parent foreign key named `key` wins; otherwise
/// the first candidate is used.
fn join_clause(parent: &TableSchema, key: &str, child: &TableSchema) -> Result<String> {
    let parent_name = parent.name();
    let child_name = child.name();
    let mut candidates: Vec<(Option<&str>, String)> = Vec::new();

    for field in &child.fields {
        if let Some(fk) = field.foreign_key.as_ref().filter(|fk| fk.table == parent_name) {
            candidates.push((
                None,
                format!(
                    "{} = {}",
                    qualified(&fk.table, &fk.field),
                    qualified(child_name, &field.name)
                ),
            ));
        }
        // A child key may also be the target of a parent key, whatever it
        // references itself.
        for (parent_field, fk) in parent.foreign_keys() {
            if fk.table == child_name && fk.field == field.name {
                candidates.push((
                    Some(parent_field),
                    format!(
                        "{} = {}",
                        qualified(child_name, &field.name),
                        qualified(parent_name, parent_field)
                    ),
                ));
            }
        }
    }

    let chosen = candidates
        .iter()
        .position(|(via, _)| *via == Some(key))
        .unwrap_or(0);
    candidates
        .into_iter()
        .nth(chosen)
        .map(|(_, on)| format!("LEFT JOIN {} ON {on}", quote_identifier(child_name)))
        .ok_or_else(|| CompileError::MissingRelation {
            parent: parent_name.to_string(),
            child: child_name.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::Operator;
    use crate::schema::{DbType, FieldDefinition, ForeignKey};
    use crate::value::SqlValue;

    fn authors() -> TableSchema {
        TableSchema::new("authors")
            .field(FieldDefinition::new("author_id", DbType::Int).primary_key())
            .field(FieldDefinition::new("name", DbType::Varchar).size(100))
    }

    fn songs() -> TableSchema {
        TableSchema::new("songs")
            .field(FieldDefinition::new("song_id", DbType::Int).primary_key())
            .field(
                FieldDefinition::new("author_id", DbType::Int)
                    .foreign_key(ForeignKey::new("authors", "author_id")),
            )
            .field(FieldDefinition::new("plays", DbType::Int))
    }

    #[test]
    fn test_select_all_fields() {
        let authors = authors();
        let query = Find::new(&authors).build().unwrap();

        assert_eq!(
            query.sql,
            "SELECT `authors`.`author_id`, `authors`.`name` FROM `authors`"
        );
        assert!(query.params.is_empty());
    }

    #[test]
    fn test_include_referencing_child() {
        let (authors, songs) = (authors(), songs());
        let query = Find::new(&authors)
            .filter(Filter::new().eq("name", "Nina"))
            .include(
                "songs",
                Find::new(&songs)
                    .select(&["song_id"])
                    .filter(Filter::new().op("plays", Operator::Gt, 10)),
            )
            .build()
            .unwrap();

        assert_eq!(
            query.sql,
            "SELECT `authors`.`author_id`, `authors`.`name`, `songs`.`song_id` \
             FROM `authors` \
             LEFT JOIN `songs` ON `authors`.`author_id` = `songs`.`author_id` \
             WHERE `authors`.`name` = ? AND `songs`.`plays` > ?"
        );
        assert_eq!(
            query.params,
            vec![SqlValue::Text("Nina".into()), SqlValue::Int(10)]
        );
    }

    #[test]
    fn test_include_referenced_parent() {
        let (authors, songs) = (authors(), songs());
        let query = Find::new(&songs)
            .select(&["song_id"])
            .include("author_id", Find::new(&authors).select(&["name"]))
            .build()
            .unwrap();

        assert_eq!(
            query.sql,
            "SELECT `songs`.`song_id`, `authors`.`name` FROM `songs` \
             LEFT JOIN `authors` ON `authors`.`author_id` = `songs`.`author_id`"
        );
    }

    #[test]
    fn test_include_target_that_has_its_own_foreign_key() {
        let profiles = TableSchema::new("profiles")
            .field(
                FieldDefinition::new("user_id", DbType::Int)
                    .primary_key()
                    .foreign_key(ForeignKey::new("users", "user_id")),
            )
            .field(FieldDefinition::new("bio", DbType::Text));
        let orders = TableSchema::new("orders")
            .field(FieldDefinition::new("order_id", DbType::Int).primary_key())
            .field(
                FieldDefinition::new("profile_id", DbType::Int)
                    .foreign_key(ForeignKey::new("profiles", "user_id")),
            );

        let query = Find::new(&orders)
            .select(&["order_id"])
            .include("profile_id", Find::new(&profiles).select(&["bio"]))
            .build()
            .unwrap();

        assert_eq!(
            query.sql,
            "SELECT `orders`.`order_id`, `profiles`.`bio` FROM `orders` \
             LEFT JOIN `profiles` ON `profiles`.`user_id` = `orders`.`profile_id`"
        );
    }

    #[test]
    fn test_unrelated_include_is_rejected() {
        let authors = authors();
        let other = TableSchema::new("other").field(FieldDefinition::new("id", DbType::Int));
        let err = Find::new(&authors)
            .include("other", Find::new(&other))
            .build()
            .unwrap_err();

        assert_eq!(
            err,
            CompileError::MissingRelation {
                parent: "authors".into(),
                child: "other".into()
            }
        );
    }

    #[test]
    fn test_aggregate_suppresses_descendant_projection() {
        let (authors, songs) = (authors(), songs());
        let query = Find::new(&authors)
            .aggregate(Aggregate::count_all("total"))
            .aggregate(Aggregate::max("author_id", "top"))
            .include("songs", Find::new(&songs))
            .build()
            .unwrap();

        assert!(query.sql.starts_with(
            "SELECT COUNT(*) AS `total`, MAX(`authors`.`author_id`) AS `top` FROM `authors` LEFT JOIN"
        ));
    }

    #[test]
    fn test_select_with_aggregate_is_rejected() {
        let authors = authors();
        let result = Find::new(&authors)
            .select(&["name"])
            .aggregate(Aggregate::count_all("n"))
            .build();
        assert!(matches!(result, Err(CompileError::InvalidDescriptor(_))));
    }

    #[test]
    fn test_paging() {
        let authors = authors();
        let query = Find::new(&authors).skip(20).take(10).build().unwrap();
        assert!(query.sql.ends_with("LIMIT 10 OFFSET 20"));

        let query = Find::new(&authors).skip(5).build().unwrap();
        assert!(query.sql.ends_with("LIMIT 18446744073709551615 OFFSET 5"));
    }

    #[test]
    fn test_nested_paging_is_rejected() {
        let (authors, songs) = (authors(), songs());
        let result = Find::new(&authors)
            .include("songs", Find::new(&songs).take(1))
            .build();
        assert!(matches!(result, Err(CompileError::InvalidDescriptor(_))));
    }

    #[test]
    fn test_order_by_in_traversal_order() {
        let (authors, songs) = (authors(), songs());
        let query = Find::new(&authors)
            .order_by("name", OrderDirection::Desc)
            .include(
                "songs",
                Find::new(&songs).order_by("plays", OrderDirection::Asc),
            )
            .build()
            .unwrap();

        assert!(query
            .sql
            .ends_with("ORDER BY `authors`.`name` DESC, `songs`.`plays` ASC"));
    }

    #[test]
    fn test_unknown_select_field() {
        let authors = authors();
        let result = Find::new(&authors).select(&["nope"]).build();
        assert!(matches!(result, Err(CompileError::SchemaMismatch { .. })));
    }
}
