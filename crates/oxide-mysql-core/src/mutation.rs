//! Mutation descriptors and the write-statement compiler.
//!
//! A [`Mutation`] targets one table and may include mutations on related
//! tables. Compilation walks the tree, collecting rows per table in the order
//! tables are first seen, then emits the statements for each table.

use crate::condition::{compile_where, Filter, WhereClause};
use crate::error::{CompileError, Result};
use crate::find::Find;
use crate::schema::TableSchema;
use crate::statement::{qualified, quote_identifier, Bind, CompiledQuery, Statement};
use crate::value::{Row, SqlValue};

/// Alias MySQL gives the incoming row in `ON DUPLICATE KEY UPDATE`.
const NEW_ROW_ALIAS: &str = "NEW_VAL";

/// Statement family of a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    /// Plain `INSERT`.
    Insert,
    /// `UPDATE` matched by primary key.
    Update,
    /// `INSERT ... ON DUPLICATE KEY UPDATE` replacing non-key columns.
    Upsert,
    /// Like `Upsert`, but adds the incoming values to the stored ones.
    AddUpsert,
    /// `DELETE` matched by primary key.
    Delete,
    /// `UPDATE` scoped by a filter.
    SetUpdate,
    /// `DELETE` scoped by a filter.
    SetDelete,
    /// `INSERT ... SELECT`.
    SetInsert,
}

impl MutationKind {
    const fn uses_values_list(self) -> bool {
        matches!(self, Self::Insert | Self::Upsert | Self::AddUpsert)
    }
}

/// What a mutation node does; each variant carries only its legal inputs.
#[derive(Debug, Clone)]
pub enum MutationOp<'a> {
    /// Insert `rows`.
    Insert(Vec<Row>),
    /// Update each row, matched by its primary-key values.
    Update(Vec<Row>),
    /// Insert each row or overwrite its non-key columns.
    Upsert(Vec<Row>),
    /// Insert each row or add to its non-key columns.
    AddUpsert(Vec<Row>),
    /// Delete each row; rows carry primary-key values only.
    Delete(Vec<Row>),
    /// Assign `set` on every row matching `filter`.
    SetUpdate {
        /// Column assignments.
        set: Row,
        /// Rows to update; empty means every row.
        filter: Filter,
    },
    /// Delete every row matching the filter; empty means every row.
    SetDelete(Filter),
    /// Insert the result of a query.
    SetInsert {
        /// Destination columns; empty means every field of the table.
        columns: Vec<String>,
        /// Source query.
        from: Box<Find<'a>>,
    },
}

impl MutationOp<'_> {
    /// The statement family.
    #[must_use]
    pub const fn kind(&self) -> MutationKind {
        match self {
            Self::Insert(_) => MutationKind::Insert,
            Self::Update(_) => MutationKind::Update,
            Self::Upsert(_) => MutationKind::Upsert,
            Self::AddUpsert(_) => MutationKind::AddUpsert,
            Self::Delete(_) => MutationKind::Delete,
            Self::SetUpdate { .. } => MutationKind::SetUpdate,
            Self::SetDelete(_) => MutationKind::SetDelete,
            Self::SetInsert { .. } => MutationKind::SetInsert,
        }
    }
}

/// A mutation on one table plus mutations on related tables.
///
/// # Example
///
/// ```rust
/// use oxide_mysql_core::mutation::Mutation;
/// use oxide_mysql_core::schema::{DbType, FieldDefinition, TableSchema};
/// use oxide_mysql_core::value::Row;
///
/// let counters = TableSchema::new("counters")
///     .field(FieldDefinition::new("id", DbType::Int).primary_key())
///     .field(FieldDefinition::new("count", DbType::Int));
///
/// let plan = Mutation::add_upsert(&counters, vec![Row::new().set("id", 1).set("count", 5)])
///     .compile()
///     .unwrap();
///
/// assert_eq!(
///     plan.tables[0].statements[0].sql,
///     "INSERT INTO `counters` (`id`, `count`) VALUES (?, ?) AS NEW_VAL \
///      ON DUPLICATE KEY UPDATE `counters`.`count` = NEW_VAL.`count` + `counters`.`count`"
/// );
/// ```
#[derive(Debug, Clone)]
pub struct Mutation<'a> {
    schema: &'a TableSchema,
    op: MutationOp<'a>,
    includes: Vec<(String, Mutation<'a>)>,
}

/// Compilation switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompileOptions {
    /// Emit `VALUES ?` bound to a list of rows for uniform-shape
    /// insert/upsert batches instead of one statement per row.
    pub batch_rows: bool,
}

impl CompileOptions {
    /// Options with multi-row batching enabled.
    #[must_use]
    pub const fn batched() -> Self {
        Self { batch_rows: true }
    }
}

/// Statements for one table, in emission order.
#[derive(Debug, Clone, PartialEq)]
pub struct TableStatements {
    /// Table name.
    pub table: String,
    /// Whether the table's rows had differing field sets.
    pub needs_separate_statements: bool,
    /// Statements to execute.
    pub statements: Vec<Statement>,
}

/// Compiled mutation: statements grouped by table in first-seen order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MutationPlan {
    /// Per-table statement lists.
    pub tables: Vec<TableStatements>,
}

impl MutationPlan {
    /// All statements in execution order.
    pub fn statements(&self) -> impl Iterator<Item = &Statement> {
        self.tables.iter().flat_map(|t| t.statements.iter())
    }

    /// Total number of statements.
    #[must_use]
    pub fn statement_count(&self) -> usize {
        self.tables.iter().map(|t| t.statements.len()).sum()
    }

    /// Whether the plan must run inside a transaction to be all-or-nothing.
    #[must_use]
    pub fn requires_transaction(&self) -> bool {
        self.statement_count() > 1
    }

    /// Whether there is nothing to execute.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.statement_count() == 0
    }
}

/// One row's worth of compiled input.
#[derive(Debug)]
struct RowPlan {
    kind: MutationKind,
    fields: Vec<String>,
    values: Vec<SqlValue>,
    key_fields: Vec<String>,
    key_values: Vec<SqlValue>,
    non_key_fields: Vec<String>,
    non_key_values: Vec<SqlValue>,
    filter: Option<WhereClause>,
    source: Option<CompiledQuery>,
}

impl RowPlan {
    fn scoped(kind: MutationKind) -> Self {
        Self {
            kind,
            fields: Vec::new(),
            values: Vec::new(),
            key_fields: Vec::new(),
            key_values: Vec::new(),
            non_key_fields: Vec::new(),
            non_key_values: Vec::new(),
            filter: None,
            source: None,
        }
    }
}

#[derive(Debug)]
struct TableBatch {
    table: String,
    last_fields: Vec<String>,
    needs_separate_statements: bool,
    rows: Vec<RowPlan>,
}

/// Per-table row plans, shared across the whole descriptor tree.
#[derive(Debug, Default)]
struct Accumulator {
    batches: Vec<TableBatch>,
}

impl Accumulator {
    fn batch_mut(&mut self, table: &str) -> &mut TableBatch {
        let index = match self.batches.iter().position(|b| b.table == table) {
            Some(index) => index,
            None => {
                self.batches.push(TableBatch {
                    table: table.to_string(),
                    last_fields: Vec::new(),
                    needs_separate_statements: false,
                    rows: Vec::new(),
                });
                self.batches.len() - 1
            }
        };
        &mut self.batches[index]
    }
}

impl<'a> Mutation<'a> {
    /// Creates a mutation node.
    #[must_use]
    pub fn new(schema: &'a TableSchema, op: MutationOp<'a>) -> Self {
        Self {
            schema,
            op,
            includes: Vec::new(),
        }
    }

    /// `INSERT` of `rows`.
    #[must_use]
    pub fn insert(schema: &'a TableSchema, rows: Vec<Row>) -> Self {
        Self::new(schema, MutationOp::Insert(rows))
    }

    /// `UPDATE` of `rows`, each matched by its primary key.
    #[must_use]
    pub fn update(schema: &'a TableSchema, rows: Vec<Row>) -> Self {
        Self::new(schema, MutationOp::Update(rows))
    }

    /// Insert-or-replace of `rows`.
    #[must_use]
    pub fn upsert(schema: &'a TableSchema, rows: Vec<Row>) -> Self {
        Self::new(schema, MutationOp::Upsert(rows))
    }

    /// Insert-or-accumulate of `rows`.
    #[must_use]
    pub fn add_upsert(schema: &'a TableSchema, rows: Vec<Row>) -> Self {
        Self::new(schema, MutationOp::AddUpsert(rows))
    }

    /// `DELETE` of the rows identified by `keys`.
    #[must_use]
    pub fn delete(schema: &'a TableSchema, keys: Vec<Row>) -> Self {
        Self::new(schema, MutationOp::Delete(keys))
    }

    /// `UPDATE ... SET` on every row matching `filter`.
    #[must_use]
    pub fn set_update(schema: &'a TableSchema, set: Row, filter: Filter) -> Self {
        Self::new(schema, MutationOp::SetUpdate { set, filter })
    }

    /// `DELETE` of every row matching `filter`.
    #[must_use]
    pub fn set_delete(schema: &'a TableSchema, filter: Filter) -> Self {
        Self::new(schema, MutationOp::SetDelete(filter))
    }

    /// `INSERT INTO schema (columns) SELECT ...` from `from`.
    ///
    /// An empty `columns` inserts into every field of `schema`.
    #[must_use]
    pub fn set_insert(schema: &'a TableSchema, columns: &[&str], from: Find<'a>) -> Self {
        Self::new(
            schema,
            MutationOp::SetInsert {
                columns: columns.iter().map(|c| (*c).to_string()).collect(),
                from: Box::new(from),
            },
        )
    }

    /// Adds a mutation on a related table.
    #[must_use]
    pub fn include(mut self, key: &str, mutation: Mutation<'a>) -> Self {
        self.includes.push((key.to_string(), mutation));
        self
    }

    /// The target table.
    #[must_use]
    pub fn schema(&self) -> &'a TableSchema {
        self.schema
    }

    /// The operation.
    #[must_use]
    pub fn op(&self) -> &MutationOp<'a> {
        &self.op
    }

    /// Compiles with default options (one statement per row).
    pub fn compile(&self) -> Result<MutationPlan> {
        self.compile_with(CompileOptions::default())
    }

    /// Compiles the mutation tree into per-table statements.
    pub fn compile_with(&self, options: CompileOptions) -> Result<MutationPlan> {
        let mut acc = Accumulator::default();
        self.collect(&mut acc)?;

        let tables = acc
            .batches
            .into_iter()
            .filter(|batch| !batch.rows.is_empty())
            .map(|batch| emit_table(batch, options))
            .collect();
        Ok(MutationPlan { tables })
    }

    fn collect(&self, acc: &mut Accumulator) -> Result<()> {
        let schema = self.schema;
        let kind = self.op.kind();

        match &self.op {
            MutationOp::Insert(rows)
            | MutationOp::Update(rows)
            | MutationOp::Upsert(rows)
            | MutationOp::AddUpsert(rows)
            | MutationOp::Delete(rows) => {
                let batch = acc.batch_mut(schema.name());
                for row in rows {
                    let plan = plan_row(schema, kind, row)?;
                    if !batch.last_fields.is_empty() && batch.last_fields != plan.fields {
                        batch.needs_separate_statements = true;
                    }
                    batch.last_fields.clone_from(&plan.fields);
                    batch.rows.push(plan);
                }
            }
            MutationOp::SetUpdate { set, filter } => {
                if set.is_empty() {
                    return Err(CompileError::InvalidDescriptor(format!(
                        "SET_UPDATE on `{}` assigns no columns",
                        schema.name()
                    )));
                }
                let mut plan = RowPlan::scoped(kind);
                for (field, value) in set.iter() {
                    schema.check_field(field)?;
                    plan.fields.push(field.to_string());
                    plan.values.push(value.clone());
                }
                plan.filter = Some(compile_where(schema, filter)?);
                push_scoped(acc.batch_mut(schema.name()), plan);
            }
            MutationOp::SetDelete(filter) => {
                let mut plan = RowPlan::scoped(kind);
                plan.filter = Some(compile_where(schema, filter)?);
                push_scoped(acc.batch_mut(schema.name()), plan);
            }
            MutationOp::SetInsert { columns, from } => {
                let mut plan = RowPlan::scoped(kind);
                if columns.is_empty() {
                    plan.fields = schema.field_names().map(str::to_string).collect();
                } else {
                    for column in columns {
                        schema.check_field(column)?;
                    }
                    plan.fields.clone_from(columns);
                }
                plan.source = Some(from.build()?);
                push_scoped(acc.batch_mut(schema.name()), plan);
            }
        }

        for (_, include) in &self.includes {
            include.collect(acc)?;
        }
        Ok(())
    }
}

fn push_scoped(batch: &mut TableBatch, plan: RowPlan) {
    batch.last_fields.clear();
    batch.rows.push(plan);
}

/// Splits a data row into key and non-key parts and checks it against the
/// requirements of `kind`.
fn plan_row(schema: &TableSchema, kind: MutationKind, row: &Row) -> Result<RowPlan> {
    let table = schema.name();
    if row.is_empty() {
        return Err(CompileError::InvalidDescriptor(format!(
            "empty row for `{table}`"
        )));
    }

    let mut plan = RowPlan::scoped(kind);
    for (field, value) in row.iter() {
        schema.check_field(field)?;
        plan.fields.push(field.to_string());
        plan.values.push(value.clone());
        if schema.is_primary_key(field) {
            plan.key_fields.push(field.to_string());
            plan.key_values.push(value.clone());
        } else {
            plan.non_key_fields.push(field.to_string());
            plan.non_key_values.push(value.clone());
        }
    }

    if matches!(kind, MutationKind::Update | MutationKind::Delete) {
        let primary_key = schema.primary_key();
        let complete = !primary_key.is_empty()
            && primary_key
                .iter()
                .all(|pk| plan.key_fields.iter().any(|f| f == pk));
        if !complete {
            return Err(CompileError::MissingPrimaryKey {
                table: table.to_string(),
            });
        }
        if kind == MutationKind::Update && plan.non_key_fields.is_empty() {
            return Err(CompileError::InvalidDescriptor(format!(
                "UPDATE row for `{table}` has no column to set"
            )));
        }
        if kind == MutationKind::Delete && !plan.non_key_fields.is_empty() {
            return Err(CompileError::InvalidDescriptor(format!(
                "DELETE row for `{table}` carries non-key fields: {}",
                plan.non_key_fields.join(", ")
            )));
        }
    }
    Ok(plan)
}

fn emit_table(batch: TableBatch, options: CompileOptions) -> TableStatements {
    let table = batch.table;
    let batch_rows = options.batch_rows && !batch.needs_separate_statements;
    let mut statements: Vec<Statement> = Vec::new();

    for row in batch.rows {
        if batch_rows && row.kind.uses_values_list() {
            let sql = values_statement(&table, &row, "?");
            if let Some(last) = statements.last_mut() {
                if last.sql == sql {
                    if let Bind::Rows(rows) = &mut last.bind {
                        rows.push(row.values);
                        continue;
                    }
                }
            }
            statements.push(Statement::rows(sql, vec![row.values]));
        } else {
            statements.push(row_statement(&table, row));
        }
    }

    TableStatements {
        table,
        needs_separate_statements: batch.needs_separate_statements,
        statements,
    }
}

/// `INSERT` / upsert text with `values` in the `VALUES` slot.
fn values_statement(table: &str, row: &RowPlan, values: &str) -> String {
    let mut sql = format!(
        "INSERT INTO {} ({}) VALUES {values}",
        quote_identifier(table),
        quote_columns(&row.fields)
    );

    if matches!(row.kind, MutationKind::Upsert | MutationKind::AddUpsert) {
        let updated = if row.non_key_fields.is_empty() {
            &row.key_fields
        } else {
            &row.non_key_fields
        };
        let assignments = updated
            .iter()
            .map(|field| {
                let target = qualified(table, field);
                let incoming = format!("{NEW_ROW_ALIAS}.{}", quote_identifier(field));
                if row.kind == MutationKind::AddUpsert && !row.non_key_fields.is_empty() {
                    format!("{target} = {incoming} + {target}")
                } else {
                    format!("{target} = {incoming}")
                }
            })
            .collect::<Vec<_>>()
            .join(", ");
        sql.push_str(&format!(
            " AS {NEW_ROW_ALIAS} ON DUPLICATE KEY UPDATE {assignments}"
        ));
    }
    sql
}

fn row_statement(table: &str, row: RowPlan) -> Statement {
    let quoted = quote_identifier(table);
    match row.kind {
        MutationKind::Insert | MutationKind::Upsert | MutationKind::AddUpsert => {
            let marks = vec!["?"; row.values.len()].join(", ");
            let sql = values_statement(table, &row, &format!("({marks})"));
            Statement::values(sql, row.values)
        }
        MutationKind::Update => {
            let sql = format!(
                "UPDATE {quoted} SET {} WHERE {}",
                assignments(&row.non_key_fields, |f| quote_identifier(f)),
                key_match(table, &row.key_fields)
            );
            let mut params = row.non_key_values;
            params.extend(row.key_values);
            Statement::values(sql, params)
        }
        MutationKind::Delete => {
            let sql = format!(
                "DELETE FROM {quoted} WHERE {}",
                key_match(table, &row.key_fields)
            );
            Statement::values(sql, row.key_values)
        }
        MutationKind::SetUpdate => {
            let mut sql = format!(
                "UPDATE {quoted} SET {}",
                assignments(&row.fields, |f| qualified(table, f))
            );
            let mut params = row.values;
            if let Some(filter) = row.filter.filter(|f| !f.is_empty()) {
                sql.push_str(&format!(" WHERE {}", filter.to_sql()));
                params.extend(filter.params);
            }
            Statement::values(sql, params)
        }
        MutationKind::SetDelete => {
            let mut sql = format!("DELETE FROM {quoted}");
            let mut params = Vec::new();
            if let Some(filter) = row.filter.filter(|f| !f.is_empty()) {
                sql.push_str(&format!(" WHERE {}", filter.to_sql()));
                params = filter.params;
            }
            Statement::values(sql, params)
        }
        MutationKind::SetInsert => {
            let source = row.source.unwrap_or_else(|| CompiledQuery::raw(""));
            let sql = format!(
                "INSERT INTO {quoted} ({}) {}",
                quote_columns(&row.fields),
                source.sql
            );
            Statement::values(sql, source.params)
        }
    }
}

fn quote_columns(fields: &[String]) -> String {
    fields
        .iter()
        .map(|f| quote_identifier(f))
        .collect::<Vec<_>>()
        .join(", ")
}

fn assignments(fields: &[String], column: impl Fn(&str) -> String) -> String {
    fields
        .iter()
        .map(|f| format!("{} = ?", column(f.as_str())))
        .collect::<Vec<_>>()
        .join(", ")
}

fn key_match(table: &str, keys: &[String]) -> String {
    keys.iter()
        .map(|k| format!("{} = ?", qualified(table, k)))
        .collect::<Vec<_>>()
        .join(" AND ")
}
