#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use oxide_mysql_core::schema::{DbType, FieldDefinition, ForeignKey, ForeignKeyAction};
use oxide_mysql_core::{Row, SchemaGroup, SqlValue, TableSchema};
use oxide_mysql_migrate::error::{MigrateError, Result};
use oxide_mysql_migrate::executor::Executor;

/// Executor that records every statement and keeps inserted rows in memory.
///
/// Understands `INSERT INTO ... VALUES` (rows are stored) and
/// `SELECT ... FROM` (every stored row of the table is returned). DDL is
/// checked like MySQL would: a table cannot be created twice, dropped while
/// another table's foreign key references it, and a constraint must exist to
/// be dropped. Any statement containing the failure pattern is refused.
#[derive(Default)]
pub struct RecordingExecutor {
    log: Mutex<Vec<(String, Vec<SqlValue>)>>,
    tables: Mutex<BTreeMap<String, Vec<Row>>>,
    catalog: Mutex<Catalog>,
    fail_on: Option<String>,
    commits: Mutex<usize>,
    rollbacks: Mutex<usize>,
}

/// Existing tables and foreign-key constraints.
#[derive(Default)]
struct Catalog {
    tables: BTreeSet<String>,
    /// (table, constraint, referenced table)
    constraints: Vec<(String, String, String)>,
}

impl Catalog {
    fn apply(&mut self, sql: &str) -> std::result::Result<(), String> {
        if let Some(rest) = sql.strip_prefix("CREATE TABLE `") {
            let table = first_identifier(rest)?;
            if !self.tables.insert(table.clone()) {
                return Err(format!("table `{table}` already exists"));
            }
        } else if let Some(rest) = sql.strip_prefix("DROP TABLE IF EXISTS `") {
            let table = first_identifier(rest)?;
            self.drop_table(&table, true)?;
        } else if let Some(rest) = sql.strip_prefix("DROP TABLE `") {
            let table = first_identifier(rest)?;
            self.drop_table(&table, false)?;
        } else if let Some(rest) = sql.strip_prefix("ALTER TABLE `") {
            let parts: Vec<&str> = rest.split('`').collect();
            // table, " ADD|DROP CONSTRAINT ", name, ..., referenced table
            let (table, action, name) = (parts[0], parts[1], parts[2]);
            if action.contains("DROP CONSTRAINT") {
                let before = self.constraints.len();
                self.constraints
                    .retain(|(t, n, _)| !(t == table && n == name));
                if self.constraints.len() == before {
                    return Err(format!("no constraint `{name}` on `{table}`"));
                }
            } else {
                let target = parts[6].to_string();
                if !self.tables.contains(&target) {
                    return Err(format!("referenced table `{target}` does not exist"));
                }
                self.constraints
                    .push((table.to_string(), name.to_string(), target));
            }
        }
        Ok(())
    }

    fn drop_table(&mut self, table: &str, if_exists: bool) -> std::result::Result<(), String> {
        if !self.tables.contains(table) {
            return if if_exists {
                Ok(())
            } else {
                Err(format!("unknown table `{table}`"))
            };
        }
        if let Some((holder, name, _)) = self
            .constraints
            .iter()
            .find(|(t, _, target)| target == table && t != table)
        {
            return Err(format!("`{holder}` references `{table}` through `{name}`"));
        }
        self.tables.remove(table);
        self.constraints.retain(|(t, _, _)| t != table);
        Ok(())
    }
}

fn first_identifier(rest: &str) -> std::result::Result<String, String> {
    rest.split('`')
        .next()
        .map(str::to_string)
        .ok_or_else(|| format!("no identifier in {rest}"))
}

/// Statements buffered until commit.
#[derive(Default)]
pub struct PendingWrites {
    statements: Vec<(String, Vec<SqlValue>)>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(pattern: &str) -> Self {
        Self {
            fail_on: Some(pattern.to_string()),
            ..Self::default()
        }
    }

    pub fn statements(&self) -> Vec<String> {
        self.log.lock().unwrap().iter().map(|(sql, _)| sql.clone()).collect()
    }

    pub fn params(&self) -> Vec<Vec<SqlValue>> {
        self.log.lock().unwrap().iter().map(|(_, p)| p.clone()).collect()
    }

    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.tables
            .lock()
            .unwrap()
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    pub fn has_table(&self, table: &str) -> bool {
        self.catalog.lock().unwrap().tables.contains(table)
    }

    pub fn constraints(&self) -> Vec<String> {
        self.catalog
            .lock()
            .unwrap()
            .constraints
            .iter()
            .map(|(_, name, _)| name.clone())
            .collect()
    }

    pub fn commits(&self) -> usize {
        *self.commits.lock().unwrap()
    }

    pub fn rollbacks(&self) -> usize {
        *self.rollbacks.lock().unwrap()
    }

    fn record(&self, sql: &str, params: &[SqlValue]) -> Result<()> {
        self.log
            .lock()
            .unwrap()
            .push((sql.to_string(), params.to_vec()));
        match &self.fail_on {
            Some(pattern) if sql.contains(pattern.as_str()) => {
                Err(MigrateError::Execution(format!("refused: {sql}")))
            }
            _ => Ok(()),
        }
    }

    fn apply(&self, sql: &str, params: &[SqlValue]) -> Vec<Row> {
        if let Some((table, columns)) = parse_insert(sql) {
            let mut tables = self.tables.lock().unwrap();
            let stored = tables.entry(table).or_default();
            for chunk in params.chunks(columns.len().max(1)) {
                stored.push(
                    columns
                        .iter()
                        .cloned()
                        .zip(chunk.iter().cloned())
                        .collect(),
                );
            }
            return Vec::new();
        }
        if let Some(table) = parse_select(sql) {
            return self.rows(&table);
        }
        Vec::new()
    }
}

impl Executor for RecordingExecutor {
    type Transaction = PendingWrites;

    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>> {
        self.record(sql, params)?;
        self.catalog
            .lock()
            .unwrap()
            .apply(sql)
            .map_err(MigrateError::Execution)?;
        Ok(self.apply(sql, params))
    }

    async fn begin(&self) -> Result<PendingWrites> {
        Ok(PendingWrites::default())
    }

    async fn execute_in(
        &self,
        tx: &mut PendingWrites,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<Vec<Row>> {
        self.record(sql, params)?;
        if parse_select(sql).is_some() {
            return Ok(self.apply(sql, params));
        }
        tx.statements.push((sql.to_string(), params.to_vec()));
        Ok(Vec::new())
    }

    async fn commit(&self, tx: PendingWrites) -> Result<()> {
        for (sql, params) in &tx.statements {
            self.apply(sql, params);
        }
        *self.commits.lock().unwrap() += 1;
        Ok(())
    }

    async fn rollback(&self, _tx: PendingWrites) -> Result<()> {
        *self.rollbacks.lock().unwrap() += 1;
        Ok(())
    }
}

/// `INSERT INTO `t` (`a`, `b`) VALUES ...` -> (`t`, [a, b]).
fn parse_insert(sql: &str) -> Option<(String, Vec<String>)> {
    let rest = sql.strip_prefix("INSERT INTO `")?;
    if !sql.contains(" VALUES ") {
        return None;
    }
    let (table, rest) = rest.split_once('`')?;
    let open = rest.find('(')?;
    let close = rest.find(')')?;
    let columns = rest[open + 1..close]
        .split(", ")
        .map(|c| c.trim_matches('`').to_string())
        .collect();
    Some((table.to_string(), columns))
}

fn parse_select(sql: &str) -> Option<String> {
    if !sql.starts_with("SELECT ") {
        return None;
    }
    let (_, rest) = sql.split_once(" FROM `")?;
    let (table, _) = rest.split_once('`')?;
    Some(table.to_string())
}

pub fn artists() -> TableSchema {
    TableSchema::new("artists")
        .field(
            FieldDefinition::new("artist_id", DbType::Int)
                .unsigned()
                .not_null()
                .auto_increment()
                .primary_key(),
        )
        .field(FieldDefinition::new("name", DbType::Varchar).size(100).not_null())
}

pub fn albums() -> TableSchema {
    TableSchema::new("albums")
        .field(
            FieldDefinition::new("album_id", DbType::Int)
                .unsigned()
                .not_null()
                .auto_increment()
                .primary_key(),
        )
        .field(FieldDefinition::new("title", DbType::Varchar).size(200).not_null())
        .field(
            FieldDefinition::new("artist_id", DbType::Int)
                .unsigned()
                .not_null()
                .index()
                .foreign_key(
                    ForeignKey::new("artists", "artist_id").on_delete(ForeignKeyAction::Cascade),
                ),
        )
}

pub fn catalog() -> Vec<SchemaGroup> {
    vec![SchemaGroup::new().table(artists()).table(albums())]
}
