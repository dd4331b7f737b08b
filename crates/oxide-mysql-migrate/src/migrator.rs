//! Snapshot-driven schema migration.
//!
//! Each declared table is compared with its entry in the last saved
//! snapshot. Tables that differ are rebuilt: their previous foreign keys and
//! the keys other tables hold on them are dropped, then the table is dropped
//! and created again. Foreign keys are added in a second pass once every
//! table of the group exists. Failed steps are logged and reported but never
//! stop the run.

use std::collections::HashSet;

use oxide_mysql_core::ddl::{
    create_foreign_key, create_foreign_keys, create_table, drop_foreign_key, drop_foreign_keys,
    drop_table, drop_table_if_exists,
};
use oxide_mysql_core::{SchemaGroup, TableSchema};
use tracing::{debug, info, warn};

use crate::error::{MigrateError, Result};
use crate::executor::Executor;
use crate::snapshot::{Snapshot, SnapshotStore};

/// Outcome of a migration run.
#[derive(Debug, Default)]
pub struct MigrationReport {
    /// Tables (re)created, in declaration order.
    pub created: Vec<String>,
    /// Tables whose definition matched the snapshot.
    pub unchanged: Vec<String>,
    /// Every DDL statement attempted (or printed, in dry-run mode).
    pub statements: Vec<String>,
    /// Steps that failed; always [`MigrateError::MigrationStep`].
    pub failures: Vec<MigrateError>,
}

impl MigrationReport {
    /// Whether every attempted step succeeded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Applies declared schema groups against a snapshot.
pub struct SchemaMigrator<E: Executor, S: SnapshotStore> {
    executor: E,
    store: S,
    dry_run: bool,
}

impl<E: Executor, S: SnapshotStore> SchemaMigrator<E, S> {
    /// Creates a migrator.
    pub const fn new(executor: E, store: S) -> Self {
        Self {
            executor,
            store,
            dry_run: false,
        }
    }

    /// Enables dry-run mode (DDL is reported but not executed, and the
    /// snapshot is left untouched).
    #[must_use]
    pub const fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// Returns the executor.
    pub const fn executor(&self) -> &E {
        &self.executor
    }

    /// Returns the snapshot store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Names of declared tables that differ from the stored snapshot.
    #[must_use]
    pub fn diff(&self, groups: &[SchemaGroup]) -> Vec<String> {
        let snapshot = self.store.load();
        groups
            .iter()
            .flat_map(|g| g.tables.iter())
            .filter(|table| is_changed(&snapshot, table))
            .map(|table| table.name().to_string())
            .collect()
    }

    /// Runs the migration over every group, in order.
    ///
    /// Schema validation errors abort before any DDL runs. DDL failures are
    /// collected in the report.
    pub async fn migrate(&self, groups: &[SchemaGroup]) -> Result<MigrationReport> {
        for table in groups.iter().flat_map(|g| g.tables.iter()) {
            table.validate()?;
        }

        let mut snapshot = self.store.load();
        let mut report = MigrationReport::default();

        for group in groups {
            self.migrate_group(group, &mut snapshot, &mut report).await;
        }

        if !self.dry_run && !report.created.is_empty() {
            self.store.save(&snapshot)?;
        }

        info!(
            created = report.created.len(),
            unchanged = report.unchanged.len(),
            failures = report.failures.len(),
            dry_run = self.dry_run,
            "Migration finished"
        );
        Ok(report)
    }

    async fn migrate_group(
        &self,
        group: &SchemaGroup,
        snapshot: &mut Snapshot,
        report: &mut MigrationReport,
    ) {
        let mut changed: Vec<&TableSchema> = Vec::new();
        for table in &group.tables {
            if is_changed(snapshot, table) {
                changed.push(table);
            } else {
                debug!(table = %table.name(), "Table unchanged");
                report.unchanged.push(table.name().to_string());
            }
        }
        if changed.is_empty() {
            return;
        }

        // Every constraint touching a rebuilt table goes before any table is
        // dropped.
        for table in &changed {
            if let Some(previous) = snapshot.get(table.name()) {
                for sql in drop_foreign_keys(previous) {
                    self.step(table.name(), "drop foreign key", sql, report)
                        .await;
                }
            }
        }
        let mut detached = Vec::new();
        for key in inbound_foreign_keys(snapshot, &changed) {
            if self
                .step(&key.table, "drop foreign key", key.drop.clone(), report)
                .await
            {
                detached.push(key);
            }
        }

        let mut created: Vec<&TableSchema> = Vec::new();
        for &table in &changed {
            let name = table.name();
            info!(table = %name, "Rebuilding table");
            let drop = match snapshot.get(name) {
                Some(previous) => drop_table(previous),
                None => drop_table_if_exists(table),
            };
            self.step(name, "drop table", drop, report).await;
            if self
                .step(name, "create table", create_table(table), report)
                .await
            {
                created.push(table);
            }
        }

        for table in &created {
            for sql in create_foreign_keys(table) {
                self.step(table.name(), "create foreign key", sql, report)
                    .await;
            }
        }
        for key in detached {
            self.step(&key.table, "create foreign key", key.create, report)
                .await;
        }

        for table in created {
            snapshot.insert(table.name().to_string(), table.clone());
            report.created.push(table.name().to_string());
        }
    }

    /// Runs one DDL statement; returns whether it succeeded.
    async fn step(
        &self,
        table: &str,
        step: &str,
        sql: String,
        report: &mut MigrationReport,
    ) -> bool {
        debug!(table = %table, sql = %sql, "Executing DDL");
        if self.dry_run {
            report.statements.push(sql);
            return true;
        }

        let outcome = self.executor.execute(&sql, &[]).await;
        report.statements.push(sql);
        match outcome {
            Ok(_) => true,
            Err(e) => {
                warn!(table = %table, step = %step, error = %e, "Migration step failed, continuing");
                report.failures.push(MigrateError::MigrationStep {
                    table: table.to_string(),
                    step: step.to_string(),
                    message: e.to_string(),
                });
                false
            }
        }
    }
}

/// A foreign key held by a table that is not rebuilt, pointing at one that is.
struct InboundKey {
    table: String,
    drop: String,
    create: String,
}

/// Foreign keys in `snapshot` that reference a previously applied table of
/// `changed` from a table outside `changed`.
fn inbound_foreign_keys(snapshot: &Snapshot, changed: &[&TableSchema]) -> Vec<InboundKey> {
    let rebuilt: HashSet<&str> = changed.iter().map(|t| t.name()).collect();
    let targets: HashSet<&str> = rebuilt
        .iter()
        .copied()
        .filter(|name| snapshot.contains_key(*name))
        .collect();

    snapshot
        .values()
        .filter(|table| !rebuilt.contains(table.name()))
        .flat_map(|table| {
            table
                .foreign_keys()
                .filter(|(_, fk)| targets.contains(fk.table.as_str()))
                .map(|(field, fk)| InboundKey {
                    table: table.name().to_string(),
                    drop: drop_foreign_key(table.name(), fk),
                    create: create_foreign_key(table.name(), field, fk),
                })
        })
        .collect()
}

fn is_changed(snapshot: &Snapshot, table: &TableSchema) -> bool {
    snapshot.get(table.name()) != Some(table)
}
