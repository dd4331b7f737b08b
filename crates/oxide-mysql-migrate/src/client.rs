//! Query and mutation client.
//!
//! [`Client`] runs compiled queries, and runs compiled mutation plans as a
//! single all-or-nothing transaction. Errors from the executor are logged
//! and returned as-is; nothing is retried here.

use oxide_mysql_core::{CompileOptions, CompiledQuery, Find, Mutation, MutationPlan, Row};
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::executor::Executor;

/// Runs compiled statements through an [`Executor`].
#[derive(Debug, Clone)]
pub struct Client<E: Executor> {
    executor: E,
}

impl<E: Executor> Client<E> {
    /// Creates a client.
    pub const fn new(executor: E) -> Self {
        Self { executor }
    }

    /// Returns the executor.
    pub const fn executor(&self) -> &E {
        &self.executor
    }

    /// Runs one compiled query.
    pub async fn query(&self, query: &CompiledQuery) -> Result<Vec<Row>> {
        match self.executor.execute(&query.sql, &query.params).await {
            Ok(rows) => {
                debug!(sql = %query.sql, rows = rows.len(), "Query succeeded");
                Ok(rows)
            }
            Err(e) => {
                error!(sql = %query.sql, error = %e, "Query failed");
                Err(e)
            }
        }
    }

    /// Compiles and runs a [`Find`].
    pub async fn find(&self, find: &Find<'_>) -> Result<Vec<Row>> {
        let query = find.build()?;
        self.query(&query).await
    }

    /// Compiles and runs a [`Mutation`]; returns the number of statements run.
    pub async fn mutate(&self, mutation: &Mutation<'_>, options: CompileOptions) -> Result<usize> {
        let plan = mutation.compile_with(options)?;
        self.run(&plan).await
    }

    /// Runs every statement of `plan` in one transaction.
    ///
    /// Commits when all statements succeed; otherwise rolls back and returns
    /// the first error.
    pub async fn run(&self, plan: &MutationPlan) -> Result<usize> {
        if plan.is_empty() {
            return Ok(0);
        }

        let mut tx = self.transaction().await?;
        match tx.run(plan).await {
            Ok(count) => {
                tx.commit().await?;
                info!(statements = count, tables = plan.tables.len(), "Mutation committed");
                Ok(count)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "Rollback failed");
                }
                Err(e)
            }
        }
    }

    /// Opens a transaction for callers that interleave their own statements.
    pub async fn transaction(&self) -> Result<Transaction<'_, E>> {
        let tx = self.executor.begin().await?;
        Ok(Transaction {
            executor: &self.executor,
            tx,
        })
    }
}

/// An open transaction. Dropping it without committing leaves the outcome to
/// the executor (sqlx rolls back).
pub struct Transaction<'c, E: Executor> {
    executor: &'c E,
    tx: E::Transaction,
}

impl<E: Executor> Transaction<'_, E> {
    /// Runs one compiled query inside the transaction.
    pub async fn query(&mut self, query: &CompiledQuery) -> Result<Vec<Row>> {
        self.executor
            .execute_in(&mut self.tx, &query.sql, &query.params)
            .await
            .inspect_err(|e| error!(sql = %query.sql, error = %e, "Statement failed"))
    }

    /// Runs every statement of `plan`, expanding batched rows.
    pub async fn run(&mut self, plan: &MutationPlan) -> Result<usize> {
        let mut count = 0;
        for table in &plan.tables {
            debug!(
                table = %table.table,
                statements = table.statements.len(),
                separate = table.needs_separate_statements,
                "Writing table"
            );
            for statement in &table.statements {
                self.query(&statement.expand()).await?;
                count += 1;
            }
        }
        Ok(count)
    }

    /// Commits.
    pub async fn commit(self) -> Result<()> {
        self.executor.commit(self.tx).await
    }

    /// Rolls back.
    pub async fn rollback(self) -> Result<()> {
        self.executor.rollback(self.tx).await
    }
}
