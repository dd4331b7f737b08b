//! Statement execution.
//!
//! [`Executor`] is the single seam between compiled SQL and a database: run
//! one statement with positional values, or run several inside a
//! transaction. [`MySqlExecutor`] implements it on top of a sqlx pool.

use std::future::Future;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use oxide_mysql_core::{normalize, Row, SqlValue};
use sqlx::mysql::{MySqlArguments, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::query::Query;
use sqlx::{Column, MySql, Row as _, TypeInfo, ValueRef};
use tracing::debug;

use crate::error::Result;

/// Executes SQL text with positional `?` parameters.
pub trait Executor: Send + Sync {
    /// Open transaction handle.
    type Transaction: Send;

    /// Runs one statement outside any transaction and returns its rows.
    fn execute(
        &self,
        sql: &str,
        params: &[SqlValue],
    ) -> impl Future<Output = Result<Vec<Row>>> + Send;

    /// Starts a transaction.
    fn begin(&self) -> impl Future<Output = Result<Self::Transaction>> + Send;

    /// Runs one statement inside `tx`.
    fn execute_in(
        &self,
        tx: &mut Self::Transaction,
        sql: &str,
        params: &[SqlValue],
    ) -> impl Future<Output = Result<Vec<Row>>> + Send;

    /// Commits `tx`.
    fn commit(&self, tx: Self::Transaction) -> impl Future<Output = Result<()>> + Send;

    /// Rolls back `tx`.
    fn rollback(&self, tx: Self::Transaction) -> impl Future<Output = Result<()>> + Send;
}

/// [`Executor`] backed by a MySQL connection pool.
#[derive(Debug, Clone)]
pub struct MySqlExecutor {
    pool: MySqlPool,
}

impl MySqlExecutor {
    /// Wraps an existing pool.
    #[must_use]
    pub const fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Connects to `url` with at most `max_connections` connections.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Creates a pool that connects on first use.
    pub fn connect_lazy(url: &str, max_connections: u32) -> Result<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(max_connections)
            .connect_lazy(url)?;
        Ok(Self::new(pool))
    }

    /// Returns the underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}

impl Executor for MySqlExecutor {
    type Transaction = sqlx::Transaction<'static, MySql>;

    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>> {
        debug!(sql = %sql, params = params.len(), "Executing SQL");
        let rows = bind_all(sqlx::query(sql), params)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(decode_row).collect()
    }

    async fn begin(&self) -> Result<Self::Transaction> {
        Ok(self.pool.begin().await?)
    }

    async fn execute_in(
        &self,
        tx: &mut Self::Transaction,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<Vec<Row>> {
        debug!(sql = %sql, params = params.len(), "Executing SQL in transaction");
        let rows = bind_all(sqlx::query(sql), params)
            .fetch_all(&mut **tx)
            .await?;
        rows.iter().map(decode_row).collect()
    }

    async fn commit(&self, tx: Self::Transaction) -> Result<()> {
        Ok(tx.commit().await?)
    }

    async fn rollback(&self, tx: Self::Transaction) -> Result<()> {
        Ok(tx.rollback().await?)
    }
}

fn bind_all<'q>(
    mut query: Query<'q, MySql, MySqlArguments>,
    params: &[SqlValue],
) -> Query<'q, MySql, MySqlArguments> {
    for value in params {
        query = match value {
            SqlValue::Null => query.bind(None::<String>),
            SqlValue::Bool(b) => query.bind(*b),
            SqlValue::Int(i) => query.bind(*i),
            SqlValue::UInt(u) => query.bind(*u),
            SqlValue::Float(f) => query.bind(*f),
            SqlValue::Text(s) => query.bind(s.clone()),
            SqlValue::Blob(b) => query.bind(b.clone()),
        };
    }
    query
}

/// Decodes a result row into field/value pairs, in column order.
fn decode_row(row: &MySqlRow) -> Result<Row> {
    let mut out = Row::new();
    for (index, column) in row.columns().iter().enumerate() {
        let value = if row.try_get_raw(index)?.is_null() {
            SqlValue::Null
        } else {
            decode_value(row, index, column.type_info().name())?
        };
        out.insert(column.name(), value);
    }
    Ok(out)
}

fn decode_value(row: &MySqlRow, index: usize, type_name: &str) -> Result<SqlValue> {
    let value = match type_name {
        "BOOLEAN" => SqlValue::Bool(row.try_get::<bool, _>(index)?),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" => {
            SqlValue::Int(row.try_get_unchecked::<i64, _>(index)?)
        }
        name if name.ends_with("UNSIGNED") => {
            SqlValue::UInt(row.try_get_unchecked::<u64, _>(index)?)
        }
        "FLOAT" => SqlValue::Float(f64::from(row.try_get::<f32, _>(index)?)),
        "DOUBLE" => SqlValue::Float(row.try_get::<f64, _>(index)?),
        "DATETIME" | "TIMESTAMP" => normalize(row.try_get::<NaiveDateTime, _>(index)?),
        "DATE" => normalize(row.try_get::<NaiveDate, _>(index)?),
        "TIME" => SqlValue::Text(row.try_get::<NaiveTime, _>(index)?.to_string()),
        "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BINARY" | "VARBINARY" => {
            SqlValue::Blob(row.try_get::<Vec<u8>, _>(index)?)
        }
        _ => SqlValue::Text(row.try_get_unchecked::<String, _>(index)?),
    };
    Ok(value)
}
