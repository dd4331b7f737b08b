//! Error types for execution and migration.

use oxide_mysql_core::CompileError;

/// Errors raised while executing statements or migrating a schema.
#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    /// A descriptor or schema failed to compile.
    #[error("Compile error: {0}")]
    Compile(#[from] CompileError),

    /// Database error, passed through from the driver.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Opaque error from a non-sqlx executor.
    #[error("Execution error: {0}")]
    Execution(String),

    /// IO error (reading schema or snapshot files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A DDL statement failed during migration.
    #[error("Migration step '{step}' failed on table '{table}': {message}")]
    MigrationStep {
        /// Table being migrated.
        table: String,
        /// Step that failed (e.g. "drop table").
        step: String,
        /// Error reported by the executor.
        message: String,
    },
}

/// Result type for execution and migration.
pub type Result<T> = std::result::Result<T, MigrateError>;
