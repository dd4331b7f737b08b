//! Snapshot-driven MySQL migrations and query execution.
//!
//! `oxide-mysql-migrate` runs what `oxide-mysql-core` compiles:
//! - **Executor** - the seam to the database, with a sqlx MySQL implementation
//! - **Client** - runs `Find` queries and runs `Mutation` plans in one
//!   transaction
//! - **Migrator** - compares declared tables with the last saved snapshot and
//!   rebuilds the tables that changed
//! - **Snapshot** - where the last applied schema is kept (a JSON file by
//!   default)
//!
//! # Example
//!
//! ```rust,ignore
//! use oxide_mysql_migrate::prelude::*;
//!
//! let executor = MySqlExecutor::connect("mysql://root@localhost/test", 5).await?;
//! let migrator = SchemaMigrator::new(executor.clone(), JsonFileStore::new("db_schema.json"));
//! let report = migrator.migrate(&groups).await?;
//!
//! let client = Client::new(executor);
//! let rows = client.find(&Find::new(&users)).await?;
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # Show which tables differ from the snapshot
//! oxide-mysql --schema schema.json diff
//!
//! # Print the DDL a migration would run
//! oxide-mysql --schema schema.json migrate --dry-run
//!
//! # Apply it
//! oxide-mysql --schema schema.json migrate
//! ```

pub mod client;
pub mod error;
pub mod executor;
pub mod migrator;
pub mod snapshot;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::client::{Client, Transaction};
    pub use crate::error::{MigrateError, Result};
    pub use crate::executor::{Executor, MySqlExecutor};
    pub use crate::migrator::{MigrationReport, SchemaMigrator};
    pub use crate::snapshot::{JsonFileStore, MemoryStore, Snapshot, SnapshotStore};
    pub use oxide_mysql_core::{
        CompileOptions, Filter, Find, Mutation, MutationPlan, Row, SchemaGroup, SqlValue,
        TableSchema,
    };
}
