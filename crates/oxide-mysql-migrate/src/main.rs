//! oxide-mysql CLI
//!
//! Applies a declared MySQL schema against the last saved snapshot.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use oxide_mysql_core::ddl::{create_foreign_keys, create_table};
use oxide_mysql_migrate::prelude::*;

/// Schema-driven MySQL migrations.
#[derive(Parser)]
#[command(name = "oxide-mysql")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database URL.
    #[arg(short, long, env = "DATABASE_URL", default_value = "mysql://root@localhost/test")]
    database: String,

    /// Maximum pool connections.
    #[arg(long, default_value_t = 5)]
    max_connections: u32,

    /// JSON file holding the declared schema groups.
    #[arg(short, long)]
    schema: PathBuf,

    /// Snapshot of the last applied schema.
    #[arg(long, default_value = "db_schema.json")]
    snapshot: PathBuf,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild every table that differs from the snapshot.
    Migrate {
        /// Show SQL without executing (dry run).
        #[arg(long)]
        dry_run: bool,
    },

    /// List tables that differ from the snapshot.
    Diff,

    /// Print the DDL of every declared table.
    Sql,
}

fn load_groups(path: &Path) -> anyhow::Result<Vec<SchemaGroup>> {
    let content = std::fs::read_to_string(path)?;
    let groups: Vec<SchemaGroup> = serde_json::from_str(&content)?;
    for table in groups.iter().flat_map(|g| g.tables.iter()) {
        table.validate()?;
    }
    Ok(groups)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let groups = load_groups(&cli.schema)?;
    let store = JsonFileStore::new(&cli.snapshot);

    // The pool only connects once a statement runs.
    let executor = MySqlExecutor::connect_lazy(&cli.database, cli.max_connections)?;

    match cli.command {
        Commands::Migrate { dry_run } => {
            if dry_run {
                info!("Dry run mode - SQL will be printed but not executed.");
            }
            let migrator = SchemaMigrator::new(executor, store).dry_run(dry_run);
            let report = migrator.migrate(&groups).await?;

            if dry_run {
                for sql in &report.statements {
                    println!("{sql};");
                }
            }
            for failure in &report.failures {
                warn!("{failure}");
            }
            info!(
                created = report.created.len(),
                unchanged = report.unchanged.len(),
                "Done."
            );
        }

        Commands::Diff => {
            let migrator = SchemaMigrator::new(executor, store);
            let changed = migrator.diff(&groups);
            if changed.is_empty() {
                info!("No changes detected.");
            }
            for table in changed {
                println!("{table}");
            }
        }

        Commands::Sql => {
            for group in &groups {
                for table in &group.tables {
                    println!("{};\n", create_table(table));
                }
                for table in &group.tables {
                    for sql in create_foreign_keys(table) {
                        println!("{sql};");
                    }
                }
            }
        }
    }

    Ok(())
}
