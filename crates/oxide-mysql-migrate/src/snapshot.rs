//! Persisted schema snapshots.
//!
//! A snapshot maps each table name to the last schema applied for it. The
//! migrator loads it once, compares it with the declared schema and saves it
//! back after a pass that changed something.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use oxide_mysql_core::TableSchema;
use tracing::{debug, warn};

use crate::error::Result;

/// Last-applied schema per table name.
pub type Snapshot = BTreeMap<String, TableSchema>;

/// Where snapshots are loaded from and saved to.
pub trait SnapshotStore {
    /// Loads the snapshot. A missing or unreadable snapshot is empty.
    fn load(&self) -> Snapshot;

    /// Replaces the stored snapshot.
    fn save(&self, snapshot: &Snapshot) -> Result<()>;
}

/// Snapshot stored as a JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Creates a store at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotStore for JsonFileStore {
    fn load(&self) -> Snapshot {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No snapshot yet");
                return Snapshot::new();
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Cannot read snapshot, starting empty");
                return Snapshot::new();
            }
        };
        serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!(path = %self.path.display(), error = %e, "Cannot parse snapshot, starting empty");
            Snapshot::new()
        })
    }

    fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let json = serde_json::to_string_pretty(snapshot)?;
        std::fs::write(&self.path, json)?;
        debug!(path = %self.path.display(), tables = snapshot.len(), "Snapshot saved");
        Ok(())
    }
}

/// In-memory snapshot, for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshot: Mutex<Snapshot>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding `snapshot`.
    #[must_use]
    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        Self {
            snapshot: Mutex::new(snapshot),
        }
    }
}

impl SnapshotStore for MemoryStore {
    fn load(&self) -> Snapshot {
        self.snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn save(&self, snapshot: &Snapshot) -> Result<()> {
        *self.snapshot.lock().unwrap_or_else(PoisonError::into_inner) = snapshot.clone();
        Ok(())
    }
}
