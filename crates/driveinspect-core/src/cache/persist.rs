//! Cache snapshot load and dump.
//!
//! The snapshot is a pretty-printed JSON document with sorted keys, so a
//! rewrite of an unchanged cache produces the same bytes apart from the
//! `written_at` stamp. Writes happen only when the cache is dirty, and go
//! through a temporary file in the target directory that is renamed over
//! the old one.
//!
//! Nothing in this module is fatal to the caller: an unreadable store
//! starts an empty cache, a failed write is logged and reported.

use super::{CacheState, DriveCache, NodeRegistry, PathTable, RegistryEntry};
use crate::node::NodeId;
use crate::remote::DriveService;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// Current snapshot schema version.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum PersistError {
    #[error("I/O error on cache file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Cache document is malformed: {0}")]
    Format(#[from] serde_json::Error),

    #[error("Atomic write to '{path}' failed: {reason}")]
    AtomicWrite { path: PathBuf, reason: String },

    #[error("Unsupported cache schema version {found}")]
    UnsupportedVersion { found: u32 },
}

/// The persisted form of a [`CacheState`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSnapshot {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub written_at: Option<DateTime<Utc>>,
    #[serde(default = "default_cwd")]
    pub cwd: String,
    #[serde(default)]
    pub dirty: bool,
    #[serde(default)]
    pub metadata: BTreeMap<NodeId, RegistryEntry>,
    #[serde(default)]
    pub path: BTreeMap<NodeId, String>,
}

fn default_version() -> u32 {
    SNAPSHOT_VERSION
}

fn default_cwd() -> String {
    "/".to_string()
}

impl CacheSnapshot {
    pub fn from_state(state: &CacheState) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            written_at: Some(Utc::now()),
            cwd: state.cwd.clone(),
            dirty: state.dirty,
            metadata: state.registry.entries().clone(),
            path: state.paths.entries().clone(),
        }
    }

    /// Rebuild a clean state. Reference counts start from zero.
    pub fn into_state(self) -> CacheState {
        CacheState {
            registry: NodeRegistry::from_entries(self.metadata),
            paths: PathTable::from_entries(self.path),
            cwd: self.cwd,
            dirty: false,
        }
    }
}

/// A snapshot as read back from a store.
#[derive(Debug, Clone)]
pub struct StoredSnapshot {
    pub snapshot: CacheSnapshot,
    /// Modification time of the stored document, when the store knows it.
    pub modified: Option<DateTime<Utc>>,
}

/// Stable storage for cache snapshots.
pub trait CacheStore {
    /// The stored snapshot, or `None` if nothing was stored yet.
    fn read(&self) -> Result<Option<StoredSnapshot>, PersistError>;

    /// Replace the stored snapshot.
    fn write(&mut self, snapshot: &CacheSnapshot) -> Result<(), PersistError>;

    /// Human-readable location, for logs and status.
    fn location(&self) -> String;
}

/// Snapshot kept in a JSON file on the local filesystem.
#[derive(Debug, Clone)]
pub struct FileCacheStore {
    path: PathBuf,
}

impl FileCacheStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: io::Error) -> PersistError {
        PersistError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl CacheStore for FileCacheStore {
    fn read(&self) -> Result<Option<StoredSnapshot>, PersistError> {
        let metadata = match fs::metadata(&self.path) {
            Ok(m) => m,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };
        let modified = metadata.modified().ok().map(DateTime::<Utc>::from);

        let text = fs::read_to_string(&self.path).map_err(|e| self.io_error(e))?;
        let snapshot: CacheSnapshot = serde_json::from_str(&text)?;
        if snapshot.version > SNAPSHOT_VERSION {
            return Err(PersistError::UnsupportedVersion {
                found: snapshot.version,
            });
        }
        Ok(Some(StoredSnapshot { snapshot, modified }))
    }

    fn write(&mut self, snapshot: &CacheSnapshot) -> Result<(), PersistError> {
        let mut document = serde_json::to_string_pretty(snapshot)?;
        document.push('\n');

        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent).map_err(|e| self.io_error(e))?;

        // Temp file in the same directory keeps the rename on one filesystem
        let mut temp_file = tempfile::NamedTempFile::new_in(&parent).map_err(|e| self.io_error(e))?;
        temp_file
            .write_all(document.as_bytes())
            .map_err(|e| self.io_error(e))?;
        temp_file
            .persist(&self.path)
            .map_err(|e| PersistError::AtomicWrite {
                path: self.path.clone(),
                reason: format!("Failed to persist temp file: {e}"),
            })?;
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// Result of [`DriveCache::load`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded { nodes: usize, paths: usize },
    /// No snapshot stored yet.
    Empty,
    /// The stored snapshot could not be used; the cache starts empty.
    Recovered { reason: String },
}

/// Result of [`DriveCache::dump`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DumpOutcome {
    Written { nodes: usize },
    /// Nothing changed since the last load.
    Clean,
    /// The write failed; the cache stays dirty.
    Failed { reason: String },
}

impl<S: DriveService, C: CacheStore> DriveCache<S, C> {
    /// Replace the in-memory state with the stored snapshot.
    ///
    /// Clears the dirty flag and records the store's modification time as
    /// the watermark for [`modified_since_load`](Self::modified_since_load).
    #[instrument(level = "debug", skip(self))]
    pub fn load(&mut self) -> LoadOutcome {
        let location = self.store.location();
        match self.store.read() {
            Ok(Some(stored)) => {
                self.state = stored.snapshot.into_state();
                self.last_materialized = stored.modified;
                let nodes = self.state.registry.len();
                let paths = self.state.paths.len();
                info!(nodes, paths, cache = %location, "Loaded cached nodes");
                LoadOutcome::Loaded { nodes, paths }
            }
            Ok(None) => {
                self.start_empty();
                info!(cache = %location, "No cache found, starting with empty cache");
                LoadOutcome::Empty
            }
            Err(e) => {
                self.start_empty();
                warn!(cache = %location, error = %e, "Cache unreadable, starting with empty cache");
                LoadOutcome::Recovered {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Write the snapshot if anything changed since the last load.
    ///
    /// Leaves the dirty flag alone, so calling it again after further
    /// changes still writes.
    #[instrument(level = "debug", skip(self))]
    pub fn dump(&mut self) -> DumpOutcome {
        if !self.state.dirty {
            info!("Cache clean, not rewritten");
            return DumpOutcome::Clean;
        }

        let snapshot = CacheSnapshot::from_state(&self.state);
        let nodes = snapshot.metadata.len();
        match self.store.write(&snapshot) {
            Ok(()) => {
                info!(nodes, cache = %self.store.location(), "Wrote cache");
                DumpOutcome::Written { nodes }
            }
            Err(e) => {
                warn!(cache = %self.store.location(), error = %e, "Cache write failed");
                DumpOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Drop everything: only the root mapping remains, dirty is cleared.
    pub fn reset(&mut self) {
        debug!(nodes = self.state.registry.len(), "Resetting cache");
        self.start_empty();
    }

    /// Snapshot of the current state, as [`dump`](Self::dump) would write it.
    pub fn snapshot(&self) -> CacheSnapshot {
        CacheSnapshot::from_state(&self.state)
    }

    fn start_empty(&mut self) {
        self.state = CacheState::default();
        self.last_materialized = None;
    }
}
