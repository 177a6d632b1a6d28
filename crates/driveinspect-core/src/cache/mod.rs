//! The remote-tree metadata cache.
//!
//! [`DriveCache`] mirrors an id-addressed remote store into a
//! path-addressed view and persists that mirror between runs. The work is
//! split by concern, each in its own submodule operating on one shared
//! [`CacheState`]:
//!
//! - [`registry`]: node metadata keyed by id (`get`, `register`)
//! - [`paths`]: canonical path derivation (`path_of`)
//! - [`resolver`]: path → id lookup (`resolve`, `canonicalize`, cwd)
//! - [`listing`]: children / all / modified-since enumerations
//! - [`persist`]: snapshot load and dump gated by the dirty flag
//!
//! # Node lifecycle
//!
//! A node goes `Unknown → Fetched → Pathed`. Any registry miss or listing
//! registration fetches the metadata and derives the path in the same call,
//! so callers never observe a fetched node without its path. Nothing leaves
//! the cache short of [`DriveCache::reset`].
//!
//! # Staleness
//!
//! The cache is pull-based. Registered nodes are never refreshed from the
//! remote (first write wins), a non-empty cached child set is trusted, and
//! paths are computed once per cache lifetime.
//!
//! # Concurrency
//!
//! Every mutating operation takes `&mut self`; a single owner serializes
//! all access to the registry and the path table.

pub mod listing;
pub mod paths;
pub mod persist;
pub mod registry;
pub mod resolver;

use crate::config::CacheConfig;
use crate::remote::{CallStatsSnapshot, DriveService, RemoteAccess};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

pub use paths::{PathAnchor, PathTable};
pub use persist::{
    CacheSnapshot, CacheStore, DumpOutcome, FileCacheStore, LoadOutcome, PersistError,
    StoredSnapshot,
};
pub use registry::{NodeRegistry, RegistryEntry};
pub use resolver::{Resolution, canonicalize};

/// Everything the cache persists, plus the dirty flag that gates writes.
#[derive(Debug, Clone)]
pub struct CacheState {
    pub(crate) registry: NodeRegistry,
    pub(crate) paths: PathTable,
    pub(crate) cwd: String,
    pub(crate) dirty: bool,
}

impl Default for CacheState {
    fn default() -> Self {
        Self {
            registry: NodeRegistry::default(),
            paths: PathTable::new(),
            cwd: "/".to_string(),
            dirty: false,
        }
    }
}

impl CacheState {
    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    pub fn paths(&self) -> &PathTable {
        &self.paths
    }

    pub fn cwd(&self) -> &str {
        &self.cwd
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    #[inline]
    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }
}

/// Metadata cache and path resolution engine over a [`DriveService`].
pub struct DriveCache<S, C = FileCacheStore> {
    pub(crate) remote: RemoteAccess<S>,
    pub(crate) store: C,
    pub(crate) state: CacheState,
    pub(crate) config: CacheConfig,
    pub(crate) last_materialized: Option<DateTime<Utc>>,
}

impl<S: DriveService> DriveCache<S, FileCacheStore> {
    /// Build a cache backed by the file at `config.cache_path`.
    ///
    /// The snapshot is loaded right away when `config.use_cache` is set;
    /// otherwise the cache starts empty.
    pub fn open(service: S, config: CacheConfig) -> Self {
        let store = FileCacheStore::new(&config.cache_path);
        let use_cache = config.use_cache;
        let mut cache = Self::with_store(service, store, config);
        if use_cache {
            cache.load();
        } else {
            tracing::info!("Starting with empty cache");
        }
        cache
    }
}

impl<S: DriveService, C: CacheStore> DriveCache<S, C> {
    /// Build an empty cache on an arbitrary store. Nothing is loaded.
    pub fn with_store(service: S, store: C, config: CacheConfig) -> Self {
        Self {
            remote: RemoteAccess::new(service),
            store,
            state: CacheState::default(),
            config,
            last_materialized: None,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn state(&self) -> &CacheState {
        &self.state
    }

    pub fn store(&self) -> &C {
        &self.store
    }

    pub fn service(&self) -> &S {
        self.remote.service()
    }

    pub fn is_dirty(&self) -> bool {
        self.state.dirty
    }

    /// Modification time of the cache file when it was last loaded.
    pub fn last_materialized(&self) -> Option<DateTime<Utc>> {
        self.last_materialized
    }

    pub fn call_stats(&self) -> CallStatsSnapshot {
        self.remote.stats()
    }

    /// Summary of the cache and of the remote traffic so far.
    pub fn status(&self) -> CacheStatus {
        CacheStatus {
            cache_location: self.store.location(),
            last_materialized: self.last_materialized,
            cwd: self.state.cwd.clone(),
            nodes: self.state.registry.len(),
            paths: self.state.paths.len(),
            dirty: self.state.dirty,
            calls: self.remote.stats(),
        }
    }
}

/// Point-in-time summary produced by [`DriveCache::status`].
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatus {
    pub cache_location: String,
    pub last_materialized: Option<DateTime<Utc>>,
    pub cwd: String,
    pub nodes: usize,
    pub paths: usize,
    pub dirty: bool,
    pub calls: CallStatsSnapshot,
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "# cache: '{}'", self.cache_location)?;
        match self.last_materialized {
            Some(at) => writeln!(f, "# cache mtime: {}", at.to_rfc3339())?,
            None => writeln!(f, "# cache mtime: ?")?,
        }
        writeln!(f, "# cwd: '{}'", self.cwd)?;
        writeln!(f, "# cache size: {} nodes", self.nodes)?;
        writeln!(f, "# path cache size: {} paths", self.paths)?;
        writeln!(f, "# dirty: {}", self.dirty)?;
        for (op, count) in &self.calls.calls {
            writeln!(f, "# call_count: {op}: {count}")?;
        }
        Ok(())
    }
}
