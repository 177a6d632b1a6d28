//! Metadata cache and path resolution engine for remote, id-addressed file
//! trees.
//!
//! The remote store (Google Drive v3 `files`) addresses nodes by opaque id
//! and exposes only child → parents links, in paginated batches. This crate
//! mirrors it into a path-addressed view and keeps the mirror on disk
//! between runs.
//!
//! # Components
//!
//! - [`remote`]: the [`DriveService`] transport seam, pagination and call
//!   accounting
//! - [`cache::DriveCache`]: registry, path derivation, path resolution,
//!   listings and persistence, all over one [`cache::CacheState`]
//! - [`config`]: [`CacheConfig`] from TOML plus environment overrides
//! - [`testing`]: in-memory [`DriveService`] and cache store doubles
//!
//! # Example
//!
//! ```
//! use driveinspect_core::cache::{DriveCache, Resolution};
//! use driveinspect_core::config::CacheConfig;
//! use driveinspect_core::node::Node;
//! use driveinspect_core::testing::{MemoryCacheStore, MockDrive};
//!
//! let mut drive = MockDrive::with_root("0root", "My Drive");
//! drive.insert(Node::folder("d1", "docs").with_parent("0root"));
//! drive.insert(Node::leaf("f1", "report.txt").with_parent("d1"));
//!
//! let mut cache = DriveCache::with_store(drive, MemoryCacheStore::new(), CacheConfig::default());
//! let found = cache.resolve("/docs/report.txt").unwrap();
//! assert_eq!(found, Resolution::Found("f1".into()));
//! assert_eq!(cache.path_of(&"f1".into()).unwrap(), "/docs/report.txt");
//! ```
//!
//! # Logging
//!
//! All operations emit `tracing` events; the crate never installs a
//! subscriber.

pub mod cache;
pub mod config;
pub mod error;
pub mod node;
pub mod remote;
pub mod testing;

// Re-export commonly used types at crate root
pub use cache::{DriveCache, DumpOutcome, LoadOutcome, Resolution};
pub use config::CacheConfig;
pub use error::DriveCacheError;
pub use node::{Node, NodeId, NodeKind};
pub use remote::{DriveService, ListQuery, Listing, RemoteError};
