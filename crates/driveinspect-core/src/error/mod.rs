//! Error types for the driveinspect-core crate
//!
//! Each layer owns its error enum; this module gathers them and defines the
//! error returned by cache operations that may reach the remote store.

use crate::node::NodeId;
use thiserror::Error;

// Re-export error types from submodules
pub use crate::cache::persist::PersistError;
pub use crate::config::ConfigError;
pub use crate::remote::RemoteError;

/// Failure of a cache operation.
///
/// Not-found and ambiguity at the resolver boundary are reported through
/// [`Resolution`](crate::cache::Resolution), not through this type.
#[derive(Error, Debug)]
pub enum DriveCacheError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("Parent chain of node '{id}' loops back on itself")]
    ParentCycle { id: NodeId },
}

impl DriveCacheError {
    /// Whether a directly requested node does not exist remotely.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DriveCacheError::Remote(e) if e.is_not_found())
    }
}
