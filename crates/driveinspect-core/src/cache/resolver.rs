//! Path to id lookup.

use super::{CacheStore, DriveCache};
use crate::error::DriveCacheError;
use crate::node::NodeId;
use crate::remote::DriveService;
use tracing::{debug, instrument, trace};

/// Outcome of [`DriveCache::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found(NodeId),
    /// No child matched `component`.
    NotFound { component: String },
    /// Several siblings share the name `component`.
    Ambiguous {
        component: String,
        candidates: Vec<NodeId>,
    },
}

impl Resolution {
    pub fn found(&self) -> Option<&NodeId> {
        match self {
            Resolution::Found(id) => Some(id),
            _ => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Resolution::Found(_))
    }
}

/// Absolute, normalized form of `path` relative to `cwd`.
///
/// Pure string manipulation: `..` drops the previous segment (nothing to
/// drop at the top is not an error), `.` and empty segments vanish, and
/// trailing separators are removed.
///
/// ```
/// use driveinspect_core::cache::canonicalize;
///
/// assert_eq!(canonicalize("/a/b", "../c"), "/a/c");
/// assert_eq!(canonicalize("/a/b", "."), "/a/b");
/// assert_eq!(canonicalize("/", "x"), "/x");
/// assert_eq!(canonicalize("/a", ""), "/a");
/// assert_eq!(canonicalize("/a", "/../.."), "/");
/// ```
pub fn canonicalize(cwd: &str, path: &str) -> String {
    let joined = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("{cwd}/{path}")
    };

    let mut segments: Vec<&str> = Vec::new();
    for segment in joined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            name => segments.push(name),
        }
    }

    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}

impl<S: DriveService, C: CacheStore> DriveCache<S, C> {
    /// Resolve `path` to a node id.
    ///
    /// Relative paths are taken against the cwd. Cached paths are tried
    /// first; otherwise the tree is walked from the drive root one
    /// component at a time, listing children as needed. Paths in a
    /// synthetic owner namespace (`~owner/.../...`) can only be answered
    /// from cached paths.
    ///
    /// # Errors
    ///
    /// Remote failures while fetching the drive root or deriving paths of
    /// newly listed children. A missing component is not an error.
    #[instrument(level = "debug", skip(self))]
    pub fn resolve(&mut self, path: &str) -> Result<Resolution, DriveCacheError> {
        let synthetic = path.starts_with('~');
        let path = if synthetic {
            path.to_string()
        } else {
            canonicalize(&self.state.cwd, path)
        };

        if path == "/" {
            return Ok(Resolution::Found(NodeId::root()));
        }

        let mut hits = self.state.paths.ids_for(&path);
        match hits.len() {
            0 => {}
            1 => {
                let id = hits.remove(0);
                trace!(id = %id, "Resolved from path table");
                return Ok(Resolution::Found(id));
            }
            _ => {
                debug!(candidates = hits.len(), "Path table holds several ids for path");
                return Ok(Resolution::Ambiguous {
                    component: last_component(&path).to_string(),
                    candidates: hits,
                });
            }
        }

        if synthetic {
            return Ok(Resolution::NotFound {
                component: path.clone(),
            });
        }

        self.walk_down(&path)
    }

    /// Top-down walk from the drive root.
    fn walk_down(&mut self, path: &str) -> Result<Resolution, DriveCacheError> {
        let mut current = self.get(&NodeId::root())?.id;

        for component in path.split('/').skip(1) {
            if component.is_empty() || component == "." {
                continue;
            }
            let listing = self.children_of(&current)?;
            let candidates: Vec<NodeId> = listing
                .iter()
                .filter(|child| child.name == component && child.has_parent(&current))
                .map(|child| child.id.clone())
                .collect();

            match candidates.len() {
                0 => {
                    debug!(component, parent = %current, "No child matches component");
                    return Ok(Resolution::NotFound {
                        component: component.to_string(),
                    });
                }
                1 => {
                    current = candidates.into_iter().next().unwrap_or(current);
                }
                _ => {
                    debug!(component, count = candidates.len(), "Ambiguous component");
                    return Ok(Resolution::Ambiguous {
                        component: component.to_string(),
                        candidates,
                    });
                }
            }
        }

        Ok(Resolution::Found(current))
    }

    /// Change the working directory. The argument is canonicalized against
    /// the current one; whether it names an existing folder is not checked.
    pub fn set_cwd(&mut self, path: &str) -> &str {
        let cwd = canonicalize(&self.state.cwd, path);
        if cwd != self.state.cwd {
            debug!(from = %self.state.cwd, to = %cwd, "Changing cwd");
            self.state.cwd = cwd;
            self.state.mark_dirty();
        }
        &self.state.cwd
    }

    pub fn cwd(&self) -> &str {
        &self.state.cwd
    }
}

fn last_component(path: &str) -> &str {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(path)
}
