//! Canonical path derivation.
//!
//! Every node gets exactly one canonical path, computed by walking the
//! primary-parent chain up to an anchor and composing names on the way
//! back down. Results are memoized in the [`PathTable`] for the lifetime of
//! the cache.

use super::{CacheStore, DriveCache};
use crate::error::DriveCacheError;
use crate::node::{Node, NodeId};
use crate::remote::{DriveService, Fetched};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use tracing::{debug, instrument, trace};

/// Where a parentless node hangs in the path namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathAnchor {
    /// The caller's own tree, rooted at `/`.
    RealRoot,
    /// Stand-in top level for a node owned by someone else whose real
    /// parents are not visible to the caller.
    SyntheticOwnerRoot { email: String },
}

impl PathAnchor {
    /// Anchor for a node without parents.
    ///
    /// Only a node explicitly reported as not owned by the caller, with an
    /// owner to name, gets a synthetic root. Everything else, including a
    /// node whose ownership is not reported, belongs to the real root.
    pub fn for_orphan(node: &Node) -> Self {
        match (node.owned_by_me, node.first_owner_email()) {
            (Some(false), Some(email)) => PathAnchor::SyntheticOwnerRoot {
                email: email.to_string(),
            },
            _ => PathAnchor::RealRoot,
        }
    }

    /// Path prefix the anchor contributes; always ends in `/`.
    ///
    /// ```
    /// use driveinspect_core::cache::PathAnchor;
    ///
    /// assert_eq!(PathAnchor::RealRoot.prefix(), "/");
    /// let foreign = PathAnchor::SyntheticOwnerRoot { email: "ann@example.com".into() };
    /// assert_eq!(foreign.prefix(), "~ann@example.com/.../");
    /// ```
    pub fn prefix(&self) -> String {
        match self {
            PathAnchor::RealRoot => "/".to_string(),
            PathAnchor::SyntheticOwnerRoot { email } => format!("~{email}/.../"),
        }
    }

    pub fn is_synthetic(&self) -> bool {
        matches!(self, PathAnchor::SyntheticOwnerRoot { .. })
    }
}

/// Memoized id → canonical path mapping.
///
/// The root alias maps to `/` from construction onwards. Synthetic owner
/// prefixes are stored as pseudo-entries keyed by the prefix itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTable {
    entries: BTreeMap<NodeId, String>,
}

impl Default for PathTable {
    fn default() -> Self {
        Self::new()
    }
}

impl PathTable {
    pub fn new() -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(NodeId::root(), "/".to_string());
        Self { entries }
    }

    /// Rebuild from persisted entries, restoring the root mapping if the
    /// document lacked it.
    pub(crate) fn from_entries(mut entries: BTreeMap<NodeId, String>) -> Self {
        entries.insert(NodeId::root(), "/".to_string());
        Self { entries }
    }

    pub(crate) fn entries(&self) -> &BTreeMap<NodeId, String> {
        &self.entries
    }

    pub fn get(&self, id: &NodeId) -> Option<&str> {
        self.entries.get(id).map(String::as_str)
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &str)> {
        self.entries.iter().map(|(id, p)| (id, p.as_str()))
    }

    /// Insert unless present. Returns whether the table changed.
    pub(crate) fn insert(&mut self, id: NodeId, path: String) -> bool {
        if self.entries.contains_key(&id) {
            return false;
        }
        self.entries.insert(id, path);
        true
    }

    /// Ids whose path is `path` or `path` plus a trailing `/`, in id order.
    /// The root alias is left out.
    pub fn ids_for(&self, path: &str) -> Vec<NodeId> {
        let as_folder = format!("{path}/");
        self.entries
            .iter()
            .filter(|(id, p)| !id.is_root() && (p.as_str() == path || **p == as_folder))
            .map(|(id, _)| id.clone())
            .collect()
    }
}

/// Join a parent path and a child name, adding the folder slash.
fn compose(parent: &str, node: &Node) -> String {
    let mut path = String::with_capacity(parent.len() + node.name.len() + 2);
    path.push_str(parent);
    if !path.ends_with('/') {
        path.push('/');
    }
    path.push_str(&node.name);
    if node.is_folder() {
        path.push('/');
    }
    path
}

/// A node met during a path walk that is not in the registry yet.
///
/// Staged nodes enter the registry together with the paths of their walk,
/// so a walk that fails leaves neither behind.
#[derive(Debug)]
pub(crate) struct StagedNode {
    /// Key the node was requested under; an alias when it differs from
    /// `node.id`.
    key: NodeId,
    node: Node,
    fetch_latency: Option<Duration>,
}

impl StagedNode {
    pub(crate) fn fetched(key: NodeId, fetched: Fetched) -> Self {
        Self {
            key,
            node: fetched.node,
            fetch_latency: Some(fetched.latency),
        }
    }

    pub(crate) fn listed(node: Node) -> Self {
        Self {
            key: node.id.clone(),
            node,
            fetch_latency: None,
        }
    }

    fn answers(&self, id: &NodeId) -> bool {
        self.key == *id || self.node.id == *id
    }
}

/// Queue `path` for `key`, and for the node's own id when `key` is an alias.
fn record_path(pending: &mut Vec<(NodeId, String)>, key: &NodeId, node: &Node, path: String) {
    if node.id != *key {
        pending.push((node.id.clone(), path.clone()));
    }
    pending.push((key.clone(), path));
}

impl<S: DriveService, C: CacheStore> DriveCache<S, C> {
    /// Canonical path of `id`, computed once and memoized.
    ///
    /// The walk follows the primary parent of each node until it reaches a
    /// node with a known path or a parentless node, fetching ancestors on
    /// registry misses. Paths are cached for every node on the chain. A
    /// failed walk changes nothing: ancestors fetched on the way are
    /// dropped, not registered.
    ///
    /// # Errors
    ///
    /// - [`DriveCacheError::Remote`] if a node on the chain cannot be fetched
    /// - [`DriveCacheError::ParentCycle`] if the chain revisits a node
    #[instrument(level = "debug", skip(self), fields(id = %id))]
    pub fn path_of(&mut self, id: &NodeId) -> Result<String, DriveCacheError> {
        if let Some(path) = self.state.paths.get(id) {
            return Ok(path.to_string());
        }
        self.derive_path(id, Vec::new())
    }

    /// Walk up from `id` and compose its path. `staged` holds nodes the
    /// caller already has in hand; they are registered, along with every
    /// ancestor fetched and every path derived, only once the walk is done.
    pub(crate) fn derive_path(
        &mut self,
        id: &NodeId,
        mut staged: Vec<StagedNode>,
    ) -> Result<String, DriveCacheError> {
        // Nodes still waiting for a path, nearest first, with the key they
        // were requested under.
        let mut chain: Vec<(NodeId, Node)> = Vec::new();
        let mut pending: Vec<(NodeId, String)> = Vec::new();
        let mut visited = BTreeSet::new();
        let mut current = id.clone();

        let mut base = loop {
            if let Some(path) = self.state.paths.get(&current) {
                break path.to_string();
            }
            if !visited.insert(current.clone()) {
                return Err(DriveCacheError::ParentCycle { id: current });
            }

            let node = self.walk_lookup(&current, &mut staged)?;
            if let Some(parent) = node.primary_parent() {
                trace!(node = %node.id, parent = %parent, "Walking up");
                let parent = parent.clone();
                chain.push((current, node));
                current = parent;
                continue;
            }

            if self.is_drive_root(&node, &staged) {
                debug!(node = %node.id, "Reached drive root");
                record_path(&mut pending, &current, &node, "/".to_string());
                break "/".to_string();
            }

            let anchor = PathAnchor::for_orphan(&node);
            let prefix = anchor.prefix();
            if anchor.is_synthetic() {
                debug!(node = %node.id, prefix = %prefix, "Orphan anchored at synthetic owner root");
                pending.push((NodeId::from_raw(prefix.clone()), prefix.clone()));
            }
            chain.push((current, node));
            break prefix;
        };

        while let Some((key, node)) = chain.pop() {
            let path = compose(&base, &node);
            trace!(node = %node.id, path = %path, "Derived path");
            record_path(&mut pending, &key, &node, path.clone());
            base = path;
        }

        self.commit_walk(staged, pending);
        Ok(base)
    }

    /// Canonical paths of every parent of `id`, in the order the remote
    /// lists them. The first is the one [`path_of`](Self::path_of) uses.
    pub fn parent_paths(&mut self, id: &NodeId) -> Result<Vec<String>, DriveCacheError> {
        let node = self.get(id)?;
        node.parent_ids
            .iter()
            .map(|parent| self.path_of(parent))
            .collect()
    }

    /// Registry or staged node for `id`, fetching and staging on a miss.
    /// No reference counting.
    fn walk_lookup(
        &mut self,
        id: &NodeId,
        staged: &mut Vec<StagedNode>,
    ) -> Result<Node, DriveCacheError> {
        if let Some(entry) = self.state.registry.get(id) {
            return Ok(entry.node.clone());
        }
        if let Some(held) = staged.iter().find(|s| s.answers(id)) {
            return Ok(held.node.clone());
        }
        let fetched = self.remote.fetch(id)?;
        let node = fetched.node.clone();
        staged.push(StagedNode::fetched(id.clone(), fetched));
        Ok(node)
    }

    fn is_drive_root(&self, node: &Node, staged: &[StagedNode]) -> bool {
        node.parent_ids.is_empty()
            && (node.name == self.config.drive_root_name
                || self.state.registry.root_id() == Some(&node.id)
                || staged.iter().any(|s| s.key.is_root() && s.node.id == node.id))
    }

    fn commit_walk(&mut self, staged: Vec<StagedNode>, paths: Vec<(NodeId, String)>) {
        let registry = &mut self.state.registry;
        let mut changed = false;
        for StagedNode {
            key,
            node,
            fetch_latency,
        } in staged
        {
            if key != node.id {
                debug!(alias = %key, real = %node.id, "Remote answered alias with real id");
                changed |= registry.insert_new(node.id.clone(), node.clone(), fetch_latency);
            }
            changed |= registry.insert_new(key, node, fetch_latency);
        }
        for (id, path) in paths {
            changed |= self.state.paths.insert(id, path);
        }
        if changed {
            self.state.mark_dirty();
        }
    }
}
