//! Node registry: metadata keyed by node id.

use super::paths::StagedNode;
use super::{CacheStore, DriveCache};
use crate::error::DriveCacheError;
use crate::node::{Node, NodeId};
use crate::remote::DriveService;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, instrument, trace, warn};

/// A cached node plus its bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub node: Node,
    /// Duration of the `get` round trip that produced this entry. Absent for
    /// nodes that arrived through a listing.
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub fetch_latency: Option<Duration>,
    /// Requests served since the cache was loaded. Per-run statistic, never
    /// persisted.
    #[serde(skip)]
    pub reference_count: u64,
}

impl RegistryEntry {
    fn new(node: Node, fetch_latency: Option<Duration>) -> Self {
        Self {
            node,
            fetch_latency,
            reference_count: 1,
        }
    }
}

/// In-memory table of node metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeRegistry {
    entries: BTreeMap<NodeId, RegistryEntry>,
}

impl NodeRegistry {
    pub(crate) fn from_entries(mut entries: BTreeMap<NodeId, RegistryEntry>) -> Self {
        for entry in entries.values_mut() {
            entry.reference_count = 0;
        }
        Self { entries }
    }

    pub(crate) fn entries(&self) -> &BTreeMap<NodeId, RegistryEntry> {
        &self.entries
    }

    pub fn get(&self, id: &NodeId) -> Option<&RegistryEntry> {
        self.entries.get(id)
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

    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &RegistryEntry)> {
        self.entries.iter()
    }

    /// Real id of the drive root, once the root alias has been fetched.
    pub fn root_id(&self) -> Option<&NodeId> {
        self.entries.get(&NodeId::root()).map(|e| &e.node.id)
    }

    /// Look up `id` and count the request.
    pub(crate) fn touch(&mut self, id: &NodeId) -> Option<&RegistryEntry> {
        let entry = self.entries.get_mut(id)?;
        entry.reference_count += 1;
        Some(entry)
    }

    /// Insert `node` under `key` unless something is already there.
    /// Returns whether the registry changed.
    pub(crate) fn insert_new(
        &mut self,
        key: NodeId,
        node: Node,
        fetch_latency: Option<Duration>,
    ) -> bool {
        if self.entries.contains_key(&key) {
            return false;
        }
        self.entries.insert(key, RegistryEntry::new(node, fetch_latency));
        true
    }

    /// Cached nodes listing `parent` among their parents, in id order.
    ///
    /// Alias keys are skipped so each node appears once.
    pub fn children_of(&self, parent: &NodeId) -> Vec<Node> {
        self.entries
            .iter()
            .filter(|(key, entry)| **key == entry.node.id && entry.node.has_parent(parent))
            .map(|(_, entry)| entry.node.clone())
            .collect()
    }
}

impl<S: DriveService, C: CacheStore> DriveCache<S, C> {
    /// Metadata for `id`.
    ///
    /// A hit is served from the registry. A miss fetches from the remote
    /// and derives the node's path; the node is stored only once that
    /// succeeds. When `id` is an alias, the node is stored under both keys
    /// and both get its path. A node that does not exist remotely is an
    /// error here.
    #[instrument(level = "debug", skip(self), fields(id = %id))]
    pub fn get(&mut self, id: &NodeId) -> Result<Node, DriveCacheError> {
        if let Some(entry) = self.state.registry.touch(id) {
            trace!(refs = entry.reference_count, "Registry hit");
            return Ok(entry.node.clone());
        }

        debug!("Registry miss, calling remote");
        let fetched = self.remote.fetch(id)?;
        let node = fetched.node.clone();
        let staged = vec![StagedNode::fetched(id.clone(), fetched)];
        let path = self.derive_path(&node.id, staged)?;
        if self.state.paths.insert(id.clone(), path) {
            self.state.mark_dirty();
        }
        Ok(node)
    }

    /// Bulk insert of listing results. Nodes already present are left as
    /// they are; new ones are stored together with their paths.
    ///
    /// Returns the ids of every input node, in input order.
    ///
    /// # Errors
    ///
    /// A node whose path cannot be derived is left out and its error is
    /// returned, after the rest of the input has been registered.
    pub fn register(&mut self, nodes: &[Node]) -> Result<Vec<NodeId>, DriveCacheError> {
        let (ids, failures) = self.register_each(nodes);
        match failures.into_iter().next() {
            Some((_, err)) => Err(err),
            None => Ok(ids),
        }
    }

    /// Register every node that can be placed. Returns all input ids in
    /// input order, plus the nodes left out and why.
    #[instrument(level = "debug", skip_all, fields(count = nodes.len()))]
    pub(crate) fn register_each(
        &mut self,
        nodes: &[Node],
    ) -> (Vec<NodeId>, Vec<(NodeId, DriveCacheError)>) {
        let mut ids = Vec::with_capacity(nodes.len());
        let mut failures = Vec::new();
        let mut added = 0usize;
        for node in nodes {
            ids.push(node.id.clone());
            if self.state.registry.contains(&node.id) {
                continue;
            }
            match self.derive_path(&node.id, vec![StagedNode::listed(node.clone())]) {
                Ok(path) => {
                    trace!(id = %node.id, path = %path, "Registered node");
                    added += 1;
                }
                Err(err) => {
                    warn!(id = %node.id, error = %err, "Node left unregistered");
                    failures.push((node.id.clone(), err));
                }
            }
        }
        debug!(added, skipped = failures.len(), "Registration finished");
        (ids, failures)
    }

    /// Whether `node` is a folder.
    pub fn is_folder(&self, node: &Node) -> bool {
        node.is_folder()
    }

    /// Registry entry for `id`, without fetching or counting.
    pub fn entry(&self, id: &NodeId) -> Option<&RegistryEntry> {
        self.state.registry.get(id)
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.state.registry.contains(id)
    }

    /// Number of registry entries, aliases included.
    pub fn len(&self) -> usize {
        self.state.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.registry.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use crate::remote::RemoteOp;
    use crate::testing::{MemoryCacheStore, MockDrive};

    fn cache(drive: MockDrive) -> DriveCache<MockDrive, MemoryCacheStore> {
        DriveCache::with_store(drive, MemoryCacheStore::new(), CacheConfig::default())
    }

    fn sample_drive() -> MockDrive {
        let mut drive = MockDrive::with_root("0root", "My Drive");
        drive.insert(Node::folder("docs", "docs").with_parent("0root"));
        drive.insert(Node::leaf("rep", "report.txt").with_parent("docs"));
        drive
    }

    #[test]
    fn test_get_miss_then_hit() {
        let mut cache = cache(sample_drive());
        let id = NodeId::from_raw("rep");

        let node = cache.get(&id).unwrap();
        assert_eq!(node.name, "report.txt");
        assert!(cache.is_dirty());
        assert_eq!(cache.entry(&id).unwrap().reference_count, 1);
        assert!(cache.entry(&id).unwrap().fetch_latency.is_some());
        let gets = cache.call_stats().get(RemoteOp::Get);

        cache.get(&id).unwrap();
        assert_eq!(cache.entry(&id).unwrap().reference_count, 2);
        assert_eq!(cache.call_stats().get(RemoteOp::Get), gets);
    }

    #[test]
    fn test_get_derives_path() {
        let mut cache = cache(sample_drive());
        cache.get(&NodeId::from_raw("rep")).unwrap();
        assert_eq!(
            cache.state().paths().get(&NodeId::from_raw("rep")),
            Some("/docs/report.txt")
        );
        // Ancestors were fetched on the way up and got their paths too.
        assert_eq!(cache.state().paths().get(&NodeId::from_raw("docs")), Some("/docs/"));
    }

    #[test]
    fn test_get_missing_is_error() {
        let mut cache = cache(sample_drive());
        let err = cache.get(&NodeId::from_raw("ghost")).unwrap_err();
        assert!(err.is_not_found());
        assert!(!cache.is_dirty());
    }

    #[test]
    fn test_root_alias_stored_under_both_ids() {
        let mut cache = cache(sample_drive());
        let root = cache.get(&NodeId::root()).unwrap();
        assert_eq!(root.id.as_str(), "0root");
        assert!(cache.state().registry().contains(&NodeId::root()));
        assert!(cache.state().registry().contains(&NodeId::from_raw("0root")));
        assert_eq!(cache.state().registry().root_id(), Some(&NodeId::from_raw("0root")));
    }

    #[test]
    fn test_root_alias_paths_both_ids() {
        let mut cache = cache(sample_drive());
        cache.get(&NodeId::root()).unwrap();

        let paths = cache.state().paths();
        assert_eq!(paths.get(&NodeId::root()), Some("/"));
        assert_eq!(paths.get(&NodeId::from_raw("0root")), Some("/"));
        assert_eq!(cache.path_of(&"0root".into()).unwrap(), "/");
        assert_eq!(cache.call_stats().get(RemoteOp::Get), 1);
    }

    #[test]
    fn test_register_skips_node_with_unreachable_parent() {
        let mut cache = cache(sample_drive());
        let orphan = Node::leaf("a_orphan", "lost.txt").with_parent("gone");
        let sibling = Node::leaf("b_ok", "kept.txt").with_parent("docs");

        let err = cache.register(&[orphan, sibling]).unwrap_err();
        assert!(err.is_not_found());

        assert!(!cache.contains(&"a_orphan".into()));
        assert!(!cache.state().paths().contains(&"a_orphan".into()));
        assert!(cache.state().registry().children_of(&"gone".into()).is_empty());
        assert_eq!(
            cache.state().paths().get(&"b_ok".into()),
            Some("/docs/kept.txt")
        );
    }

    #[test]
    fn test_register_first_write_wins() {
        let mut cache = cache(sample_drive());
        let original = Node::folder("docs", "docs").with_parent("0root");
        let renamed = Node::folder("docs", "renamed").with_parent("0root");

        cache.register(std::slice::from_ref(&original)).unwrap();
        let ids = cache.register(&[renamed]).unwrap();

        assert_eq!(ids, vec![NodeId::from_raw("docs")]);
        assert_eq!(cache.entry(&"docs".into()).unwrap().node.name, "docs");
        assert_eq!(cache.entry(&"docs".into()).unwrap().fetch_latency, None);
    }

    #[test]
    fn test_register_keeps_input_order() {
        let mut cache = cache(sample_drive());
        let ids = cache
            .register(&[
                Node::leaf("b", "b").with_parent("0root"),
                Node::leaf("a", "a").with_parent("0root"),
            ])
            .unwrap();
        assert_eq!(ids, vec![NodeId::from_raw("b"), NodeId::from_raw("a")]);
    }

    #[test]
    fn test_children_scan_skips_alias_keys() {
        let mut registry = NodeRegistry::default();
        let child = Node::leaf("c", "child").with_parent("p");
        registry.insert_new(NodeId::from_raw("c"), child.clone(), None);
        registry.insert_new(NodeId::from_raw("alias"), child, None);

        assert_eq!(registry.children_of(&NodeId::from_raw("p")).len(), 1);
    }

    #[test]
    fn test_from_entries_resets_reference_counts() {
        let mut entries = BTreeMap::new();
        let mut entry = RegistryEntry::new(Node::leaf("x", "x"), None);
        entry.reference_count = 7;
        entries.insert(NodeId::from_raw("x"), entry);

        let registry = NodeRegistry::from_entries(entries);
        assert_eq!(registry.get(&"x".into()).unwrap().reference_count, 0);
    }
}
