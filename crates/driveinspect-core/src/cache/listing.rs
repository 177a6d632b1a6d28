//! Enumerations that feed the registry.

use super::{CacheStore, DriveCache};
use crate::error::DriveCacheError;
use crate::node::NodeId;
use crate::remote::{DriveService, ListQuery, Listing};
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, VecDeque};
use tracing::{debug, instrument};

impl<S: DriveService, C: CacheStore> DriveCache<S, C> {
    /// Immediate children of `id`.
    ///
    /// A non-empty set of cached children is trusted and returned without
    /// a remote call. Otherwise the children are listed remotely and
    /// registered.
    #[instrument(level = "debug", skip(self), fields(id = %id))]
    pub fn children_of(&mut self, id: &NodeId) -> Result<Listing, DriveCacheError> {
        let cached = self.state.registry.children_of(id);
        if !cached.is_empty() {
            debug!(count = cached.len(), "Serving children from cache");
            return Ok(Listing::complete(cached));
        }
        Ok(self.list_and_register(&ListQuery::Children(id.clone())))
    }

    /// Every node the caller can see. Always remote.
    #[instrument(level = "debug", skip(self))]
    pub fn all_nodes(&mut self) -> Result<Listing, DriveCacheError> {
        Ok(self.list_and_register(&ListQuery::All))
    }

    /// Nodes modified strictly after `since`. Always remote.
    #[instrument(level = "debug", skip(self))]
    pub fn newer_than(&mut self, since: DateTime<Utc>) -> Result<Listing, DriveCacheError> {
        Ok(self.list_and_register(&ListQuery::ModifiedSince(since)))
    }

    /// Nodes modified since the cache file was last written, or `None` when
    /// nothing was loaded.
    pub fn modified_since_load(&mut self) -> Result<Option<Listing>, DriveCacheError> {
        match self.last_materialized {
            Some(since) => self.newer_than(since).map(Some),
            None => Ok(None),
        }
    }

    /// Breadth-first enumeration of everything below `id`, excluding `id`.
    ///
    /// Folders are always included, leaves only with `include_leaves`. An
    /// interrupted child listing does not stop the walk; the first cause is
    /// carried on the result, as are all nodes left unregistered.
    #[instrument(level = "debug", skip(self), fields(id = %id))]
    pub fn descendants(
        &mut self,
        id: &NodeId,
        include_leaves: bool,
    ) -> Result<Listing, DriveCacheError> {
        let mut result = Listing::default();
        let mut visited = BTreeSet::from([id.clone()]);
        let mut queue = VecDeque::from([id.clone()]);

        while let Some(folder) = queue.pop_front() {
            let Listing {
                nodes,
                interrupted,
                unregistered,
            } = self.children_of(&folder)?;
            if result.interrupted.is_none() {
                result.interrupted = interrupted;
            }
            result.unregistered.extend(unregistered);
            for node in nodes {
                if !visited.insert(node.id.clone()) {
                    continue;
                }
                if node.is_folder() {
                    queue.push_back(node.id.clone());
                    result.nodes.push(node);
                } else if include_leaves {
                    result.nodes.push(node);
                }
            }
        }

        debug!(count = result.len(), complete = result.is_complete(), "Descendants collected");
        Ok(result)
    }

    /// One bad node does not cost the rest of the listing: it stays in
    /// `nodes`, is named in `unregistered` and the others are registered.
    fn list_and_register(&mut self, query: &ListQuery) -> Listing {
        let mut listing = self.remote.list(query);
        let (_, failures) = self.register_each(&listing.nodes);
        listing.unregistered = failures;
        listing
    }
}
