//! In-memory doubles for the remote service and the cache store.
//!
//! Shared by the unit tests of this crate, its integration tests and
//! downstream crates that want to exercise a [`DriveCache`](crate::cache::DriveCache)
//! without network or disk.

use crate::cache::persist::{CacheSnapshot, CacheStore, PersistError, StoredSnapshot};
use crate::node::{Node, NodeId, NodePage};
use crate::remote::{DriveService, ListQuery, RemoteError};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};

const PAGE_TOKEN_PREFIX: &str = "page-";

/// A remote store held in memory.
///
/// Listings are served in pages of `page_size` nodes in id order. A failure
/// can be injected on a given page index (0-based) of every listing, and
/// single-node fetches can be made to fail with a transport error.
#[derive(Debug, Clone)]
pub struct MockDrive {
    nodes: BTreeMap<NodeId, Node>,
    root: Option<NodeId>,
    page_size: usize,
    fail_on_page: Option<usize>,
    unreachable: BTreeSet<NodeId>,
}

impl Default for MockDrive {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDrive {
    pub fn new() -> Self {
        Self {
            nodes: BTreeMap::new(),
            root: None,
            page_size: 100,
            fail_on_page: None,
            unreachable: BTreeSet::new(),
        }
    }

    /// A drive whose root folder is called `root_name` and has id `root_id`.
    pub fn with_root(root_id: &str, root_name: &str) -> Self {
        let mut drive = Self::new();
        drive.insert(Node::folder(root_id, root_name));
        drive.root = Some(NodeId::from_raw(root_id));
        drive
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn failing_on_page(mut self, page: usize) -> Self {
        self.fail_on_page = Some(page);
        self
    }

    /// Make `get` for `id` fail with a transport error.
    pub fn unreachable(mut self, id: &str) -> Self {
        self.unreachable.insert(NodeId::from_raw(id));
        self
    }

    pub fn insert(&mut self, node: Node) {
        self.nodes.insert(node.id.clone(), node);
    }

    pub fn remove(&mut self, id: &str) -> Option<Node> {
        self.nodes.remove(&NodeId::from_raw(id))
    }

    fn matches(query: &ListQuery, node: &Node) -> bool {
        match query {
            ListQuery::Children(parent) => node.has_parent(parent),
            ListQuery::All => true,
            ListQuery::ModifiedSince(ts) => node.modified_time.is_some_and(|m| m > *ts),
        }
    }
}

impl DriveService for MockDrive {
    fn get(&self, id: &NodeId) -> Result<Node, RemoteError> {
        if self.unreachable.contains(id) {
            return Err(RemoteError::Transport(format!("connection reset fetching {id}")));
        }
        let key = match (&self.root, id.is_root()) {
            (Some(root), true) => root,
            _ => id,
        };
        self.nodes
            .get(key)
            .cloned()
            .ok_or_else(|| RemoteError::NotFound { id: id.clone() })
    }

    fn list_page(
        &self,
        query: &ListQuery,
        page_token: Option<&str>,
    ) -> Result<NodePage, RemoteError> {
        let page = match page_token {
            None => 0,
            Some(token) => token
                .strip_prefix(PAGE_TOKEN_PREFIX)
                .and_then(|n| n.parse::<usize>().ok())
                .ok_or_else(|| RemoteError::Service {
                    status: 400,
                    message: format!("invalid page token {token}"),
                })?,
        };
        if self.fail_on_page == Some(page) {
            return Err(RemoteError::Transport(format!("injected failure on page {page}")));
        }

        let matching: Vec<&Node> = self
            .nodes
            .values()
            .filter(|node| Self::matches(query, node))
            .collect();
        let start = page * self.page_size;
        let end = (start + self.page_size).min(matching.len());
        let files = matching
            .get(start..end)
            .unwrap_or_default()
            .iter()
            .map(|n| (*n).clone())
            .collect();
        let next_page_token = (end < matching.len()).then(|| format!("{PAGE_TOKEN_PREFIX}{}", page + 1));

        Ok(NodePage {
            files,
            next_page_token,
        })
    }
}

/// A [`CacheStore`] that keeps the serialized document in memory and counts
/// writes.
#[derive(Debug, Default, Clone)]
pub struct MemoryCacheStore {
    document: Option<String>,
    modified: Option<DateTime<Utc>>,
    writes: usize,
    fail_writes: bool,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-seeded with `snapshot`, as if written at `modified`.
    pub fn with_snapshot(snapshot: &CacheSnapshot, modified: DateTime<Utc>) -> Self {
        Self {
            document: serde_json::to_string_pretty(snapshot).ok(),
            modified: Some(modified),
            ..Self::default()
        }
    }

    /// A store holding arbitrary (possibly malformed) text.
    pub fn with_raw(document: impl Into<String>) -> Self {
        Self {
            document: Some(document.into()),
            modified: Some(Utc::now()),
            ..Self::default()
        }
    }

    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    pub fn writes(&self) -> usize {
        self.writes
    }

    pub fn document(&self) -> Option<&str> {
        self.document.as_deref()
    }
}

impl CacheStore for MemoryCacheStore {
    fn read(&self) -> Result<Option<StoredSnapshot>, PersistError> {
        let Some(document) = &self.document else {
            return Ok(None);
        };
        let snapshot: CacheSnapshot = serde_json::from_str(document)?;
        Ok(Some(StoredSnapshot {
            snapshot,
            modified: self.modified,
        }))
    }

    fn write(&mut self, snapshot: &CacheSnapshot) -> Result<(), PersistError> {
        if self.fail_writes {
            return Err(PersistError::Io {
                path: self.location().into(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only store"),
            });
        }
        self.document = Some(serde_json::to_string_pretty(snapshot)?);
        self.modified = snapshot.written_at;
        self.writes += 1;
        Ok(())
    }

    fn location(&self) -> String {
        "<memory>".to_string()
    }
}
