//! Remote node metadata.
//!
//! A [`Node`] is one entity of the remote store (a file or a folder). Its
//! serialized form follows the Drive v3 `files` resource naming, so the same
//! type decodes a remote response and round-trips through the cache file.
//!
//! Two kinds of identifiers are kept apart:
//! - [`NodeId`]: the opaque id the remote service hands out
//! - paths: plain strings derived by [`crate::cache::DriveCache::path_of`]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use std::fmt;

/// MIME type the remote service uses to mark folders.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Field selection requested for every node.
pub const STANDARD_FIELDS: &str = "id, name, parents, mimeType, size, owners, \
                                   trashed, modifiedTime, createdTime, ownedByMe, shared";

/// Individual field names of [`STANDARD_FIELDS`].
pub fn field_list() -> Vec<&'static str> {
    STANDARD_FIELDS.split(", ").map(str::trim).collect()
}

/// Opaque node identifier assigned by the remote service.
///
/// # Examples
///
/// ```
/// use driveinspect_core::node::NodeId;
///
/// let root = NodeId::root();
/// assert!(root.is_root());
///
/// let id = NodeId::from_raw("1AbCdEf");
/// assert!(!id.is_root());
/// assert_eq!(id.as_str(), "1AbCdEf");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Alias the remote service accepts for the caller's drive root.
    pub const ROOT_ALIAS: &'static str = "root";

    /// The designated root id.
    #[inline]
    pub fn root() -> Self {
        NodeId(Self::ROOT_ALIAS.to_string())
    }

    /// Wrap an id as returned by the remote service.
    #[inline]
    pub fn from_raw(id: impl Into<String>) -> Self {
        NodeId(id.into())
    }

    /// Check if this is the root alias.
    #[inline]
    pub fn is_root(&self) -> bool {
        self.0 == Self::ROOT_ALIAS
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for NodeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        NodeId::from_raw(s)
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        NodeId::from_raw(s)
    }
}

/// Folder or leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Folder,
    Leaf,
}

/// Identity record of a node owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Owner {
    #[serde(default)]
    pub email_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl Owner {
    pub fn new(email_address: impl Into<String>) -> Self {
        Self {
            email_address: email_address.into(),
            display_name: None,
        }
    }
}

/// Metadata of one remote entity.
///
/// Everything except `id` may go stale between refreshes.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: NodeId,
    #[serde(default)]
    pub name: String,
    /// Parents in the order the service reports them.
    #[serde(default, rename = "parents", skip_serializing_if = "Vec::is_empty")]
    pub parent_ids: Vec<NodeId>,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_extension: Option<String>,
    /// Byte size; leaves only. The wire carries it as a decimal string.
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub owners: Vec<Owner>,
    #[serde(default)]
    pub trashed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owned_by_me: Option<bool>,
    #[serde(default)]
    pub shared: bool,
}

impl Node {
    /// A bare leaf with the given id and name.
    pub fn leaf(id: impl Into<NodeId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            parent_ids: Vec::new(),
            mime_type: "application/octet-stream".to_string(),
            file_extension: None,
            size: None,
            owners: Vec::new(),
            trashed: false,
            modified_time: None,
            created_time: None,
            owned_by_me: Some(true),
            shared: false,
        }
    }

    /// A bare folder with the given id and name.
    pub fn folder(id: impl Into<NodeId>, name: impl Into<String>) -> Self {
        Self {
            mime_type: FOLDER_MIME_TYPE.to_string(),
            ..Self::leaf(id, name)
        }
    }

    pub fn with_parent(mut self, parent: impl Into<NodeId>) -> Self {
        self.parent_ids.push(parent.into());
        self
    }

    pub fn with_owner(mut self, email: impl Into<String>) -> Self {
        self.owners.push(Owner::new(email));
        self
    }

    pub fn with_owned_by_me(mut self, owned: Option<bool>) -> Self {
        self.owned_by_me = owned;
        self
    }

    pub fn with_modified_time(mut self, at: DateTime<Utc>) -> Self {
        self.modified_time = Some(at);
        self
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    /// Folder iff the MIME type is the folder sentinel and no file extension
    /// is attached. Malformed records carrying both are leaves.
    pub fn kind(&self) -> NodeKind {
        if self.mime_type == FOLDER_MIME_TYPE && self.file_extension.is_none() {
            NodeKind::Folder
        } else {
            NodeKind::Leaf
        }
    }

    #[inline]
    pub fn is_folder(&self) -> bool {
        self.kind() == NodeKind::Folder
    }

    /// The parent used for the canonical path: the first one listed.
    ///
    /// The remote model allows several parents; the rest stay reachable
    /// through [`Node::parent_ids`].
    #[inline]
    pub fn primary_parent(&self) -> Option<&NodeId> {
        self.parent_ids.first()
    }

    pub fn has_parent(&self, id: &NodeId) -> bool {
        self.parent_ids.contains(id)
    }

    /// Email of the first listed owner, if any.
    pub fn first_owner_email(&self) -> Option<&str> {
        self.owners
            .first()
            .map(|o| o.email_address.as_str())
            .filter(|email| !email.is_empty())
    }
}

/// One page of a paginated listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePage {
    #[serde(default)]
    pub files: Vec<Node>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}
