//! Remote access layer.
//!
//! Purely mechanical: no caching happens here. [`DriveService`] is the
//! transport seam (one request, one response); [`RemoteAccess`] wraps a
//! service, drives pagination to exhaustion and keeps per-operation call
//! counts.
//!
//! # Partial listings
//!
//! A transport or service failure in the middle of a paginated query stops
//! that query only. Whatever pages arrived before the failure are returned
//! in a [`Listing`] whose [`interrupted`](Listing::interrupted) field carries
//! the cause, so callers can tell a short answer from a complete one.

pub mod metrics;

use crate::error::DriveCacheError;
use crate::node::{Node, NodeId, NodePage};
use chrono::{DateTime, SecondsFormat, Utc};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, instrument, trace, warn};

pub use metrics::{CallStats, CallStatsSnapshot, RemoteOp};

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("Node '{id}' not found")]
    NotFound { id: NodeId },

    #[error("Remote service returned HTTP {status}: {message}")]
    Service { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Malformed response: {0}")]
    Decode(String),
}

impl RemoteError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::NotFound { .. })
    }
}

/// A paginated listing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListQuery {
    /// Immediate children of a folder.
    Children(NodeId),
    /// Everything the caller can see.
    All,
    /// Nodes modified strictly after the timestamp.
    ModifiedSince(DateTime<Utc>),
}

impl ListQuery {
    /// Search predicate in the remote query grammar, `None` for an
    /// unfiltered listing.
    ///
    /// ```
    /// use driveinspect_core::remote::ListQuery;
    /// use driveinspect_core::node::NodeId;
    ///
    /// let q = ListQuery::Children(NodeId::from_raw("abc"));
    /// assert_eq!(q.predicate().as_deref(), Some("'abc' in parents"));
    /// ```
    pub fn predicate(&self) -> Option<String> {
        match self {
            ListQuery::Children(id) => Some(format!("'{id}' in parents")),
            ListQuery::All => None,
            ListQuery::ModifiedSince(ts) => Some(format!(
                "modifiedTime > '{}'",
                ts.to_rfc3339_opts(SecondsFormat::Secs, true)
            )),
        }
    }

    /// Counter charged for each page of this query.
    pub fn op(&self) -> RemoteOp {
        match self {
            ListQuery::Children(_) => RemoteOp::ListChildren,
            ListQuery::All => RemoteOp::ListAll,
            ListQuery::ModifiedSince(_) => RemoteOp::ListNewer,
        }
    }
}

/// Transport to the remote store.
///
/// Implementations issue exactly one request per call and do not retry.
pub trait DriveService {
    /// Fetch one node by id.
    fn get(&self, id: &NodeId) -> Result<Node, RemoteError>;

    /// Fetch one page of `query`, continuing from `page_token` when given.
    fn list_page(&self, query: &ListQuery, page_token: Option<&str>)
    -> Result<NodePage, RemoteError>;
}

impl<T: DriveService + ?Sized> DriveService for &T {
    fn get(&self, id: &NodeId) -> Result<Node, RemoteError> {
        (**self).get(id)
    }

    fn list_page(
        &self,
        query: &ListQuery,
        page_token: Option<&str>,
    ) -> Result<NodePage, RemoteError> {
        (**self).list_page(query, page_token)
    }
}

impl<T: DriveService + ?Sized> DriveService for Box<T> {
    fn get(&self, id: &NodeId) -> Result<Node, RemoteError> {
        (**self).get(id)
    }

    fn list_page(
        &self,
        query: &ListQuery,
        page_token: Option<&str>,
    ) -> Result<NodePage, RemoteError> {
        (**self).list_page(query, page_token)
    }
}

/// Result of a single-node fetch.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub node: Node,
    pub latency: Duration,
}

/// Accumulated result of a paginated query.
#[derive(Debug, Default)]
pub struct Listing {
    pub nodes: Vec<Node>,
    /// Set when pagination stopped early; `nodes` then holds the pages
    /// received before the failure.
    pub interrupted: Option<RemoteError>,
    /// Listed nodes the cache could not place, with the reason. They are
    /// still in `nodes` but were not registered. Always empty on a listing
    /// straight from [`RemoteAccess::list`].
    pub unregistered: Vec<(NodeId, DriveCacheError)>,
}

impl Listing {
    /// A listing known to be whole.
    pub fn complete(nodes: Vec<Node>) -> Self {
        Self {
            nodes,
            interrupted: None,
            unregistered: Vec::new(),
        }
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        self.interrupted.is_none()
    }

    #[inline]
    pub fn is_partial(&self) -> bool {
        self.interrupted.is_some()
    }

    /// Whether every listed node made it into the registry.
    pub fn is_fully_registered(&self) -> bool {
        self.unregistered.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Node> {
        self.nodes.iter()
    }

    pub fn ids(&self) -> Vec<NodeId> {
        self.nodes.iter().map(|n| n.id.clone()).collect()
    }

    pub fn into_nodes(self) -> Vec<Node> {
        self.nodes
    }
}

impl<'a> IntoIterator for &'a Listing {
    type Item = &'a Node;
    type IntoIter = std::slice::Iter<'a, Node>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}

/// Pagination driver and call accounting around a [`DriveService`].
#[derive(Debug)]
pub struct RemoteAccess<S> {
    service: S,
    stats: CallStats,
}

impl<S: DriveService> RemoteAccess<S> {
    pub fn new(service: S) -> Self {
        Self {
            service,
            stats: CallStats::new(),
        }
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    /// Fetch a single node, timing the round trip.
    #[instrument(level = "debug", skip(self), fields(id = %id))]
    pub fn fetch(&mut self, id: &NodeId) -> Result<Fetched, RemoteError> {
        let started = Instant::now();
        self.stats.record_call(RemoteOp::Get);
        let node = self.service.get(id)?;
        let latency = started.elapsed();
        self.stats.record_fetch_latency(latency);
        trace!(name = %node.name, latency_us = latency.as_micros(), "Fetched node");
        Ok(Fetched { node, latency })
    }

    /// Run `query` to exhaustion, or until the first failed page.
    #[instrument(level = "debug", skip(self), fields(op = %query.op()))]
    pub fn list(&mut self, query: &ListQuery) -> Listing {
        let op = query.op();
        let mut listing = Listing::default();
        let mut page_token: Option<String> = None;
        let mut pages = 0usize;

        loop {
            self.stats.record_call(op);
            match self.service.list_page(query, page_token.as_deref()) {
                Ok(page) => {
                    pages += 1;
                    trace!(page = pages, files = page.files.len(), "Received page");
                    listing.nodes.extend(page.files);
                    match page.next_page_token {
                        Some(token) => page_token = Some(token),
                        None => break,
                    }
                }
                Err(e) => {
                    warn!(
                        op = %op,
                        pages_received = pages,
                        accumulated = listing.nodes.len(),
                        error = %e,
                        "Pagination interrupted, returning partial listing"
                    );
                    listing.interrupted = Some(e);
                    break;
                }
            }
        }

        debug!(pages, nodes = listing.nodes.len(), complete = listing.is_complete(), "Listing finished");
        listing
    }

    pub fn stats(&self) -> CallStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn reset_stats(&mut self) {
        self.stats.reset();
    }
}
