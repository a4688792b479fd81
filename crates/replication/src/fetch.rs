//! Store fetch seam.
//!
//! Listing a shard's files on every node is asynchronous and lives outside
//! placement. Placement only polls: a fetch either has a complete set of
//! per-node responses, or it is still running and the caller defers.

use std::collections::{BTreeMap, BTreeSet};

use corelib::{NodeId, RoutingTable, ShardId, ShardRouting, ShardStoreDigest};
use thiserror::Error;
use tracing::{trace, warn};

/// Why a single node did not return its store listing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NodeFetchError {
    #[error("timed out")]
    Timeout,
    #[error("node disconnected")]
    Disconnected,
    #[error("store listing failed: {0}")]
    Failed(String),
}

/// Polled result of a store fetch for one shard.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FetchResult {
    data: Option<BTreeMap<NodeId, ShardStoreDigest>>,
}

impl FetchResult {
    /// The fetch is still running.
    pub fn pending() -> Self {
        Self { data: None }
    }

    pub fn ready(digests: BTreeMap<NodeId, ShardStoreDigest>) -> Self {
        Self { data: Some(digests) }
    }

    /// Reduce the collected per-node responses, dropping nodes that failed.
    pub fn from_responses<I>(shard_id: &ShardId, responses: I) -> Self
    where
        I: IntoIterator<Item = (NodeId, Result<ShardStoreDigest, NodeFetchError>)>,
    {
        let mut digests = BTreeMap::new();
        for (node, response) in responses {
            match response {
                Ok(digest) => {
                    digests.insert(node, digest);
                }
                Err(err) => {
                    warn!(shard = %shard_id, node = %node, error = %err, "ignoring failed store listing");
                }
            }
        }
        Self::ready(digests)
    }

    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }

    /// Digests by node, in node order. Empty while pending.
    pub fn digests(&self) -> impl Iterator<Item = (&NodeId, &ShardStoreDigest)> {
        self.data.iter().flatten()
    }

    pub fn digest(&self, node: &NodeId) -> Option<&ShardStoreDigest> {
        self.data.as_ref().and_then(|data| data.get(node))
    }
}

/// Source of per-node store digests.
pub trait StoreFetch {
    /// Poll for the stores of `shard`. Starts a background fetch when none
    /// is available; never blocks.
    fn fetch(&mut self, shard: &ShardRouting, routing: &RoutingTable) -> FetchResult;

    /// Whether a fetch was ever started for `shard_id`.
    fn has_initiated_fetching(&self, shard_id: &ShardId) -> bool;
}

type NodeResponses = Vec<(NodeId, Result<ShardStoreDigest, NodeFetchError>)>;

/// Store fetch backed by responses collected up front.
///
/// Shards without recorded responses stay pending; polling them marks the
/// fetch as started.
#[derive(Debug, Default)]
pub struct InMemoryStoreFetch {
    responses: BTreeMap<ShardId, NodeResponses>,
    started: BTreeSet<ShardId>,
}

impl InMemoryStoreFetch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the complete response set for `shard_id`.
    pub fn complete(&mut self, shard_id: ShardId, responses: NodeResponses) {
        self.responses.insert(shard_id, responses);
    }

    pub fn with_digest(mut self, shard_id: ShardId, node: impl Into<NodeId>, digest: ShardStoreDigest) -> Self {
        self.responses
            .entry(shard_id)
            .or_default()
            .push((node.into(), Ok(digest)));
        self
    }

    pub fn with_failure(mut self, shard_id: ShardId, node: impl Into<NodeId>, error: NodeFetchError) -> Self {
        self.responses
            .entry(shard_id)
            .or_default()
            .push((node.into(), Err(error)));
        self
    }

    /// Mark a shard as fetched with no node reporting a copy.
    pub fn with_empty(mut self, shard_id: ShardId) -> Self {
        self.responses.entry(shard_id).or_default();
        self
    }
}

impl StoreFetch for InMemoryStoreFetch {
    fn fetch(&mut self, shard: &ShardRouting, _routing: &RoutingTable) -> FetchResult {
        let shard_id = &shard.shard_id;
        self.started.insert(shard_id.clone());
        match self.responses.get(shard_id) {
            Some(responses) => FetchResult::from_responses(shard_id, responses.iter().cloned()),
            None => {
                trace!(shard = %shard_id, "store fetch started");
                FetchResult::pending()
            }
        }
    }

    fn has_initiated_fetching(&self, shard_id: &ShardId) -> bool {
        self.started.contains(shard_id)
    }
}
