//! Error types for the core library.

use thiserror::Error;

use crate::node::NodeId;
use crate::shard::ShardId;

/// Result type alias for the core library.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the core library.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// No routing entry matches the shard (and node, when given)
    #[error("Unknown shard: {shard} on {node:?}")]
    UnknownShard { shard: ShardId, node: Option<NodeId> },
    /// Node is not part of the routing table
    #[error("Unknown node: {0}")]
    UnknownNode(NodeId),
    /// Routing entry is inconsistent with the requested operation
    #[error("Invalid routing: {0}")]
    InvalidRouting(String),
    /// Store digest could not be built
    #[error("Invalid digest: {0}")]
    InvalidDigest(String),
}
