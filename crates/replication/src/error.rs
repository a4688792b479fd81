//! Errors raised by replica placement.
//!
//! Scoring itself never fails. Every variant here is an internal-consistency
//! violation: the routing snapshot or the policy chain contradicts itself, and
//! the allocation pass should stop rather than guess.

use corelib::{Decision, NodeId, ShardId};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PlacementError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlacementError {
    /// Scoring was reached without an active primary outside explain mode.
    #[error("{shard}: no active primary, yet policies allowed allocating its replica")]
    MissingActivePrimary { shard: ShardId },

    /// A defer branch was reached with a verdict that has no allocation status.
    #[error("{shard}: policy verdict {decision} has no allocation status")]
    UndefinedAllocationStatus { shard: ShardId, decision: Decision },

    /// A shard copy points at a node missing from the routing snapshot.
    #[error("{shard}: copy is assigned to unreachable node {node:?}")]
    UnreachableNode { shard: ShardId, node: Option<NodeId> },

    #[error("routing error: {0}")]
    Routing(#[from] corelib::Error),
}
