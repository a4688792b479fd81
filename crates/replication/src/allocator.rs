//! Store-aware replica allocator.
//!
//! Owns the store fetch used across a pass. The two entry points live in
//! their own modules:
//!
//! - [`ReplicaShardAllocator::make_allocation_decision`] places unassigned replicas
//! - [`ReplicaShardAllocator::find_better_recoveries`] cancels recoveries a
//!   no-op recovery elsewhere would beat

use corelib::{NodeId, ShardRouting, UnassignedReason};
use tracing::error;

use crate::allocation::RoutingAllocation;
use crate::error::{PlacementError, Result};
use crate::fetch::StoreFetch;

/// Replica allocator that prefers nodes already holding the shard's data.
#[derive(Debug)]
pub struct ReplicaShardAllocator<F> {
    pub(crate) fetcher: F,
}

impl<F: StoreFetch> ReplicaShardAllocator<F> {
    pub fn new(fetcher: F) -> Self {
        Self { fetcher }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }
}

/// Replicas of freshly created indices have no data anywhere to reuse.
pub(crate) fn is_index_created(shard: &ShardRouting) -> bool {
    shard.unassigned_reason() == Some(UnassignedReason::IndexCreated)
}

/// Node currently holding the active primary of `shard`'s shard.
///
/// `Ok(None)` when there is no active primary; an active primary on a node
/// the snapshot does not know is a consistency violation.
pub(crate) fn active_primary_node<'a>(
    shard: &ShardRouting,
    allocation: &RoutingAllocation<'a>,
) -> Result<Option<&'a NodeId>> {
    let Some(primary) = allocation.routing().active_primary(&shard.shard_id) else {
        return Ok(None);
    };
    match primary.current_node.as_ref() {
        Some(node) if allocation.routing().node(node).is_some() => Ok(Some(node)),
        node => {
            error!(shard = %shard.shard_id, node = ?node, "active primary is on an unreachable node");
            Err(PlacementError::UnreachableNode {
                shard: shard.shard_id.clone(),
                node: node.cloned(),
            })
        }
    }
}
