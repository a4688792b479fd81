//! Reconciliation of in-flight replica recoveries.
//!
//! A recovery copying files is cancelled when another node could recover the
//! same replica as a no-op. The scan only reads the routing snapshot; the
//! cancellations it finds are applied as one batch afterwards.

use std::collections::BTreeSet;
use std::time::Duration;

use corelib::{AllocationStatus, NodeId, RoutingTable, ShardId, ShardRouting, UnassignedInfo, UnassignedReason};
use serde::Serialize;
use tracing::{debug, error, trace};

use crate::allocation::RoutingAllocation;
use crate::allocator::{active_primary_node, is_index_created, ReplicaShardAllocator};
use crate::decider::AllocationPolicy;
use crate::error::{PlacementError, Result};
use crate::fetch::StoreFetch;
use crate::matching::can_perform_operation_based_recovery;
use crate::scorer::{find_matching_nodes, PrimaryStore};

/// A recovery to cancel because `better_node` can do a no-op recovery.
#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct CancellationAction {
    pub shard_id: ShardId,
    /// Node the replica is currently recovering on.
    pub current_node: NodeId,
    pub better_node: NodeId,
    /// Failure history carried over to the unassigned copy.
    pub failed_node_ids: BTreeSet<NodeId>,
}

impl CancellationAction {
    pub fn message(&self) -> String {
        format!(
            "existing allocation of replica to [{}] cancelled, can perform a noop recovery on [{}]",
            self.current_node, self.better_node
        )
    }

    /// Unassigned record installed on the cancelled copy.
    pub fn unassigned_info(&self, now: Duration) -> UnassignedInfo {
        let mut info = UnassignedInfo::new(UnassignedReason::ReallocatedReplica, now)
            .with_message(self.message())
            .with_failed_nodes(self.failed_node_ids.iter().cloned());
        info.last_allocation_status = AllocationStatus::NoAttempt;
        info
    }
}

/// Replicas the reconciler looks at: recovering, not relocating, not primary.
fn is_recovering_replica(shard: &ShardRouting) -> bool {
    !shard.primary && shard.initializing() && shard.relocating_node.is_none()
}

impl<F: StoreFetch> ReplicaShardAllocator<F> {
    /// Scan recovering replicas and collect the recoveries to cancel.
    ///
    /// Nothing is mutated; apply the result with [`apply_cancellations`].
    pub fn find_better_recoveries<P>(
        &mut self,
        allocation: &RoutingAllocation<'_>,
        is_relevant: P,
    ) -> Result<Vec<CancellationAction>>
    where
        P: Fn(&ShardRouting) -> bool,
    {
        let routing = allocation.routing();
        let mut actions = Vec::new();

        for shard in routing.shards() {
            if !is_recovering_replica(shard) || !is_relevant(shard) || is_index_created(shard) {
                continue;
            }

            let shard_stores = self.fetcher.fetch(shard, routing);
            if !shard_stores.has_data() {
                trace!(shard = %shard.shard_id, "fetching new stores for initializing shard");
                continue;
            }

            let Some(primary_node) = active_primary_node(shard, allocation)? else {
                trace!(shard = %shard.shard_id, "no active primary for initializing shard");
                continue;
            };
            let Some(primary_store) = shard_stores.digest(primary_node) else {
                trace!(
                    shard = %shard.shard_id,
                    "no primary shard store found, letting actual allocation figure it out"
                );
                continue;
            };

            let primary = PrimaryStore {
                node: primary_node,
                digest: primary_store,
            };
            let matching = find_matching_nodes(shard, allocation, &BTreeSet::new(), primary, &shard_stores, false);
            let Some(best) = matching.best() else {
                continue;
            };

            let current_node = match shard.current_node.as_ref() {
                Some(node) if routing.node(node).is_some() => node,
                node => {
                    error!(shard = %shard.shard_id, node = ?node, "recovering replica on an unreachable node");
                    return Err(PlacementError::UnreachableNode {
                        shard: shard.shard_id.clone(),
                        node: node.cloned(),
                    });
                }
            };

            if current_node != best
                && matching.can_perform_noop_recovery(best)
                && !matching.can_perform_noop_recovery(current_node)
                && !can_perform_operation_based_recovery(
                    primary_store,
                    shard_stores.digest(current_node),
                    current_node,
                )
            {
                debug!(
                    shard = %shard.shard_id,
                    current = %current_node,
                    better = %best,
                    "cancelling allocation of replica, can perform a noop recovery elsewhere"
                );
                actions.push(CancellationAction {
                    shard_id: shard.shard_id.clone(),
                    current_node: current_node.clone(),
                    better_node: best.clone(),
                    failed_node_ids: shard.failed_node_ids(),
                });
            }
        }

        Ok(actions)
    }

    /// Scan `routing` for recoveries to cancel, then cancel them as one batch.
    ///
    /// Returns the applied cancellations.
    pub fn process_existing_recoveries<P>(
        &mut self,
        routing: &mut RoutingTable,
        policy: &dyn AllocationPolicy,
        current_time: Duration,
        is_relevant: P,
    ) -> Result<Vec<CancellationAction>>
    where
        P: Fn(&ShardRouting) -> bool,
    {
        let actions = {
            let allocation = RoutingAllocation::new(routing, policy, current_time);
            self.find_better_recoveries(&allocation, is_relevant)?
        };
        apply_cancellations(routing, &actions, current_time)?;
        Ok(actions)
    }
}

/// Fail every cancelled recovery back to the unassigned pool.
///
/// The batch is all or nothing: if any action no longer matches the table,
/// `routing` is left untouched.
pub fn apply_cancellations(
    routing: &mut RoutingTable,
    actions: &[CancellationAction],
    now: Duration,
) -> Result<()> {
    let mut staged = routing.clone();
    for action in actions {
        staged.fail_shard(&action.shard_id, &action.current_node, action.unassigned_info(now))?;
    }
    *routing = staged;
    metrics::counter!("replica_allocator_cancellations_total").increment(actions.len() as u64);
    Ok(())
}
