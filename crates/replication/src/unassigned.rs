//! Placement of unassigned replicas.
//!
//! # Algorithm
//!
//! 1. Only replicas that lost a previous copy are handled here
//! 2. Ask the policy chain whether any data node could take the replica;
//!    a throttled chain still fetches so the store data is ready next pass
//! 3. Poll the store fetch; defer while it is running
//! 4. Resolve the active primary and its store
//! 5. Score candidates, excluding nodes the copy already failed on
//! 6. Allocate to the best match, throttle, wait out the node-left delay,
//!    or leave the replica to the store-agnostic allocator

use std::collections::BTreeSet;
use std::time::Duration;

use corelib::{AllocationStatus, Decision, ShardRouting};
use tracing::{debug, error, trace};

use crate::allocation::RoutingAllocation;
use crate::allocator::{active_primary_node, is_index_created, ReplicaShardAllocator};
use crate::decider::{can_be_allocated_to_at_least_one_node, decisions_for_all_nodes};
use crate::decision::{augment_with_store_info, AllocateUnassignedDecision, NodeAllocationResult};
use crate::error::{PlacementError, Result};
use crate::fetch::StoreFetch;
use crate::scorer::{find_matching_nodes, PrimaryStore};

/// Is this allocator responsible for `shard`?
pub fn is_responsible_for(shard: &ShardRouting) -> bool {
    !shard.primary && shard.unassigned() && !is_index_created(shard)
}

impl<F: StoreFetch> ReplicaShardAllocator<F> {
    /// Decide where, if anywhere, the unassigned replica `shard` goes.
    pub fn make_allocation_decision(
        &mut self,
        shard: &ShardRouting,
        allocation: &RoutingAllocation<'_>,
    ) -> Result<AllocateUnassignedDecision> {
        let decision = self.decide(shard, allocation)?;
        metrics::counter!("replica_allocator_decisions_total", "verdict" => decision.verdict.label()).increment(1);
        Ok(decision)
    }

    fn decide(&mut self, shard: &ShardRouting, allocation: &RoutingAllocation<'_>) -> Result<AllocateUnassignedDecision> {
        if !is_responsible_for(shard) {
            return Ok(AllocateUnassignedDecision::not_taken());
        }

        let explain = allocation.explain();
        let result = can_be_allocated_to_at_least_one_node(shard, allocation);
        let allocate_decision = result.decision;
        if allocate_decision == Decision::No
            && (!explain || !self.fetcher.has_initiated_fetching(&shard.shard_id))
        {
            trace!(shard = %shard.shard_id, "ignoring allocation, can't be allocated on any node");
            return no_from_decision(shard, allocate_decision, result.nodes);
        }

        let shard_stores = self.fetcher.fetch(shard, allocation.routing());
        if !shard_stores.has_data() {
            trace!(shard = %shard.shard_id, "ignoring allocation, still fetching shard stores");
            allocation.set_has_pending_async_fetch();
            let node_decisions = explain.then(|| decisions_for_all_nodes(shard, allocation));
            return Ok(AllocateUnassignedDecision::no(
                AllocationStatus::FetchingShardData,
                node_decisions,
            ));
        }

        let Some(primary_node) = active_primary_node(shard, allocation)? else {
            if explain {
                return no_from_decision(shard, allocate_decision, result.nodes);
            }
            error!(shard = %shard.shard_id, "no active primary while allocating replica");
            return Err(PlacementError::MissingActivePrimary {
                shard: shard.shard_id.clone(),
            });
        };
        let Some(primary_store) = shard_stores.digest(primary_node) else {
            trace!(
                shard = %shard.shard_id,
                "no primary shard store found, letting actual allocation figure it out"
            );
            return Ok(AllocateUnassignedDecision::not_taken());
        };

        let primary = PrimaryStore {
            node: primary_node,
            digest: primary_store,
        };
        let excluded: BTreeSet<_> = shard.failed_node_ids();
        let matching = find_matching_nodes(shard, allocation, &excluded, primary, &shard_stores, explain);
        let node_decisions = augment_with_store_info(result.nodes, matching.node_decisions());

        if allocate_decision != Decision::Yes {
            return no_from_decision(shard, allocate_decision, node_decisions);
        }

        if let Some(best) = matching.best() {
            let routing = allocation.routing();
            let node = routing.node(best).ok_or_else(|| PlacementError::UnreachableNode {
                shard: shard.shard_id.clone(),
                node: Some(best.clone()),
            })?;
            let decision = allocation
                .policy()
                .can_allocate_with_retention_lease(shard, node, routing);
            if decision == Decision::Throttle {
                debug!(
                    shard = %shard.shard_id,
                    node = %node,
                    "throttling allocation in order to reuse its unallocated persistent store"
                );
                return Ok(AllocateUnassignedDecision::throttle(node_decisions));
            }
            debug!(
                shard = %shard.shard_id,
                node = %node,
                "allocating in order to reuse its unallocated persistent store"
            );
            return Ok(AllocateUnassignedDecision::yes(best.clone(), node_decisions, true));
        }

        if !matching.has_any_data() && is_within_delay(shard, allocation) {
            return Ok(delayed_decision(shard, allocation, node_decisions));
        }

        Ok(AllocateUnassignedDecision::not_taken())
    }
}

fn no_from_decision(
    shard: &ShardRouting,
    decision: Decision,
    node_decisions: Option<Vec<NodeAllocationResult>>,
) -> Result<AllocateUnassignedDecision> {
    match AllocationStatus::from_decision(decision) {
        Some(status) => Ok(AllocateUnassignedDecision::no(status, node_decisions)),
        None => {
            error!(shard = %shard.shard_id, %decision, "deferring with a verdict that has no status");
            Err(PlacementError::UndefinedAllocationStatus {
                shard: shard.shard_id.clone(),
                decision,
            })
        }
    }
}

fn is_within_delay(shard: &ShardRouting, allocation: &RoutingAllocation<'_>) -> bool {
    let timeout = allocation
        .routing()
        .index_settings(&shard.shard_id.index)
        .delayed_node_left_timeout;
    shard
        .unassigned_info
        .as_ref()
        .is_some_and(|info| info.is_delayed(allocation.current_time(), timeout))
}

/// A delayed verdict. Remaining and total delay are only worked out in
/// explain mode and are zero otherwise.
pub fn delayed_decision(
    shard: &ShardRouting,
    allocation: &RoutingAllocation<'_>,
    node_decisions: Option<Vec<NodeAllocationResult>>,
) -> AllocateUnassignedDecision {
    debug!(shard = %shard.shard_id, "allocation of replica is delayed");
    let (mut remaining, mut total) = (Duration::ZERO, Duration::ZERO);
    if allocation.explain() {
        total = allocation
            .routing()
            .index_settings(&shard.shard_id.index)
            .delayed_node_left_timeout;
        remaining = shard
            .unassigned_info
            .as_ref()
            .map(|info| info.remaining_delay(allocation.current_time(), total))
            .unwrap_or_default();
    }
    AllocateUnassignedDecision::delayed(remaining, total, node_decisions)
}
