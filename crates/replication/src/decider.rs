//! Allocation policy abstractions.
//!
//! A policy answers YES / NO / THROTTLE for placing a shard copy on a node,
//! looking only at constraints unrelated to store content (disk, awareness,
//! concurrent recovery limits, ...). Placement composes those answers with
//! store matching; it never inspects how a policy reaches its verdict.

use std::collections::BTreeMap;

use corelib::{Decision, DiscoveryNode, NodeId, RoutingTable, ShardRouting};
use serde::{Deserialize, Serialize};

use crate::allocation::RoutingAllocation;
use crate::decision::NodeAllocationResult;

/// Trait for allocation policy chains.
///
/// # Thread Safety
///
/// Implementations must be thread-safe (Send + Sync) as they may be
/// shared across threads.
pub trait AllocationPolicy: Send + Sync {
    /// Can `shard` be allocated to `node`?
    fn can_allocate(&self, shard: &ShardRouting, node: &DiscoveryNode, routing: &RoutingTable) -> Decision;

    /// Can a replica be allocated to `node` when the primary retains history
    /// for it? Policies that treat lease holders specially override this.
    fn can_allocate_with_retention_lease(
        &self,
        shard: &ShardRouting,
        node: &DiscoveryNode,
        routing: &RoutingTable,
    ) -> Decision {
        self.can_allocate(shard, node, routing)
    }

    /// Policy name (for logging/debugging).
    fn name(&self) -> &'static str;
}

/// Adapts a closure into a policy; both variants share the closure.
pub struct PolicyFn<F> {
    decide: F,
}

impl<F> PolicyFn<F>
where
    F: Fn(&ShardRouting, &DiscoveryNode) -> Decision + Send + Sync,
{
    pub fn new(decide: F) -> Self {
        Self { decide }
    }
}

impl<F> AllocationPolicy for PolicyFn<F>
where
    F: Fn(&ShardRouting, &DiscoveryNode) -> Decision + Send + Sync,
{
    fn can_allocate(&self, shard: &ShardRouting, node: &DiscoveryNode, _routing: &RoutingTable) -> Decision {
        (self.decide)(shard, node)
    }

    fn name(&self) -> &'static str {
        "PolicyFn"
    }
}

/// Table-driven policy: a default verdict with per-node overrides.
///
/// `retention_lease_nodes` overrides apply to the retention-lease variant
/// only and fall back to `nodes`, then `default`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticPolicy {
    #[serde(default = "yes")]
    pub default: Decision,
    #[serde(default)]
    pub nodes: BTreeMap<NodeId, Decision>,
    #[serde(default)]
    pub retention_lease_nodes: BTreeMap<NodeId, Decision>,
}

fn yes() -> Decision {
    Decision::Yes
}

impl Default for StaticPolicy {
    fn default() -> Self {
        Self::new(Decision::Yes)
    }
}

impl StaticPolicy {
    pub fn new(default: Decision) -> Self {
        Self {
            default,
            nodes: BTreeMap::new(),
            retention_lease_nodes: BTreeMap::new(),
        }
    }

    pub fn with_node(mut self, node: impl Into<NodeId>, decision: Decision) -> Self {
        self.nodes.insert(node.into(), decision);
        self
    }

    pub fn with_retention_lease_node(mut self, node: impl Into<NodeId>, decision: Decision) -> Self {
        self.retention_lease_nodes.insert(node.into(), decision);
        self
    }
}

impl AllocationPolicy for StaticPolicy {
    fn can_allocate(&self, _shard: &ShardRouting, node: &DiscoveryNode, _routing: &RoutingTable) -> Decision {
        self.nodes.get(&node.id).copied().unwrap_or(self.default)
    }

    fn can_allocate_with_retention_lease(
        &self,
        shard: &ShardRouting,
        node: &DiscoveryNode,
        routing: &RoutingTable,
    ) -> Decision {
        match self.retention_lease_nodes.get(&node.id) {
            Some(decision) => *decision,
            None => self.can_allocate(shard, node, routing),
        }
    }

    fn name(&self) -> &'static str {
        "StaticPolicy"
    }
}

/// Best verdict across all data nodes, plus per-node records in explain mode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PerNodeAllocationResult {
    pub decision: Decision,
    pub nodes: Option<Vec<NodeAllocationResult>>,
}

/// Asks the retention-lease-aware policy about every data node.
///
/// The verdict is YES if any node said YES, THROTTLE if any node throttled,
/// NO otherwise. Without explain the scan stops at the first YES.
pub fn can_be_allocated_to_at_least_one_node(
    shard: &ShardRouting,
    allocation: &RoutingAllocation<'_>,
) -> PerNodeAllocationResult {
    let explain = allocation.explain();
    let routing = allocation.routing();
    let mut made = Decision::No;
    let mut nodes = explain.then(Vec::new);

    for node in routing.data_nodes() {
        let decision = allocation
            .policy()
            .can_allocate_with_retention_lease(shard, node, routing);
        match decision {
            Decision::Yes if !explain => {
                return PerNodeAllocationResult {
                    decision,
                    nodes: None,
                };
            }
            Decision::Yes => made = Decision::Yes,
            Decision::Throttle if made == Decision::No => made = Decision::Throttle,
            _ => {}
        }
        if let Some(nodes) = nodes.as_mut() {
            nodes.push(NodeAllocationResult::new(node.id.clone(), None, decision));
        }
    }

    PerNodeAllocationResult { decision: made, nodes }
}

/// Store-less records for every data node, used while stores are fetched.
pub fn decisions_for_all_nodes(shard: &ShardRouting, allocation: &RoutingAllocation<'_>) -> Vec<NodeAllocationResult> {
    let routing = allocation.routing();
    routing
        .data_nodes()
        .map(|node| {
            let decision = allocation.policy().can_allocate(shard, node, routing);
            NodeAllocationResult::new(node.id.clone(), None, decision)
        })
        .collect()
}
