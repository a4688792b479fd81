//! Placement verdicts and their explanations.

use std::collections::BTreeMap;
use std::time::Duration;

use corelib::{AllocationStatus, Decision, NodeId};
use serde::Serialize;

/// Final outcome for one unassigned replica in one pass.
#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum PlacementVerdict {
    /// Place the replica on `node`, reusing its existing data.
    Allocate { node: NodeId },
    /// The best node is busy; retry next pass.
    Throttle,
    /// No placement this pass, for the given reason.
    Defer { status: AllocationStatus },
    /// Waiting for the node that held the copy to come back.
    Delayed {
        #[serde(with = "corelib::millis", rename = "remaining_ms")]
        remaining: Duration,
        #[serde(with = "corelib::millis", rename = "total_ms")]
        total: Duration,
    },
    /// Left to the store-agnostic allocator.
    NotTaken,
}

impl PlacementVerdict {
    /// Metric label.
    pub fn label(&self) -> &'static str {
        match self {
            PlacementVerdict::Allocate { .. } => "allocate",
            PlacementVerdict::Throttle => "throttle",
            PlacementVerdict::Defer { .. } => "defer",
            PlacementVerdict::Delayed { .. } => "delayed",
            PlacementVerdict::NotTaken => "not_taken",
        }
    }
}

/// Store data a node holds for the shard being explained.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize)]
pub struct ShardStoreInfo {
    pub matching_bytes: u64,
}

/// Per-node explanation record.
#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct NodeAllocationResult {
    pub node_id: NodeId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store: Option<ShardStoreInfo>,
    pub decision: Decision,
}

impl NodeAllocationResult {
    pub fn new(node_id: NodeId, store: Option<ShardStoreInfo>, decision: Decision) -> Self {
        Self {
            node_id,
            store,
            decision,
        }
    }
}

/// A verdict plus the per-node records gathered in explain mode.
#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct AllocateUnassignedDecision {
    #[serde(flatten)]
    pub verdict: PlacementVerdict,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_decisions: Option<Vec<NodeAllocationResult>>,
    /// Allocation reuses data already on the chosen node.
    pub reuse_store: bool,
}

impl AllocateUnassignedDecision {
    pub fn not_taken() -> Self {
        Self::with_verdict(PlacementVerdict::NotTaken, None)
    }

    pub fn no(status: AllocationStatus, node_decisions: Option<Vec<NodeAllocationResult>>) -> Self {
        Self::with_verdict(PlacementVerdict::Defer { status }, node_decisions)
    }

    pub fn throttle(node_decisions: Option<Vec<NodeAllocationResult>>) -> Self {
        Self::with_verdict(PlacementVerdict::Throttle, node_decisions)
    }

    pub fn yes(node: NodeId, node_decisions: Option<Vec<NodeAllocationResult>>, reuse_store: bool) -> Self {
        Self {
            verdict: PlacementVerdict::Allocate { node },
            node_decisions,
            reuse_store,
        }
    }

    pub fn delayed(
        remaining: Duration,
        total: Duration,
        node_decisions: Option<Vec<NodeAllocationResult>>,
    ) -> Self {
        Self::with_verdict(PlacementVerdict::Delayed { remaining, total }, node_decisions)
    }

    fn with_verdict(verdict: PlacementVerdict, node_decisions: Option<Vec<NodeAllocationResult>>) -> Self {
        Self {
            verdict,
            node_decisions,
            reuse_store: false,
        }
    }

    /// False only when this allocator left the shard to someone else.
    pub fn is_decision_taken(&self) -> bool {
        self.verdict != PlacementVerdict::NotTaken
    }

    /// Human-readable summary of the verdict.
    pub fn explanation(&self) -> String {
        match &self.verdict {
            PlacementVerdict::Allocate { node } if self.reuse_store => {
                format!("can allocate the shard to [{}], reusing its existing store", node)
            }
            PlacementVerdict::Allocate { node } => format!("can allocate the shard to [{}]", node),
            PlacementVerdict::Throttle => {
                "allocation temporarily throttled on the node holding the best matching copy".to_string()
            }
            PlacementVerdict::Defer { status } => match status {
                AllocationStatus::FetchingShardData => {
                    "cannot allocate yet, still fetching shard store listings from nodes".to_string()
                }
                AllocationStatus::DecidersThrottled => {
                    "allocation temporarily throttled on every eligible node".to_string()
                }
                other => format!("cannot allocate the shard to any node ({})", other),
            },
            PlacementVerdict::Delayed { remaining, total } => format!(
                "cannot allocate because the node holding the copy left; waiting [{}ms] of the [{}ms] delay",
                remaining.as_millis(),
                total.as_millis()
            ),
            PlacementVerdict::NotTaken => "not handled by the store-aware replica allocator".to_string(),
        }
    }
}

/// Replace the record of every node that has store data with its store-aware
/// record; nodes without store data keep theirs.
pub fn augment_with_store_info(
    node_decisions: Option<Vec<NodeAllocationResult>>,
    with_stores: Option<&BTreeMap<NodeId, NodeAllocationResult>>,
) -> Option<Vec<NodeAllocationResult>> {
    let (node_decisions, with_stores) = (node_decisions?, with_stores?);
    Some(
        node_decisions
            .into_iter()
            .map(|result| with_stores.get(&result.node_id).cloned().unwrap_or(result))
            .collect(),
    )
}
