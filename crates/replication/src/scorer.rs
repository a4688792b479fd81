//! Candidate scoring across every node that reported a copy.
//!
//! # Algorithm
//!
//! 1. Skip excluded nodes, empty digests and nodes missing from the routing table
//! 2. Ask the policy (retention-lease variant when the primary holds a lease)
//! 3. Score every node the policy did not reject, THROTTLE included
//! 4. Pick the best node among those with any match; ties go to the lowest node id

use std::collections::{BTreeMap, BTreeSet};

use corelib::{Decision, NodeId, ShardRouting, ShardStoreDigest, NO_RETAINING_SEQ_NO};
use tracing::trace;

use crate::allocation::RoutingAllocation;
use crate::decision::{NodeAllocationResult, ShardStoreInfo};
use crate::fetch::FetchResult;
use crate::matching::{compute_score, MatchScore};

/// The primary copy scores are computed against.
#[derive(Copy, Clone, Debug)]
pub struct PrimaryStore<'a> {
    pub node: &'a NodeId,
    pub digest: &'a ShardStoreDigest,
}

/// Scores of all nodes that reported usable data, plus the best of them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MatchSet {
    scores: BTreeMap<NodeId, MatchScore>,
    node_decisions: Option<BTreeMap<NodeId, NodeAllocationResult>>,
    best: Option<NodeId>,
}

impl MatchSet {
    pub fn new(
        scores: BTreeMap<NodeId, MatchScore>,
        node_decisions: Option<BTreeMap<NodeId, NodeAllocationResult>>,
    ) -> Self {
        let best = highest_match(&scores).cloned();
        Self {
            scores,
            node_decisions,
            best,
        }
    }

    /// Node with the highest match, if any node matches at all.
    pub fn best(&self) -> Option<&NodeId> {
        self.best.as_ref()
    }

    pub fn score(&self, node: &NodeId) -> Option<&MatchScore> {
        self.scores.get(node)
    }

    pub fn scores(&self) -> impl Iterator<Item = (&NodeId, &MatchScore)> {
        self.scores.iter()
    }

    pub fn can_perform_noop_recovery(&self, node: &NodeId) -> bool {
        self.scores.get(node).is_some_and(|score| score.is_noop_recovery)
    }

    /// Whether any node reported data, regardless of how well it matched.
    pub fn has_any_data(&self) -> bool {
        !self.scores.is_empty()
    }

    /// Store-aware explain records, present only in explain mode.
    pub fn node_decisions(&self) -> Option<&BTreeMap<NodeId, NodeAllocationResult>> {
        self.node_decisions.as_ref()
    }
}

/// The any-match node with the greatest score; equal scores go to the lowest
/// node id.
pub fn highest_match(scores: &BTreeMap<NodeId, MatchScore>) -> Option<&NodeId> {
    scores
        .iter()
        .filter(|(_, score)| score.any_match())
        .max_by(|(a_node, a), (b_node, b)| a.cmp(b).then_with(|| b_node.cmp(a_node)))
        .map(|(node, _)| node)
}

/// Score every reporting node against the primary.
///
/// Nodes in `excluded` are never considered. With `explain`, every node that
/// reached the policy gets a record carrying its matching bytes, rejected
/// nodes included.
pub fn find_matching_nodes(
    shard: &ShardRouting,
    allocation: &RoutingAllocation<'_>,
    excluded: &BTreeSet<NodeId>,
    primary: PrimaryStore<'_>,
    data: &FetchResult,
    explain: bool,
) -> MatchSet {
    let routing = allocation.routing();
    let mut scores = BTreeMap::new();
    let mut node_decisions = explain.then(BTreeMap::new);

    for (node_id, store) in data.digests() {
        if excluded.contains(node_id) || store.is_empty() {
            continue;
        }
        let Some(node) = routing.node(node_id) else {
            continue;
        };

        let decision = if primary.digest.retaining_seq_no(node_id) == NO_RETAINING_SEQ_NO {
            allocation.policy().can_allocate(shard, node, routing)
        } else {
            allocation
                .policy()
                .can_allocate_with_retention_lease(shard, node, routing)
        };

        let score = compute_score(primary.digest, primary.node, store, node_id);
        if let Some(records) = node_decisions.as_mut() {
            let info = ShardStoreInfo {
                matching_bytes: score.matching_bytes,
            };
            records.insert(
                node_id.clone(),
                NodeAllocationResult::new(node_id.clone(), Some(info), decision),
            );
        }

        if decision == Decision::No {
            continue;
        }

        if score.is_noop_recovery {
            trace!(shard = %shard.shard_id, node = %node, "node can perform a noop recovery");
        } else if score.retaining_seq_no >= 0 {
            trace!(
                shard = %shard.shard_id,
                node = %node,
                retaining_seq_no = score.retaining_seq_no,
                "node can perform operation-based recovery"
            );
        } else {
            trace!(
                shard = %shard.shard_id,
                node = %node,
                matching_bytes = score.matching_bytes,
                "node has re-usable data"
            );
        }
        scores.insert(node_id.clone(), score);
    }

    MatchSet::new(scores, node_decisions)
}
