//! Store matching between a candidate copy and the primary.
//!
//! # Ordering
//!
//! Scores rank by, in order:
//!
//! 1. No-op recovery possible (nothing to copy)
//! 2. Higher retaining sequence number (shorter operation replay)
//! 3. More matching bytes (less file copying)

use std::cmp::Ordering;

use corelib::{NodeId, ShardStoreDigest, NO_RETAINING_SEQ_NO};
use serde::Serialize;

/// How well one node's copy matches the primary.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize)]
pub struct MatchScore {
    /// Summed length of files identical on both copies.
    pub matching_bytes: u64,
    /// Retaining sequence number the primary holds for the node, -1 if none.
    pub retaining_seq_no: i64,
    /// The copy can be recovered without transferring anything.
    pub is_noop_recovery: bool,
}

impl MatchScore {
    /// Score of a copy that shares nothing with the primary.
    pub const NONE: MatchScore = MatchScore {
        matching_bytes: 0,
        retaining_seq_no: NO_RETAINING_SEQ_NO,
        is_noop_recovery: false,
    };

    /// Whether the copy is worth recovering onto at all.
    pub fn any_match(&self) -> bool {
        self.is_noop_recovery || self.retaining_seq_no >= 0 || self.matching_bytes > 0
    }
}

impl Ord for MatchScore {
    fn cmp(&self, other: &Self) -> Ordering {
        self.is_noop_recovery
            .cmp(&other.is_noop_recovery)
            .then_with(|| self.retaining_seq_no.cmp(&other.retaining_seq_no))
            .then_with(|| self.matching_bytes.cmp(&other.matching_bytes))
    }
}

impl PartialOrd for MatchScore {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Bytes of `candidate` files that exist on the primary with the same
/// length and checksum.
pub fn matching_bytes(primary: &ShardStoreDigest, candidate: &ShardStoreDigest) -> u64 {
    candidate
        .files()
        .filter(|file| primary.file(&file.name).is_some_and(|p| p.is_same(file)))
        .map(|file| file.length)
        .fold(0u64, u64::saturating_add)
}

/// Both copies carry the same sync id.
pub fn has_matching_sync_id(primary: &ShardStoreDigest, candidate: &ShardStoreDigest) -> bool {
    match (primary.sync_id(), candidate.sync_id()) {
        (Some(primary_id), Some(candidate_id)) => primary_id == candidate_id,
        _ => false,
    }
}

/// Score `candidate` (held by `candidate_node`) against the primary's digest.
pub fn compute_score(
    primary: &ShardStoreDigest,
    primary_node: &NodeId,
    candidate: &ShardStoreDigest,
    candidate_node: &NodeId,
) -> MatchScore {
    let retaining_for_primary = primary.retaining_seq_no(primary_node);
    let retaining_seq_no = primary.retaining_seq_no(candidate_node);
    let is_noop_recovery = (retaining_seq_no >= retaining_for_primary && retaining_for_primary >= 0)
        || has_matching_sync_id(primary, candidate);

    MatchScore {
        matching_bytes: matching_bytes(primary, candidate),
        retaining_seq_no,
        is_noop_recovery,
    }
}

/// Whether a recovery onto `target_node` can replay operations instead of
/// copying files.
pub fn can_perform_operation_based_recovery(
    primary: &ShardStoreDigest,
    target: Option<&ShardStoreDigest>,
    target_node: &NodeId,
) -> bool {
    match target {
        Some(store) if !store.is_empty() => {
            has_matching_sync_id(primary, store) || primary.retaining_seq_no(target_node) >= 0
        }
        _ => false,
    }
}
