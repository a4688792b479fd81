//! End-to-end tests for unassigned replica placement and recovery
//! reconciliation.
//!
//! # Test Strategy
//!
//! 1. **Scoring scenarios**: identical files, sync ids, retention leases
//! 2. **Decision branches**: every exit of the unassigned state machine
//! 3. **Reconciliation**: cancellation rule, skips, batch application

use std::time::Duration;

use corelib::{
    AllocationStatus, Decision, DiscoveryNode, NodeId, RoutingTable, ShardId, ShardRouting, ShardStoreDigest,
    StoreFileMetadata, UnassignedInfo, UnassignedReason,
};
use replication::{
    AllocationPolicy, InMemoryStoreFetch, NodeFetchError, PlacementError, PlacementVerdict, ReplicaShardAllocator,
    RoutingAllocation, ShardStoreInfo, StoreFetch,
};

const PRIMARY: &str = "p";
const NOW: Duration = Duration::from_secs(25);

fn shard_id() -> ShardId {
    ShardId::new("idx", 0)
}

fn node(id: &str) -> NodeId {
    NodeId::new(id)
}

/// Rejects nodes that already hold a copy of the shard, answers `default`
/// elsewhere.
struct SameShardPolicy {
    default: Decision,
}

impl SameShardPolicy {
    fn yes() -> Self {
        Self { default: Decision::Yes }
    }

    fn holds_copy(shard: &ShardRouting, node: &DiscoveryNode, routing: &RoutingTable) -> bool {
        routing
            .shards()
            .iter()
            .any(|s| s.shard_id == shard.shard_id && s.current_node.as_ref() == Some(&node.id))
    }
}

impl AllocationPolicy for SameShardPolicy {
    fn can_allocate(&self, shard: &ShardRouting, node: &DiscoveryNode, routing: &RoutingTable) -> Decision {
        if Self::holds_copy(shard, node, routing) {
            Decision::No
        } else {
            self.default
        }
    }

    fn name(&self) -> &'static str {
        "SameShardPolicy"
    }
}

fn nodes(table: RoutingTable, ids: &[&str]) -> RoutingTable {
    ids.iter()
        .fold(table, |table, id| table.with_node(DiscoveryNode::new(*id, format!("node-{}", id))))
}

fn delayed_info() -> UnassignedInfo {
    UnassignedInfo::new(UnassignedReason::NodeLeft, Duration::from_secs(10))
}

/// Primary started on `p`, one unassigned replica, data nodes `a`..`d`.
fn cluster_with_unassigned(info: UnassignedInfo) -> RoutingTable {
    nodes(RoutingTable::new(), &[PRIMARY, "a", "b", "c", "d"])
        .with_shard(ShardRouting::started(shard_id(), node(PRIMARY), true))
        .with_shard(ShardRouting::unassigned_replica(shard_id(), info))
}

fn unassigned(routing: &RoutingTable) -> ShardRouting {
    routing.unassigned().next().cloned().expect("unassigned replica")
}

fn file(name: &str, length: u64, checksum: &str) -> StoreFileMetadata {
    StoreFileMetadata::new(name, length, checksum)
}

fn primary_store() -> ShardStoreDigest {
    ShardStoreDigest::new()
        .with_file(file("s1", 100, "X"))
        .with_file(file("big", 1000, "Z"))
}

fn decide(
    routing: &RoutingTable,
    policy: &dyn AllocationPolicy,
    fetch: InMemoryStoreFetch,
    explain: bool,
) -> replication::Result<replication::AllocateUnassignedDecision> {
    let mut allocator = ReplicaShardAllocator::new(fetch);
    let allocation = RoutingAllocation::new(routing, policy, NOW).with_explain(explain);
    allocator.make_allocation_decision(&unassigned(routing), &allocation)
}

// ============================================================================
// Scoring Scenarios
// ============================================================================

#[test]
fn test_identical_file_beats_foreign_copy() {
    let routing = cluster_with_unassigned(delayed_info());
    let fetch = InMemoryStoreFetch::new()
        .with_digest(shard_id(), PRIMARY, primary_store())
        .with_digest(shard_id(), "a", ShardStoreDigest::new().with_file(file("s1", 100, "X")))
        .with_digest(shard_id(), "b", ShardStoreDigest::new().with_file(file("s1", 100, "other")));

    let decision = decide(&routing, &SameShardPolicy::yes(), fetch, true).unwrap();

    assert_eq!(decision.verdict, PlacementVerdict::Allocate { node: node("a") });
    assert!(decision.reuse_store);
    let records = decision.node_decisions.unwrap();
    let store_of = |id: &str| records.iter().find(|r| r.node_id == node(id)).unwrap().store;
    assert_eq!(store_of("a"), Some(ShardStoreInfo { matching_bytes: 100 }));
    assert_eq!(store_of("b"), Some(ShardStoreInfo { matching_bytes: 0 }));
    assert_eq!(store_of("c"), None);
}

#[test]
fn test_sync_id_outranks_matching_bytes() {
    let routing = cluster_with_unassigned(delayed_info());
    let fetch = InMemoryStoreFetch::new()
        .with_digest(shard_id(), PRIMARY, primary_store().with_sync_id("S1"))
        .with_digest(
            shard_id(),
            "a",
            ShardStoreDigest::new().with_file(file("unrelated", 5, "Q")).with_sync_id("S1"),
        )
        .with_digest(shard_id(), "b", ShardStoreDigest::new().with_file(file("big", 1000, "Z")));

    let decision = decide(&routing, &SameShardPolicy::yes(), fetch, false).unwrap();
    assert_eq!(decision.verdict, PlacementVerdict::Allocate { node: node("a") });
    assert!(decision.node_decisions.is_none());
}

#[test]
fn test_retention_lease_covering_primary_is_noop() {
    let routing = cluster_with_unassigned(delayed_info());
    let primary = primary_store()
        .with_retention_lease(node(PRIMARY), 50)
        .with_retention_lease(node("c"), 60)
        .with_retention_lease(node("d"), 40);
    let copy = ShardStoreDigest::new().with_file(file("s1", 100, "X"));
    let fetch = InMemoryStoreFetch::new()
        .with_digest(shard_id(), PRIMARY, primary)
        .with_digest(shard_id(), "b", ShardStoreDigest::new().with_file(file("big", 1000, "Z")))
        .with_digest(shard_id(), "c", copy.clone())
        .with_digest(shard_id(), "d", copy);

    let decision = decide(&routing, &SameShardPolicy::yes(), fetch, false).unwrap();
    assert_eq!(decision.verdict, PlacementVerdict::Allocate { node: node("c") });
}

#[test]
fn test_equal_scores_pick_lowest_node_id() {
    let routing = cluster_with_unassigned(delayed_info());
    let copy = ShardStoreDigest::new().with_file(file("s1", 100, "X"));
    let fetch = InMemoryStoreFetch::new()
        .with_digest(shard_id(), PRIMARY, primary_store())
        .with_digest(shard_id(), "d", copy.clone())
        .with_digest(shard_id(), "b", copy.clone())
        .with_digest(shard_id(), "c", copy);

    let decision = decide(&routing, &SameShardPolicy::yes(), fetch, false).unwrap();
    assert_eq!(decision.verdict, PlacementVerdict::Allocate { node: node("b") });
}

// ============================================================================
// Decision Branches
// ============================================================================

#[test]
fn test_index_created_replica_is_not_taken() {
    let routing = cluster_with_unassigned(UnassignedInfo::new(UnassignedReason::IndexCreated, Duration::ZERO));
    let decision = decide(&routing, &SameShardPolicy::yes(), InMemoryStoreFetch::new(), false).unwrap();
    assert_eq!(decision.verdict, PlacementVerdict::NotTaken);
    assert!(!decision.is_decision_taken());
}

#[test]
fn test_policy_no_defers_without_fetching() {
    let routing = cluster_with_unassigned(delayed_info());
    let policy = SameShardPolicy { default: Decision::No };
    let mut allocator = ReplicaShardAllocator::new(InMemoryStoreFetch::new());
    let allocation = RoutingAllocation::new(&routing, &policy, NOW);

    let decision = allocator
        .make_allocation_decision(&unassigned(&routing), &allocation)
        .unwrap();

    assert_eq!(
        decision.verdict,
        PlacementVerdict::Defer {
            status: AllocationStatus::DecidersNo
        }
    );
    assert!(!allocator.fetcher().has_initiated_fetching(&shard_id()));
}

#[test]
fn test_policy_throttle_still_starts_fetch() {
    let routing = cluster_with_unassigned(delayed_info());
    let policy = SameShardPolicy {
        default: Decision::Throttle,
    };
    let mut allocator = ReplicaShardAllocator::new(InMemoryStoreFetch::new());
    let allocation = RoutingAllocation::new(&routing, &policy, NOW);

    let decision = allocator
        .make_allocation_decision(&unassigned(&routing), &allocation)
        .unwrap();

    assert_eq!(
        decision.verdict,
        PlacementVerdict::Defer {
            status: AllocationStatus::FetchingShardData
        }
    );
    assert!(allocator.fetcher().has_initiated_fetching(&shard_id()));
    assert!(allocation.has_pending_async_fetch());
}

#[test]
fn test_policy_throttle_with_data_defers_as_throttled() {
    let routing = cluster_with_unassigned(delayed_info());
    let policy = SameShardPolicy {
        default: Decision::Throttle,
    };
    let fetch = InMemoryStoreFetch::new()
        .with_digest(shard_id(), PRIMARY, primary_store())
        .with_digest(shard_id(), "a", ShardStoreDigest::new().with_file(file("s1", 100, "X")));

    let decision = decide(&routing, &policy, fetch, false).unwrap();
    assert_eq!(
        decision.verdict,
        PlacementVerdict::Defer {
            status: AllocationStatus::DecidersThrottled
        }
    );
}

#[test]
fn test_explain_after_fetch_merges_store_info_into_no() {
    let routing = cluster_with_unassigned(delayed_info());
    let policy = SameShardPolicy { default: Decision::No };
    let shard = unassigned(&routing);
    let mut fetch = InMemoryStoreFetch::new()
        .with_digest(shard_id(), PRIMARY, primary_store())
        .with_digest(shard_id(), "a", ShardStoreDigest::new().with_file(file("s1", 100, "X")));
    fetch.fetch(&shard, &routing);

    let decision = decide(&routing, &policy, fetch, true).unwrap();

    assert_eq!(
        decision.verdict,
        PlacementVerdict::Defer {
            status: AllocationStatus::DecidersNo
        }
    );
    let records = decision.node_decisions.unwrap();
    assert_eq!(records.len(), 5);
    let a = records.iter().find(|r| r.node_id == node("a")).unwrap();
    assert_eq!(a.store, Some(ShardStoreInfo { matching_bytes: 100 }));
    assert_eq!(a.decision, Decision::No);
}

#[test]
fn test_pending_fetch_defers_and_flags_allocation() {
    let routing = cluster_with_unassigned(delayed_info());
    let policy = SameShardPolicy::yes();
    let mut allocator = ReplicaShardAllocator::new(InMemoryStoreFetch::new());
    let allocation = RoutingAllocation::new(&routing, &policy, NOW).with_explain(true);

    let decision = allocator
        .make_allocation_decision(&unassigned(&routing), &allocation)
        .unwrap();

    assert_eq!(
        decision.verdict,
        PlacementVerdict::Defer {
            status: AllocationStatus::FetchingShardData
        }
    );
    assert!(allocation.has_pending_async_fetch());
    assert!(allocator.fetcher().has_initiated_fetching(&shard_id()));
    let records = decision.node_decisions.unwrap();
    assert_eq!(records.len(), 5);
    assert!(records.iter().all(|r| r.store.is_none()));
}

#[test]
fn test_missing_primary_is_a_violation_outside_explain() {
    let routing = nodes(RoutingTable::new(), &[PRIMARY, "a"])
        .with_shard(ShardRouting::unassigned_replica(shard_id(), delayed_info()));
    let fetch = InMemoryStoreFetch::new().with_digest(shard_id(), "a", primary_store());

    let err = decide(&routing, &SameShardPolicy::yes(), fetch, false).unwrap_err();
    assert_eq!(err, PlacementError::MissingActivePrimary { shard: shard_id() });
}

#[test]
fn test_missing_primary_in_explain_defers() {
    let routing = nodes(RoutingTable::new(), &[PRIMARY, "a"])
        .with_shard(ShardRouting::unassigned_replica(shard_id(), delayed_info()));
    let policy = SameShardPolicy { default: Decision::No };
    let mut fetch = InMemoryStoreFetch::new().with_digest(shard_id(), "a", primary_store());
    fetch.fetch(&unassigned(&routing), &routing);

    let decision = decide(&routing, &policy, fetch, true).unwrap();
    assert_eq!(
        decision.verdict,
        PlacementVerdict::Defer {
            status: AllocationStatus::DecidersNo
        }
    );
}

#[test]
fn test_primary_on_unknown_node_is_a_violation() {
    let routing = nodes(RoutingTable::new(), &["a"])
        .with_shard(ShardRouting::started(shard_id(), node("ghost"), true))
        .with_shard(ShardRouting::unassigned_replica(shard_id(), delayed_info()));
    let fetch = InMemoryStoreFetch::new().with_empty(shard_id());

    let err = decide(&routing, &SameShardPolicy::yes(), fetch, false).unwrap_err();
    assert!(matches!(err, PlacementError::UnreachableNode { .. }));
}

#[test]
fn test_missing_primary_store_is_not_taken() {
    let routing = cluster_with_unassigned(delayed_info());
    let fetch = InMemoryStoreFetch::new()
        .with_failure(shard_id(), PRIMARY, NodeFetchError::Timeout)
        .with_digest(shard_id(), "a", primary_store());

    let decision = decide(&routing, &SameShardPolicy::yes(), fetch, false).unwrap();
    assert_eq!(decision.verdict, PlacementVerdict::NotTaken);
}

#[test]
fn test_previously_failed_nodes_are_excluded() {
    let info = delayed_info().with_failed_nodes([node("a")]);
    let routing = cluster_with_unassigned(info);
    let fetch = InMemoryStoreFetch::new()
        .with_digest(shard_id(), PRIMARY, primary_store().with_sync_id("S1"))
        .with_digest(shard_id(), "a", primary_store().with_sync_id("S1"))
        .with_digest(shard_id(), "b", ShardStoreDigest::new().with_file(file("s1", 100, "X")));

    let decision = decide(&routing, &SameShardPolicy::yes(), fetch, false).unwrap();
    assert_eq!(decision.verdict, PlacementVerdict::Allocate { node: node("b") });
}

#[test]
fn test_best_node_throttled_by_lease_policy() {
    let routing = cluster_with_unassigned(delayed_info());
    // The aggregate check asks the lease variant too; other nodes keep it at YES.
    let policy = ThrottleOnly {
        inner: SameShardPolicy::yes(),
        throttled: node("a"),
    };
    let fetch = InMemoryStoreFetch::new()
        .with_digest(shard_id(), PRIMARY, primary_store())
        .with_digest(shard_id(), "a", ShardStoreDigest::new().with_file(file("s1", 100, "X")));

    let decision = decide(&routing, &policy, fetch, false).unwrap();
    assert_eq!(decision.verdict, PlacementVerdict::Throttle);
}

/// Throttles one node under the lease variant, defers to `inner` otherwise.
struct ThrottleOnly {
    inner: SameShardPolicy,
    throttled: NodeId,
}

impl AllocationPolicy for ThrottleOnly {
    fn can_allocate(&self, shard: &ShardRouting, node: &DiscoveryNode, routing: &RoutingTable) -> Decision {
        self.inner.can_allocate(shard, node, routing)
    }

    fn can_allocate_with_retention_lease(
        &self,
        shard: &ShardRouting,
        node: &DiscoveryNode,
        routing: &RoutingTable,
    ) -> Decision {
        if node.id == self.throttled {
            Decision::Throttle
        } else {
            self.inner.can_allocate(shard, node, routing)
        }
    }

    fn name(&self) -> &'static str {
        "ThrottleOnly"
    }
}

#[test]
fn test_no_data_within_delay_is_delayed() {
    let routing = cluster_with_unassigned(delayed_info());
    let fetch = InMemoryStoreFetch::new().with_digest(shard_id(), PRIMARY, primary_store());

    let decision = decide(&routing, &SameShardPolicy::yes(), fetch, true).unwrap();
    match decision.verdict {
        PlacementVerdict::Delayed { remaining, total } => {
            assert_eq!(total, Duration::from_secs(60));
            assert_eq!(remaining, Duration::from_secs(45));
            assert!(remaining > Duration::ZERO && remaining <= total);
        }
        other => panic!("expected delayed verdict, got {:?}", other),
    }
}

#[test]
fn test_delay_without_explain_reports_zero() {
    let routing = cluster_with_unassigned(delayed_info());
    let fetch = InMemoryStoreFetch::new().with_digest(shard_id(), PRIMARY, primary_store());

    let decision = decide(&routing, &SameShardPolicy::yes(), fetch, false).unwrap();
    assert_eq!(
        decision.verdict,
        PlacementVerdict::Delayed {
            remaining: Duration::ZERO,
            total: Duration::ZERO
        }
    );
}

#[test]
fn test_expired_delay_is_not_taken() {
    let info = UnassignedInfo::new(UnassignedReason::NodeLeft, Duration::ZERO);
    let routing = cluster_with_unassigned(info).with_index_settings(
        "idx",
        corelib::IndexSettings {
            delayed_node_left_timeout: Duration::from_secs(5),
        },
    );
    let fetch = InMemoryStoreFetch::new().with_digest(shard_id(), PRIMARY, primary_store());

    let decision = decide(&routing, &SameShardPolicy::yes(), fetch, false).unwrap();
    assert_eq!(decision.verdict, PlacementVerdict::NotTaken);
}

#[test]
fn test_failed_allocation_is_never_delayed() {
    let info = UnassignedInfo::new(UnassignedReason::AllocationFailed, Duration::from_secs(10));
    let routing = cluster_with_unassigned(info);
    let fetch = InMemoryStoreFetch::new().with_digest(shard_id(), PRIMARY, primary_store());

    let decision = decide(&routing, &SameShardPolicy::yes(), fetch, true).unwrap();
    assert_eq!(decision.verdict, PlacementVerdict::NotTaken);
}

#[test]
fn test_unmatched_data_skips_delay() {
    let routing = cluster_with_unassigned(delayed_info());
    let fetch = InMemoryStoreFetch::new()
        .with_digest(shard_id(), PRIMARY, primary_store())
        .with_digest(shard_id(), "a", ShardStoreDigest::new().with_file(file("s1", 100, "other")));

    let decision = decide(&routing, &SameShardPolicy::yes(), fetch, false).unwrap();
    assert_eq!(decision.verdict, PlacementVerdict::NotTaken);
}

// ============================================================================
// Recovery Reconciliation
// ============================================================================

/// Primary on `p`, replica recovering on `c`.
fn cluster_with_recovery(info: Option<UnassignedInfo>) -> RoutingTable {
    nodes(RoutingTable::new(), &[PRIMARY, "a", "b", "c", "d"])
        .with_shard(ShardRouting::started(shard_id(), node(PRIMARY), true))
        .with_shard(ShardRouting::initializing_replica(shard_id(), node("c"), info))
}

fn file_copy_on_c_noop_on_d() -> InMemoryStoreFetch {
    InMemoryStoreFetch::new()
        .with_digest(shard_id(), PRIMARY, primary_store().with_sync_id("S1"))
        .with_digest(shard_id(), "c", ShardStoreDigest::new().with_file(file("s1", 100, "X")))
        .with_digest(shard_id(), "d", primary_store().with_sync_id("S1"))
}

#[test]
fn test_better_noop_node_cancels_recovery() {
    let info = UnassignedInfo::new(UnassignedReason::NodeLeft, Duration::ZERO).with_failed_nodes([node("b")]);
    let mut routing = cluster_with_recovery(Some(info));
    let mut allocator = ReplicaShardAllocator::new(file_copy_on_c_noop_on_d());

    let applied = allocator
        .process_existing_recoveries(&mut routing, &SameShardPolicy::yes(), NOW, |_| true)
        .unwrap();

    assert_eq!(applied.len(), 1);
    assert_eq!(applied[0].current_node, node("c"));
    assert_eq!(applied[0].better_node, node("d"));
    assert!(applied[0].failed_node_ids.contains(&node("b")));

    let replica = routing.shards().iter().find(|s| !s.primary).unwrap();
    assert!(replica.unassigned());
    let info = replica.unassigned_info.as_ref().unwrap();
    assert_eq!(info.reason, UnassignedReason::ReallocatedReplica);
    assert_eq!(info.unassigned_at, NOW);
    assert!(info.failed_node_ids.contains(&node("b")));
}

#[test]
fn test_current_node_with_sync_id_is_kept() {
    let mut routing = cluster_with_recovery(None);
    let fetch = InMemoryStoreFetch::new()
        .with_digest(shard_id(), PRIMARY, primary_store().with_sync_id("S1"))
        .with_digest(shard_id(), "c", primary_store().with_sync_id("S1"))
        .with_digest(shard_id(), "d", primary_store().with_sync_id("S1"));
    let mut allocator = ReplicaShardAllocator::new(fetch);

    let applied = allocator
        .process_existing_recoveries(&mut routing, &SameShardPolicy::yes(), NOW, |_| true)
        .unwrap();
    assert!(applied.is_empty());
    assert!(routing.shards().iter().all(|s| !s.unassigned()));
}

#[test]
fn test_current_node_with_retention_lease_is_kept() {
    let mut routing = cluster_with_recovery(None);
    let fetch = InMemoryStoreFetch::new()
        .with_digest(
            shard_id(),
            PRIMARY,
            primary_store().with_sync_id("S1").with_retention_lease(node("c"), 3),
        )
        .with_digest(shard_id(), "c", ShardStoreDigest::new().with_file(file("s1", 100, "X")))
        .with_digest(shard_id(), "d", primary_store().with_sync_id("S1"));
    let mut allocator = ReplicaShardAllocator::new(fetch);

    let applied = allocator
        .process_existing_recoveries(&mut routing, &SameShardPolicy::yes(), NOW, |_| true)
        .unwrap();
    assert!(applied.is_empty());
}

#[test]
fn test_recovery_skips_without_store_data() {
    let mut routing = cluster_with_recovery(None);
    let mut allocator = ReplicaShardAllocator::new(InMemoryStoreFetch::new());

    let applied = allocator
        .process_existing_recoveries(&mut routing, &SameShardPolicy::yes(), NOW, |_| true)
        .unwrap();
    assert!(applied.is_empty());
    assert!(allocator.fetcher().has_initiated_fetching(&shard_id()));
}

#[test]
fn test_recovery_skips_new_index_and_irrelevant_shards() {
    let info = UnassignedInfo::new(UnassignedReason::IndexCreated, Duration::ZERO);
    let mut routing = cluster_with_recovery(Some(info));
    let mut allocator = ReplicaShardAllocator::new(file_copy_on_c_noop_on_d());
    let applied = allocator
        .process_existing_recoveries(&mut routing, &SameShardPolicy::yes(), NOW, |_| true)
        .unwrap();
    assert!(applied.is_empty());

    let mut routing = cluster_with_recovery(None);
    let mut allocator = ReplicaShardAllocator::new(file_copy_on_c_noop_on_d());
    let applied = allocator
        .process_existing_recoveries(&mut routing, &SameShardPolicy::yes(), NOW, |_| false)
        .unwrap();
    assert!(applied.is_empty());
    assert!(!allocator.fetcher().has_initiated_fetching(&shard_id()));
}

#[test]
fn test_scan_alone_does_not_mutate() {
    let routing = cluster_with_recovery(None);
    let policy = SameShardPolicy::yes();
    let mut allocator = ReplicaShardAllocator::new(file_copy_on_c_noop_on_d());
    let allocation = RoutingAllocation::new(&routing, &policy, NOW);

    let actions = allocator.find_better_recoveries(&allocation, |_| true).unwrap();
    assert_eq!(actions.len(), 1);
    assert!(routing.shards().iter().all(|s| !s.unassigned()));

    let mut routing = routing.clone();
    replication::apply_cancellations(&mut routing, &actions, NOW).unwrap();
    assert_eq!(routing.unassigned().count(), 1);
}

#[test]
fn test_cancellations_apply_as_one_batch() {
    let other = ShardId::new("idx", 1);
    let mut routing = cluster_with_recovery(None)
        .with_shard(ShardRouting::started(other.clone(), node(PRIMARY), true))
        .with_shard(ShardRouting::initializing_replica(other.clone(), node("a"), None));
    let mut fetch = file_copy_on_c_noop_on_d();
    fetch.complete(
        other.clone(),
        vec![
            (node(PRIMARY), Ok(primary_store().with_sync_id("S2"))),
            (node("a"), Ok(ShardStoreDigest::new().with_file(file("big", 1000, "Z")))),
            (node("b"), Ok(primary_store().with_sync_id("S2"))),
        ],
    );
    let mut allocator = ReplicaShardAllocator::new(fetch);

    let applied = allocator
        .process_existing_recoveries(&mut routing, &SameShardPolicy::yes(), NOW, |_| true)
        .unwrap();

    assert_eq!(applied.len(), 2);
    assert_eq!(applied[1].shard_id, other);
    assert_eq!(applied[1].better_node, node("b"));
    assert_eq!(routing.unassigned().count(), 2);
}

#[test]
fn test_stale_cancellation_leaves_routing_untouched() {
    let routing = cluster_with_recovery(None);
    let policy = SameShardPolicy::yes();
    let mut allocator = ReplicaShardAllocator::new(file_copy_on_c_noop_on_d());
    let allocation = RoutingAllocation::new(&routing, &policy, NOW);
    let actions = allocator.find_better_recoveries(&allocation, |_| true).unwrap();
    assert_eq!(actions.len(), 1);

    // The repeated action no longer matches once the first one is applied.
    let batch = vec![actions[0].clone(), actions[0].clone()];
    let mut target = routing.clone();
    assert!(replication::apply_cancellations(&mut target, &batch, NOW).is_err());
    assert_eq!(target, routing);
    assert_eq!(target.unassigned().count(), 0);
}
