//! Store-aware replica placement.
//!
//! This crate decides where replica copies of a shard should live so that
//! they can be rebuilt with as little data transfer as possible:
//! - Scoring each node's on-disk copy against the primary
//! - Placing unassigned replicas (allocate / throttle / defer / delay)
//! - Cancelling recoveries that a no-op recovery elsewhere would beat
//!
//! Policy constraints and store listing are pluggable seams
//! ([`AllocationPolicy`], [`StoreFetch`]).

pub mod allocation;
pub mod allocator;
pub mod decider;
pub mod decision;
pub mod error;
pub mod fetch;
pub mod matching;
pub mod reconcile;
pub mod scorer;
pub mod unassigned;

pub use allocation::RoutingAllocation;
pub use allocator::ReplicaShardAllocator;
pub use decider::{AllocationPolicy, PolicyFn, StaticPolicy};
pub use decision::{AllocateUnassignedDecision, NodeAllocationResult, PlacementVerdict, ShardStoreInfo};
pub use error::{PlacementError, Result};
pub use fetch::{FetchResult, InMemoryStoreFetch, NodeFetchError, StoreFetch};
pub use matching::MatchScore;
pub use reconcile::{apply_cancellations, CancellationAction};
pub use scorer::{find_matching_nodes, MatchSet, PrimaryStore};
pub use unassigned::is_responsible_for;
