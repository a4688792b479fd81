//! Core cluster vocabulary for replica placement.
//!
//! This crate provides the types every allocation component shares:
//! - Node identity
//! - Shard identity, routing entries and unassigned bookkeeping
//! - Store digests reported by nodes
//! - The routing snapshot and its single mutation entry point

pub mod decision;
pub mod error;
pub mod millis;
pub mod node;
pub mod routing;
pub mod shard;
pub mod store;

pub use decision::Decision;
pub use error::{Error, Result};
pub use node::{DiscoveryNode, NodeId};
pub use routing::{IndexSettings, RoutingTable};
pub use shard::{AllocationStatus, ShardId, ShardRouting, ShardState, UnassignedInfo, UnassignedReason};
pub use store::{ShardStoreDigest, StoreFileMetadata, NO_RETAINING_SEQ_NO};
