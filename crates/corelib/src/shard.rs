//! Shard identity and routing entries.
//!
//! A `ShardRouting` is one copy (primary or replica) of a shard as seen in a
//! routing snapshot. Unassigned and recovering copies carry an
//! `UnassignedInfo` describing why they lost their previous home.

use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::decision::Decision;
use crate::millis;
use crate::node::NodeId;

/// Identifier of one shard of an index.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct ShardId {
    pub index: String,
    pub id: u32,
}

impl ShardId {
    pub fn new(index: impl Into<String>, id: u32) -> Self {
        Self {
            index: index.into(),
            id,
        }
    }
}

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}][{}]", self.index, self.id)
    }
}

/// Lifecycle state of a shard copy.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShardState {
    Unassigned,
    Initializing,
    Started,
    Relocating,
}

/// Why a shard copy became unassigned.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnassignedReason {
    /// The index was just created, so no copy has data yet.
    IndexCreated,
    /// The node holding the copy left the cluster.
    NodeLeft,
    /// A previous allocation attempt failed.
    AllocationFailed,
    /// An in-flight recovery was cancelled for a better placement.
    ReallocatedReplica,
    ExistingIndexRestored,
    Other,
}

/// Status of the last allocation attempt for an unassigned copy.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationStatus {
    DecidersNo,
    DecidersThrottled,
    FetchingShardData,
    DelayedAllocation,
    NoValidShardCopy,
    NoAttempt,
}

impl AllocationStatus {
    /// Maps a non-YES policy verdict to a status. YES has no status.
    pub fn from_decision(decision: Decision) -> Option<Self> {
        match decision {
            Decision::No => Some(AllocationStatus::DecidersNo),
            Decision::Throttle => Some(AllocationStatus::DecidersThrottled),
            Decision::Yes => None,
        }
    }
}

impl fmt::Display for AllocationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AllocationStatus::DecidersNo => "deciders_no",
            AllocationStatus::DecidersThrottled => "deciders_throttled",
            AllocationStatus::FetchingShardData => "fetching_shard_data",
            AllocationStatus::DelayedAllocation => "delayed_allocation",
            AllocationStatus::NoValidShardCopy => "no_valid_shard_copy",
            AllocationStatus::NoAttempt => "no_attempt",
        };
        f.write_str(label)
    }
}

/// Why and since when a shard copy is without a home.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct UnassignedInfo {
    pub reason: UnassignedReason,
    #[serde(default)]
    pub message: Option<String>,
    /// Cluster clock reading when the copy became unassigned.
    #[serde(with = "millis", rename = "unassigned_at_ms", default)]
    pub unassigned_at: Duration,
    /// Nodes on which this copy already failed.
    #[serde(default)]
    pub failed_node_ids: BTreeSet<NodeId>,
    #[serde(default = "no_attempt")]
    pub last_allocation_status: AllocationStatus,
}

fn no_attempt() -> AllocationStatus {
    AllocationStatus::NoAttempt
}

impl UnassignedInfo {
    pub fn new(reason: UnassignedReason, unassigned_at: Duration) -> Self {
        Self {
            reason,
            message: None,
            unassigned_at,
            failed_node_ids: BTreeSet::new(),
            last_allocation_status: AllocationStatus::NoAttempt,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_failed_nodes(mut self, nodes: impl IntoIterator<Item = NodeId>) -> Self {
        self.failed_node_ids = nodes.into_iter().collect();
        self
    }

    /// Time left before the delay window closes, zero once it has.
    pub fn remaining_delay(&self, now: Duration, timeout: Duration) -> Duration {
        let elapsed = now.saturating_sub(self.unassigned_at);
        timeout.saturating_sub(elapsed)
    }

    /// True while a copy lost with its node is still inside the node-left
    /// delay window. A zero timeout disables the window.
    pub fn is_delayed(&self, now: Duration, timeout: Duration) -> bool {
        self.reason == UnassignedReason::NodeLeft && !self.remaining_delay(now, timeout).is_zero()
    }
}

/// One copy of a shard in the routing snapshot.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct ShardRouting {
    pub shard_id: ShardId,
    pub primary: bool,
    pub state: ShardState,
    #[serde(default)]
    pub current_node: Option<NodeId>,
    #[serde(default)]
    pub relocating_node: Option<NodeId>,
    #[serde(default)]
    pub unassigned_info: Option<UnassignedInfo>,
}

impl ShardRouting {
    pub fn unassigned_replica(shard_id: ShardId, info: UnassignedInfo) -> Self {
        Self {
            shard_id,
            primary: false,
            state: ShardState::Unassigned,
            current_node: None,
            relocating_node: None,
            unassigned_info: Some(info),
        }
    }

    pub fn started(shard_id: ShardId, node: NodeId, primary: bool) -> Self {
        Self {
            shard_id,
            primary,
            state: ShardState::Started,
            current_node: Some(node),
            relocating_node: None,
            unassigned_info: None,
        }
    }

    /// A replica recovering onto `node`, keeping the info from when it was
    /// unassigned.
    pub fn initializing_replica(shard_id: ShardId, node: NodeId, info: Option<UnassignedInfo>) -> Self {
        Self {
            shard_id,
            primary: false,
            state: ShardState::Initializing,
            current_node: Some(node),
            relocating_node: None,
            unassigned_info: info,
        }
    }

    pub fn unassigned(&self) -> bool {
        self.state == ShardState::Unassigned
    }

    pub fn initializing(&self) -> bool {
        self.state == ShardState::Initializing
    }

    /// Started or relocating copies serve traffic.
    pub fn active(&self) -> bool {
        matches!(self.state, ShardState::Started | ShardState::Relocating)
    }

    pub fn unassigned_reason(&self) -> Option<UnassignedReason> {
        self.unassigned_info.as_ref().map(|info| info.reason)
    }

    pub fn failed_node_ids(&self) -> BTreeSet<NodeId> {
        self.unassigned_info
            .as_ref()
            .map(|info| info.failed_node_ids.clone())
            .unwrap_or_default()
    }
}

impl fmt::Display for ShardRouting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let role = if self.primary { "P" } else { "R" };
        write!(f, "{}, {}, {:?}", self.shard_id, role, self.state)?;
        if let Some(node) = &self.current_node {
            write!(f, ", node[{}]", node)?;
        }
        Ok(())
    }
}
