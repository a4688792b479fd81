//! Routing snapshot: which nodes exist and where every shard copy lives.
//!
//! Allocation reads the table as an immutable point-in-time view. The only
//! mutation is [`RoutingTable::fail_shard`], which the reconciler applies
//! after a full scan.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::millis;
use crate::node::{DiscoveryNode, NodeId};
use crate::shard::{ShardId, ShardRouting, ShardState, UnassignedInfo};

/// Default wait before reallocating replicas of a node that left.
pub const DEFAULT_DELAYED_NODE_LEFT_TIMEOUT: Duration = Duration::from_secs(60);

/// Per-index allocation settings.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct IndexSettings {
    #[serde(
        with = "millis",
        rename = "delayed_node_left_timeout_ms",
        default = "default_delay"
    )]
    pub delayed_node_left_timeout: Duration,
}

fn default_delay() -> Duration {
    DEFAULT_DELAYED_NODE_LEFT_TIMEOUT
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            delayed_node_left_timeout: DEFAULT_DELAYED_NODE_LEFT_TIMEOUT,
        }
    }
}

/// Serialized shape of a routing table.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct RawRoutingTable {
    #[serde(default)]
    nodes: Vec<DiscoveryNode>,
    #[serde(default)]
    shards: Vec<ShardRouting>,
    #[serde(default)]
    index_settings: BTreeMap<String, IndexSettings>,
    #[serde(default)]
    default_settings: IndexSettings,
}

/// Point-in-time view of cluster nodes and shard copies.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRoutingTable", into = "RawRoutingTable")]
pub struct RoutingTable {
    nodes: BTreeMap<NodeId, DiscoveryNode>,
    shards: Vec<ShardRouting>,
    index_settings: BTreeMap<String, IndexSettings>,
    default_settings: IndexSettings,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_node(mut self, node: DiscoveryNode) -> Self {
        self.nodes.insert(node.id.clone(), node);
        self
    }

    pub fn with_shard(mut self, shard: ShardRouting) -> Self {
        self.shards.push(shard);
        self
    }

    pub fn with_index_settings(mut self, index: impl Into<String>, settings: IndexSettings) -> Self {
        self.index_settings.insert(index.into(), settings);
        self
    }

    pub fn with_default_settings(mut self, settings: IndexSettings) -> Self {
        self.default_settings = settings;
        self
    }

    pub fn node(&self, id: &NodeId) -> Option<&DiscoveryNode> {
        self.nodes.get(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &DiscoveryNode> {
        self.nodes.values()
    }

    /// Nodes that can hold shard data, in id order.
    pub fn data_nodes(&self) -> impl Iterator<Item = &DiscoveryNode> {
        self.nodes.values().filter(|node| node.data)
    }

    pub fn shards(&self) -> &[ShardRouting] {
        &self.shards
    }

    /// Unassigned copies, in table order.
    pub fn unassigned(&self) -> impl Iterator<Item = &ShardRouting> {
        self.shards.iter().filter(|shard| shard.unassigned())
    }

    /// The started (or relocating) primary of `shard_id`, if any.
    pub fn active_primary(&self, shard_id: &ShardId) -> Option<&ShardRouting> {
        self.shards
            .iter()
            .find(|shard| shard.primary && shard.active() && &shard.shard_id == shard_id)
    }

    pub fn index_settings(&self, index: &str) -> &IndexSettings {
        self.index_settings.get(index).unwrap_or(&self.default_settings)
    }

    /// Return the initializing replica of `shard_id` on `node` to the
    /// unassigned pool with the given reason.
    pub fn fail_shard(&mut self, shard_id: &ShardId, node: &NodeId, info: UnassignedInfo) -> Result<()> {
        let entry = self
            .shards
            .iter_mut()
            .find(|shard| {
                !shard.primary && &shard.shard_id == shard_id && shard.current_node.as_ref() == Some(node)
            })
            .ok_or_else(|| Error::UnknownShard {
                shard: shard_id.clone(),
                node: Some(node.clone()),
            })?;

        if entry.state != ShardState::Initializing {
            return Err(Error::InvalidRouting(format!(
                "cannot fail {} in state {:?}",
                shard_id, entry.state
            )));
        }

        debug!(shard = %shard_id, node = %node, reason = ?info.reason, "failing shard copy");
        entry.state = ShardState::Unassigned;
        entry.current_node = None;
        entry.relocating_node = None;
        entry.unassigned_info = Some(info);
        Ok(())
    }
}

impl TryFrom<RawRoutingTable> for RoutingTable {
    type Error = Error;

    fn try_from(raw: RawRoutingTable) -> Result<Self> {
        let mut table = RoutingTable::new().with_default_settings(raw.default_settings);
        for node in raw.nodes {
            if table.nodes.contains_key(&node.id) {
                return Err(Error::InvalidRouting(format!("duplicate node [{}]", node.id)));
            }
            table = table.with_node(node);
        }
        for shard in raw.shards {
            for node in shard.current_node.iter().chain(shard.relocating_node.iter()) {
                if !table.nodes.contains_key(node) {
                    return Err(Error::UnknownNode(node.clone()));
                }
            }
            if shard.unassigned() != shard.current_node.is_none() {
                return Err(Error::InvalidRouting(format!(
                    "{} is {:?} but current node is {:?}",
                    shard.shard_id, shard.state, shard.current_node
                )));
            }
            table.shards.push(shard);
        }
        table.index_settings = raw.index_settings;
        Ok(table)
    }
}

impl From<RoutingTable> for RawRoutingTable {
    fn from(table: RoutingTable) -> Self {
        Self {
            nodes: table.nodes.into_values().collect(),
            shards: table.shards,
            index_settings: table.index_settings,
            default_settings: table.default_settings,
        }
    }
}
