//! Node abstractions for the cluster.
//!
//! Nodes are identified by a `NodeId` that orders lexicographically. That
//! order is what placement uses to break ties between equally good nodes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier for a node in the cluster.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A node known to the cluster.
///
/// Keep this struct small and cheap to clone; per-node shard state lives in
/// the routing table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryNode {
    pub id: NodeId,
    /// Human-readable name or hostname.
    pub name: String,
    /// Whether the node can hold shard data.
    #[serde(default = "default_data_role")]
    pub data: bool,
}

fn default_data_role() -> bool {
    true
}

impl DiscoveryNode {
    /// Construct a data node.
    pub fn new(id: impl Into<NodeId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            data: true,
        }
    }

    /// Construct a node that holds no shard data (e.g. a dedicated master).
    pub fn non_data(id: impl Into<NodeId>, name: impl Into<String>) -> Self {
        Self {
            data: false,
            ..Self::new(id, name)
        }
    }
}

impl fmt::Display for DiscoveryNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}{{{}}}", self.name, self.id)
    }
}
