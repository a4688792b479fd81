//! Cluster scenarios loaded from JSON.
//!
//! A scenario is a frozen allocation pass: the routing snapshot, a static
//! policy table, what every node answered when its store was listed, and the
//! clock. Shards without recorded responses behave as a fetch in progress.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use corelib::{NodeId, RoutingTable, ShardId, ShardStoreDigest};
use replication::{InMemoryStoreFetch, NodeFetchError, StaticPolicy};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub routing: RoutingTable,
    #[serde(default)]
    pub policy: StaticPolicy,
    #[serde(default)]
    pub stores: Vec<ShardStores>,
    /// Clock of the pass, in milliseconds.
    #[serde(default)]
    pub now_ms: u64,
}

/// Store listing responses for one shard.
#[derive(Debug, Clone, Deserialize)]
pub struct ShardStores {
    pub shard: ShardId,
    pub responses: BTreeMap<NodeId, StoreResponse>,
}

/// One node's answer: a digest, or the reason it has none.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StoreResponse {
    Failed { error: String },
    Digest(ShardStoreDigest),
}

impl Scenario {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path).with_context(|| format!("reading scenario {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("parsing scenario {}", path.display()))
    }

    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn current_time(&self) -> Duration {
        Duration::from_millis(self.now_ms)
    }

    /// Store fetch answering with the recorded responses.
    pub fn store_fetch(&self) -> InMemoryStoreFetch {
        let mut fetch = InMemoryStoreFetch::new();
        for stores in &self.stores {
            let responses = stores
                .responses
                .iter()
                .map(|(node, response)| {
                    let response = match response {
                        StoreResponse::Digest(digest) => Ok(digest.clone()),
                        StoreResponse::Failed { error } => Err(NodeFetchError::Failed(error.clone())),
                    };
                    (node.clone(), response)
                })
                .collect();
            fetch.complete(stores.shard.clone(), responses);
        }
        fetch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use replication::StoreFetch;

    const SCENARIO: &str = r#"{
        "routing": {
            "nodes": [{"id": "p", "name": "primary"}, {"id": "a", "name": "node-a"}],
            "shards": [
                {"shard_id": {"index": "idx", "id": 0}, "primary": true, "state": "started", "current_node": "p"},
                {"shard_id": {"index": "idx", "id": 0}, "primary": false, "state": "unassigned",
                 "unassigned_info": {"reason": "node_left"}}
            ]
        },
        "stores": [{
            "shard": {"index": "idx", "id": 0},
            "responses": {
                "p": {"files": [{"name": "s1", "length": 100, "checksum": "X"}]},
                "a": {"error": "disk unreadable"}
            }
        }],
        "now_ms": 1500
    }"#;

    #[test]
    fn test_parse_scenario() {
        let scenario = Scenario::parse(SCENARIO).unwrap();
        assert_eq!(scenario.current_time(), Duration::from_millis(1500));
        assert_eq!(scenario.routing.shards().len(), 2);
        assert_eq!(scenario.policy, StaticPolicy::default());
        assert!(matches!(
            scenario.stores[0].responses[&NodeId::new("a")],
            StoreResponse::Failed { .. }
        ));
    }

    #[test]
    fn test_store_fetch_drops_failed_nodes() {
        let scenario = Scenario::parse(SCENARIO).unwrap();
        let mut fetch = scenario.store_fetch();
        let replica = scenario.routing.unassigned().next().unwrap();

        let result = fetch.fetch(replica, &scenario.routing);
        assert!(result.has_data());
        assert!(result.digest(&NodeId::new("p")).is_some());
        assert!(result.digest(&NodeId::new("a")).is_none());
    }

    #[test]
    fn test_unknown_node_in_routing_is_rejected() {
        let raw = r#"{"routing": {"shards": [
            {"shard_id": {"index": "idx", "id": 0}, "primary": true, "state": "started", "current_node": "x"}
        ]}}"#;
        assert!(Scenario::parse(raw).is_err());
    }
}
