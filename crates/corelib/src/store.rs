//! On-disk state of a shard copy, as reported by the node holding it.
//!
//! A `ShardStoreDigest` lists the copy's files, an optional sync id and, when
//! it was taken from the primary, the peer-recovery retention leases the
//! primary holds for other nodes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::node::NodeId;

/// Retaining sequence number reported when no retention lease exists.
pub const NO_RETAINING_SEQ_NO: i64 = -1;

/// One data file of a shard copy.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct StoreFileMetadata {
    pub name: String,
    pub length: u64,
    /// Opaque content identity (e.g. a checksum).
    pub checksum: String,
}

impl StoreFileMetadata {
    pub fn new(name: impl Into<String>, length: u64, checksum: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            length,
            checksum: checksum.into(),
        }
    }

    /// Same name, length and content identity.
    pub fn is_same(&self, other: &StoreFileMetadata) -> bool {
        self.name == other.name && self.length == other.length && self.checksum == other.checksum
    }
}

/// Summary of one node's copy of a shard.
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct ShardStoreDigest {
    #[serde(default, with = "file_list")]
    files: BTreeMap<String, StoreFileMetadata>,
    #[serde(default)]
    sync_id: Option<String>,
    /// Retaining sequence number of each peer-recovery retention lease.
    #[serde(default)]
    retention_leases: BTreeMap<NodeId, i64>,
}

impl ShardStoreDigest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a digest from a file list, rejecting duplicate file names.
    pub fn from_files(files: impl IntoIterator<Item = StoreFileMetadata>) -> Result<Self> {
        let mut digest = Self::new();
        for file in files {
            if digest.files.contains_key(&file.name) {
                return Err(Error::InvalidDigest(format!("duplicate file [{}]", file.name)));
            }
            digest.files.insert(file.name.clone(), file);
        }
        Ok(digest)
    }

    /// Add or replace a file entry.
    pub fn with_file(mut self, file: StoreFileMetadata) -> Self {
        self.files.insert(file.name.clone(), file);
        self
    }

    pub fn with_sync_id(mut self, sync_id: impl Into<String>) -> Self {
        self.sync_id = Some(sync_id.into());
        self
    }

    pub fn with_retention_lease(mut self, node: NodeId, retaining_seq_no: i64) -> Self {
        self.retention_leases.insert(node, retaining_seq_no);
        self
    }

    /// A digest without files carries no reusable data.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn file_exists(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }

    pub fn file(&self, name: &str) -> Option<&StoreFileMetadata> {
        self.files.get(name)
    }

    pub fn files(&self) -> impl Iterator<Item = &StoreFileMetadata> {
        self.files.values()
    }

    pub fn total_bytes(&self) -> u64 {
        self.files.values().map(|f| f.length).sum()
    }

    pub fn sync_id(&self) -> Option<&str> {
        self.sync_id.as_deref()
    }

    /// Highest sequence number the primary retains for `node`, or
    /// [`NO_RETAINING_SEQ_NO`] without a lease.
    pub fn retaining_seq_no(&self, node: &NodeId) -> i64 {
        self.retention_leases
            .get(node)
            .copied()
            .unwrap_or(NO_RETAINING_SEQ_NO)
    }
}

/// Files are written as a list; the map key is derived from the name.
mod file_list {
    use std::collections::BTreeMap;

    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::{ShardStoreDigest, StoreFileMetadata};

    pub fn serialize<S: Serializer>(
        files: &BTreeMap<String, StoreFileMetadata>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let list: Vec<&StoreFileMetadata> = files.values().collect();
        list.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<String, StoreFileMetadata>, D::Error> {
        let list = Vec::<StoreFileMetadata>::deserialize(deserializer)?;
        ShardStoreDigest::from_files(list)
            .map(|digest| digest.files)
            .map_err(D::Error::custom)
    }
}
