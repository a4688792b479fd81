//! Coarse verdict returned by allocation policies.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Outcome of asking a policy whether a shard may go to a node.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Yes,
    No,
    Throttle,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Yes => f.write_str("YES"),
            Decision::No => f.write_str("NO"),
            Decision::Throttle => f.write_str("THROTTLE"),
        }
    }
}
