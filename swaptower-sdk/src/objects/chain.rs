use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// All ledgers a watcher can be built for
#[serde(rename_all = "lowercase")]
pub enum ChainType {
    Tezos,
}

impl fmt::Display for ChainType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainType::Tezos => write!(f, "tezos"),
        }
    }
}
