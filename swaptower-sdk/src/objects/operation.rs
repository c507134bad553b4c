use super::chain::ChainType;
use super::hex::Hex;
use serde::{Deserialize, Serialize};

/// Status of a submitted or observed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    /// Injected, not yet seen in a block.
    Pending,
    /// Included and applied.
    Confirmed,
    /// Included but failed.
    Failed,
    /// Reverted because a later operation of the same group failed.
    Backtracked,
    /// Not executed because an earlier operation of the same group failed.
    Skipped,
}

impl OperationStatus {
    /// Map an indexer status string.
    ///
    /// Unknown values are treated as still pending.
    pub fn from_indexer(status: &str) -> Self {
        match status {
            "applied" => OperationStatus::Confirmed,
            "failed" => OperationStatus::Failed,
            "backtracked" => OperationStatus::Backtracked,
            "skipped" => OperationStatus::Skipped,
            _ => OperationStatus::Pending,
        }
    }
}

/// An operation submitted by the watch tower or observed on a watched
/// contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub hash: String,
    pub chain: ChainType,
    pub status: OperationStatus,
    /// The swap the operation acts on, known only for operations this
    /// process submitted.
    pub hashed_secret: Option<Hex>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indexer_status_mapping() {
        assert_eq!(OperationStatus::from_indexer("applied"), OperationStatus::Confirmed);
        assert_eq!(OperationStatus::from_indexer("failed"), OperationStatus::Failed);
        assert_eq!(
            OperationStatus::from_indexer("backtracked"),
            OperationStatus::Backtracked
        );
        assert_eq!(OperationStatus::from_indexer("skipped"), OperationStatus::Skipped);
        assert_eq!(OperationStatus::from_indexer("whatever"), OperationStatus::Pending);
    }
}
