//! Wire objects of the TzKT indexer.
//!
//! Only the fields the watch tower reads are modelled; everything else in
//! the indexer's responses is ignored during deserialization.

use serde::{Deserialize, Serialize};

/// Account or contract reference.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Alias {
    #[serde(default)]
    pub alias: Option<String>,
    pub address: String,
}

/// A storage map (Tezos big map) attached to a contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BigMap {
    pub ptr: u64,
    pub contract: Alias,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub active: bool,
}

/// A key of a storage map as listed by `GET /v1/bigmaps/{ptr}/keys`.
///
/// The listing includes keys that were removed since, in which case
/// `active` is false and `value` holds the last value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BigMapKey {
    pub id: u64,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub hash: String,
    pub key: serde_json::Value,
    #[serde(default)]
    pub value: serde_json::Value,
    pub first_level: u64,
    #[serde(default)]
    pub last_level: u64,
    #[serde(default)]
    pub updates: u64,
}

/// What happened to a storage map or one of its keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BigMapAction {
    /// The map itself was created.
    Allocate,
    AddKey,
    UpdateKey,
    RemoveKey,
    /// The map itself was removed.
    Remove,
    #[serde(other)]
    Unknown,
}

/// One entry of a key's history (`GET /v1/bigmaps/{ptr}/keys/{key}/updates`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BigMapKeyUpdate {
    pub id: u64,
    pub level: u64,
    pub action: BigMapAction,
    #[serde(default)]
    pub value: serde_json::Value,
}

/// Key/value payload of a real-time storage map diff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BigMapContent {
    #[serde(default)]
    pub hash: String,
    pub key: serde_json::Value,
    #[serde(default)]
    pub value: serde_json::Value,
}

/// A real-time storage map diff pushed on the `bigmaps` channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BigMapUpdate {
    pub id: u64,
    pub level: u64,
    pub bigmap: u64,
    pub contract: Alias,
    #[serde(default)]
    pub path: String,
    pub action: BigMapAction,
    /// Absent for map-level actions (`allocate`, `remove`).
    #[serde(default)]
    pub content: Option<BigMapContent>,
}

/// Entrypoint call carried by a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionParameter {
    pub entrypoint: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

/// A transaction as returned by `GET /v1/operations/transactions` and as
/// pushed on the `operations` channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(rename = "type", default = "default_operation_kind")]
    pub kind: String,
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub level: u64,
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub sender: Option<Alias>,
    #[serde(default)]
    pub target: Option<Alias>,
    #[serde(default)]
    pub parameter: Option<TransactionParameter>,
    #[serde(default)]
    pub status: String,
}

fn default_operation_kind() -> String {
    OPERATION_KIND_TRANSACTION.to_string()
}

/// Operation kind of transactions.
pub const OPERATION_KIND_TRANSACTION: &str = "transaction";

/// Kind of a real-time message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Current indexer level, sent after subscribing.
    State,
    /// New data on the channel.
    Data,
    /// The indexer rolled back to the carried level.
    Reorg,
    /// A subscription request was acknowledged.
    Subscribed,
}

/// Channel a real-time message was pushed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageChannel {
    BigMaps,
    Operations,
}

/// Decoded payload of a real-time message.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageBody {
    BigMaps(Vec<BigMapUpdate>),
    /// Raw operation items; non-transaction kinds are kept so that the
    /// consumer decides what to ignore.
    Operations(Vec<serde_json::Value>),
    Empty,
}

/// A message received from the indexer's real-time stream.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamMessage {
    pub kind: MessageKind,
    pub channel: MessageChannel,
    /// Indexer level the message refers to.
    pub state: u64,
    pub body: MessageBody,
}
