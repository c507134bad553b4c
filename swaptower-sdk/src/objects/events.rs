//! Swap lifecycle events.
//!
//! Every watcher publishes the same event shape regardless of the ledger
//! it observes. For a given hashed secret, consumers see at most one
//! [`SwapEvent::Init`] followed by at most one terminal event
//! ([`SwapEvent::Redeem`] or [`SwapEvent::Refund`]).

use super::chain::ChainType;
use super::hex::Hex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// An HTLC was created in contract storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitEvent {
    pub hashed_secret: Hex,
    pub chain: ChainType,
    pub contract: String,
    pub block_height: u64,
    pub initiator: String,
    pub participant: String,
    #[serde(with = "time::serde::rfc3339")]
    pub refund_time: OffsetDateTime,
    pub payoff: Decimal,
    pub amount: Decimal,
}

/// The counterparty revealed the secret and the HTLC was removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedeemEvent {
    pub hashed_secret: Hex,
    pub chain: ChainType,
    pub contract: String,
    pub block_height: u64,
    pub secret: Hex,
}

/// The HTLC timed out and was refunded to the initiator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundEvent {
    pub hashed_secret: Hex,
    pub chain: ChainType,
    pub contract: String,
    pub block_height: u64,
}

/// Reconciliation of the chain finished; only live events follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoredEvent {
    pub chain: ChainType,
}

/// A swap lifecycle event.
///
/// Serialized as an internally-tagged JSON object:
///
/// ```json
/// {"type":"refund","hashed_secret":"ab..","chain":"tezos","contract":"KT1..","block_height":105}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SwapEvent {
    Init(InitEvent),
    Redeem(RedeemEvent),
    Refund(RefundEvent),
    Restored(RestoredEvent),
}

impl SwapEvent {
    /// The chain the event was observed on.
    pub fn chain(&self) -> ChainType {
        match self {
            SwapEvent::Init(e) => e.chain,
            SwapEvent::Redeem(e) => e.chain,
            SwapEvent::Refund(e) => e.chain,
            SwapEvent::Restored(e) => e.chain,
        }
    }

    /// The swap this event belongs to, `None` for the restore sentinel.
    pub fn hashed_secret(&self) -> Option<&Hex> {
        match self {
            SwapEvent::Init(e) => Some(&e.hashed_secret),
            SwapEvent::Redeem(e) => Some(&e.hashed_secret),
            SwapEvent::Refund(e) => Some(&e.hashed_secret),
            SwapEvent::Restored(_) => None,
        }
    }

    /// Block height the event was observed at, `None` for the restore sentinel.
    pub fn block_height(&self) -> Option<u64> {
        match self {
            SwapEvent::Init(e) => Some(e.block_height),
            SwapEvent::Redeem(e) => Some(e.block_height),
            SwapEvent::Refund(e) => Some(e.block_height),
            SwapEvent::Restored(_) => None,
        }
    }
}

impl From<InitEvent> for SwapEvent {
    fn from(value: InitEvent) -> Self {
        SwapEvent::Init(value)
    }
}

impl From<RedeemEvent> for SwapEvent {
    fn from(value: RedeemEvent) -> Self {
        SwapEvent::Redeem(value)
    }
}

impl From<RefundEvent> for SwapEvent {
    fn from(value: RefundEvent) -> Self {
        SwapEvent::Refund(value)
    }
}

impl From<RestoredEvent> for SwapEvent {
    fn from(value: RestoredEvent) -> Self {
        SwapEvent::Restored(value)
    }
}
