//! Swap contract storage decoding.

use serde::Deserialize;
use swaptower_sdk::objects::Hex;
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Errors produced while decoding a storage value.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed storage value: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("refund time is not RFC 3339: {0}")]
    TimeParse(#[from] time::error::Parse),
}

/// Layout of the values stored in a swap map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageSchema {
    /// The primary contract, swapping the native asset.
    Native,
    /// A token swap contract.
    Token,
}

/// A swap as stored in contract storage, independent of the layout.
///
/// `payoff` and `amount` are kept as the indexer rendered them; turning
/// them into decimals is subject to policy and done by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapRecord {
    pub key: Hex,
    pub initiator: String,
    pub participant: String,
    pub refund_time: OffsetDateTime,
    pub payoff: String,
    pub amount: String,
}

#[derive(Deserialize)]
struct NativeValue {
    initiator: String,
    participant: String,
    amount: String,
    payoff: String,
    refund_time: String,
}

#[derive(Deserialize)]
struct TokenValue {
    recipients: Recipients,
    settings: Settings,
}

#[derive(Deserialize)]
struct Recipients {
    initiator: String,
    participant: String,
}

#[derive(Deserialize)]
struct Settings {
    amount: String,
    payoff: String,
    refund_time: String,
}

/// Decode one storage entry.
pub fn decode(
    schema: StorageSchema,
    key: &Hex,
    value: &serde_json::Value,
) -> Result<SwapRecord, DecodeError> {
    let (initiator, participant, amount, payoff, refund_time) = match schema {
        StorageSchema::Native => {
            let v = NativeValue::deserialize(value)?;
            (v.initiator, v.participant, v.amount, v.payoff, v.refund_time)
        }
        StorageSchema::Token => {
            let v = TokenValue::deserialize(value)?;
            (
                v.recipients.initiator,
                v.recipients.participant,
                v.settings.amount,
                v.settings.payoff,
                v.settings.refund_time,
            )
        }
    };

    Ok(SwapRecord {
        key: key.clone(),
        initiator,
        participant,
        refund_time: OffsetDateTime::parse(&refund_time, &Rfc3339)?,
        payoff,
        amount,
    })
}
