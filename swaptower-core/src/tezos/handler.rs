//! Storage diff handling shared by the live watcher and restore.
//!
//! Both paths reduce what they observe to a [`StorageDiff`] and feed it to
//! [`SwapUpdateHandler`], so a diff seen live and the same diff replayed
//! from history produce the same event.

use super::api::{IndexerApi, IndexerError};
use super::decoder::{self, DecodeError, StorageSchema};
use kanau::processor::Processor;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;
use swaptower_sdk::objects::tzkt::{BigMapAction, BigMapKey, BigMapKeyUpdate, BigMapUpdate};
use swaptower_sdk::objects::{ChainType, Hex, InitEvent, RedeemEvent, RefundEvent, SwapEvent};
use thiserror::Error;
use tracing::{debug, warn};

/// A storage map the watcher follows, with its layout resolved once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchedMap {
    pub ptr: u64,
    pub contract: String,
    pub schema: StorageSchema,
}

/// One change of one swap map key.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageDiff {
    pub map: WatchedMap,
    pub level: u64,
    pub action: BigMapAction,
    pub key: Hex,
    pub value: serde_json::Value,
}

impl StorageDiff {
    /// A diff pushed by the real-time stream. `None` for map-level actions,
    /// which carry no key.
    pub fn from_live(map: WatchedMap, update: BigMapUpdate) -> Option<Self> {
        let content = update.content?;
        Some(Self {
            map,
            level: update.level,
            action: update.action,
            key: Hex::from_parameter_value(&content.key),
            value: content.value,
        })
    }

    /// The creation of a key listed by the indexer.
    pub fn added(map: WatchedMap, key: &BigMapKey) -> Self {
        Self {
            map,
            level: key.first_level,
            action: BigMapAction::AddKey,
            key: Hex::from_parameter_value(&key.key),
            value: key.value.clone(),
        }
    }

    /// An entry of a key's history.
    pub fn historical(map: WatchedMap, key: Hex, update: &BigMapKeyUpdate) -> Self {
        Self {
            map,
            level: update.level,
            action: update.action,
            key,
            value: update.value.clone(),
        }
    }
}

/// Errors raised while turning a diff into an event.
#[derive(Debug, Error)]
pub enum HandleError {
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("invalid payoff {0:?}")]
    InvalidPayoff(String),

    #[error("invalid amount {0:?}")]
    InvalidAmount(String),

    #[error("indexer error: {0}")]
    Indexer(#[from] IndexerError),
}

/// Turns storage diffs into swap events.
pub struct SwapUpdateHandler {
    api: Arc<dyn IndexerApi>,
    min_payoff: Decimal,
    chain: ChainType,
}

impl SwapUpdateHandler {
    pub fn new(api: Arc<dyn IndexerApi>, min_payoff: Decimal) -> Self {
        Self {
            api,
            min_payoff,
            chain: ChainType::Tezos,
        }
    }

    fn init_event(&self, diff: &StorageDiff) -> Result<Option<InitEvent>, HandleError> {
        let record = decoder::decode(diff.map.schema, &diff.key, &diff.value)?;

        let payoff = Decimal::from_str(record.payoff.trim())
            .map_err(|_| HandleError::InvalidPayoff(record.payoff.clone()))?;
        if payoff < self.min_payoff {
            warn!(
                hashed_secret = %record.key,
                payoff = %payoff,
                min_payoff = %self.min_payoff,
                "Skipping swap because of small payoff"
            );
            return Ok(None);
        }
        let amount = Decimal::from_str(record.amount.trim())
            .map_err(|_| HandleError::InvalidAmount(record.amount.clone()))?;

        Ok(Some(InitEvent {
            hashed_secret: record.key,
            chain: self.chain,
            contract: diff.map.contract.clone(),
            block_height: diff.level,
            initiator: record.initiator,
            participant: record.participant,
            refund_time: record.refund_time,
            payoff,
            amount,
        }))
    }

    /// Find out whether a removal was a redeem or a refund by looking at
    /// the transactions sent to the contract in the same block.
    async fn resolve_removal(&self, diff: &StorageDiff) -> Result<Option<SwapEvent>, HandleError> {
        let transactions = self
            .api
            .transactions(diff.level, &diff.map.contract)
            .await?;

        for tx in transactions {
            let Some(parameter) = tx.parameter else {
                continue;
            };
            match parameter.entrypoint.as_str() {
                "redeem" => {
                    return Ok(Some(SwapEvent::from(RedeemEvent {
                        hashed_secret: diff.key.clone(),
                        chain: self.chain,
                        contract: diff.map.contract.clone(),
                        block_height: diff.level,
                        secret: Hex::from_parameter_value(&parameter.value),
                    })));
                }
                "refund" => {
                    return Ok(Some(SwapEvent::from(RefundEvent {
                        hashed_secret: diff.key.clone(),
                        chain: self.chain,
                        contract: diff.map.contract.clone(),
                        block_height: diff.level,
                    })));
                }
                _ => {}
            }
        }

        debug!(
            hashed_secret = %diff.key,
            level = diff.level,
            contract = %diff.map.contract,
            "Unresolved removal, no redeem or refund found in block"
        );
        Ok(None)
    }
}

impl Processor<StorageDiff> for SwapUpdateHandler {
    type Output = Option<SwapEvent>;
    type Error = HandleError;

    async fn process(&self, diff: StorageDiff) -> Result<Option<SwapEvent>, HandleError> {
        match diff.action {
            BigMapAction::AddKey => Ok(self.init_event(&diff)?.map(SwapEvent::from)),
            BigMapAction::RemoveKey => self.resolve_removal(&diff).await,
            // values of a swap never change meaning once stored
            BigMapAction::UpdateKey => Ok(None),
            BigMapAction::Allocate | BigMapAction::Remove | BigMapAction::Unknown => Ok(None),
        }
    }
}
