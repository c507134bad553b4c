//! Chain-agnostic watcher interface.
//!
//! Every supported ledger provides one [`Chain`] implementation. The rest of
//! the program drives watchers through this trait only: it initializes and
//! restores them at startup, starts their live workers, asks them to submit
//! swap transactions and drains their event buses.

use crate::events::{OperationReceiver, SwapEventReceiver};
use crate::tezos::api::IndexerError;
use crate::tezos::params::ParamError;
use crate::tezos::pipeline::SubmissionError;
use crate::tezos::rpc::RpcError;
use crate::tezos::signer::SignError;
use crate::tezos::stream::StreamError;
use async_trait::async_trait;
use rust_decimal::Decimal;
use swaptower_sdk::objects::{ChainType, Hex};
use thiserror::Error;
use time::OffsetDateTime;

/// Arguments of an `initiate` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitiateArgs {
    pub hashed_secret: Hex,
    pub participant: String,
    pub refund_time: OffsetDateTime,
    pub payoff: Decimal,
    /// Swapped amount in the contract's smallest unit.
    pub amount: Decimal,
    /// Swap contract to call.
    pub contract: String,
    /// Asset contract, required by token swap contracts.
    pub token_address: Option<String>,
}

/// Watcher lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    Disconnected,
    Connected,
    Listening,
    Closing,
    Closed,
}

/// Errors returned by [`Chain`] methods.
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("indexer error: {0}")]
    Indexer(#[from] IndexerError),

    #[error("node error: {0}")]
    Rpc(#[from] RpcError),

    #[error("stream error: {0}")]
    Stream(#[from] StreamError),

    #[error("submission error: {0}")]
    Submission(#[from] SubmissionError),

    #[error("signer error: {0}")]
    Signer(#[from] SignError),

    #[error("invalid parameters: {0}")]
    Params(#[from] ParamError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("no operation parameters configured for contract {0}")]
    UnconfiguredContract(String),

    #[error("contract {0} is neither the swap contract nor a token contract")]
    UnknownContract(String),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("cannot {action} while {state:?}")]
    InvalidState {
        action: &'static str,
        state: WatcherState,
    },

    #[error("watcher already closed")]
    AlreadyClosed,

    #[error("watcher is closed")]
    Closed,

    #[error("watcher worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// A watcher of one ledger.
#[async_trait]
pub trait Chain: Send + Sync {
    fn chain_type(&self) -> ChainType;

    /// Prime local state from the chain (account counter, watched maps).
    async fn init(&self) -> Result<(), ChainError>;

    /// Connect the real-time stream and start the live worker.
    async fn run(&self) -> Result<(), ChainError>;

    /// Replay what happened while the process was down, then publish
    /// [`RestoredEvent`](swaptower_sdk::objects::RestoredEvent).
    async fn restore(&self) -> Result<(), ChainError>;

    async fn initiate(&self, args: InitiateArgs) -> Result<(), ChainError>;

    async fn redeem(&self, hashed_secret: &Hex, secret: &Hex, contract: &str)
    -> Result<(), ChainError>;

    async fn refund(&self, hashed_secret: &Hex, contract: &str) -> Result<(), ChainError>;

    /// Stop the worker and close both buses.
    async fn close(&self) -> Result<(), ChainError>;

    /// Consumer handle on the swap event bus.
    fn events(&self) -> SwapEventReceiver;

    /// Consumer handle on the operation bus.
    fn operations(&self) -> OperationReceiver;
}
