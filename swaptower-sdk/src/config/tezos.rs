//! Tezos watcher configuration.

use rust_decimal::Decimal;
use std::collections::HashMap;
use url::Url;

/// Operation validity window used when the configured value is below 1.
pub const DEFAULT_TTL_BLOCKS: u32 = 5;

/// The swap-advancing calls the watch tower can submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SwapAction {
    Initiate,
    Redeem,
    Refund,
}

impl SwapAction {
    /// Contract entrypoint invoked by this action.
    pub fn entrypoint(self) -> &'static str {
        match self {
            SwapAction::Initiate => "initiate",
            SwapAction::Redeem => "redeem",
            SwapAction::Refund => "refund",
        }
    }
}

/// One limit per swap action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LimitsByAction {
    pub initiate: u64,
    pub redeem: u64,
    pub refund: u64,
}

impl LimitsByAction {
    pub fn get(&self, action: SwapAction) -> u64 {
        match action {
            SwapAction::Initiate => self.initiate,
            SwapAction::Redeem => self.redeem,
            SwapAction::Refund => self.refund,
        }
    }
}

/// Gas, storage and fee parameters for calls to one contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationParams {
    pub storage_limit: LimitsByAction,
    pub gas_limit: LimitsByAction,
    /// Fee in mutez.
    pub fee: u64,
}

/// Runtime configuration of a Tezos watcher.
#[derive(Debug, Clone)]
pub struct TezosConfig {
    /// Node RPC base URL.
    pub node: Url,
    /// TzKT indexer base URL (REST and real-time events).
    pub tzkt: Url,
    /// Swaps paying the participant less than this are ignored.
    pub min_payoff: Decimal,
    /// Address of the native-asset swap contract.
    pub contract: String,
    /// Addresses of the token swap contracts.
    pub tokens: Vec<String>,
    /// Operation validity window, in blocks behind head.
    pub ttl: u32,
    /// Per-contract operation parameters, keyed by contract address.
    pub operation_params: HashMap<String, OperationParams>,
}

impl TezosConfig {
    /// Whether the address is one of the configured token swap contracts.
    pub fn is_token_contract(&self, address: &str) -> bool {
        self.tokens.iter().any(|t| t == address)
    }

    /// All watched contracts, primary contract last.
    pub fn watched_contracts(&self) -> Vec<String> {
        let mut contracts = self.tokens.clone();
        contracts.push(self.contract.clone());
        contracts
    }

    /// TTL with the lower bound applied.
    pub fn effective_ttl(&self) -> u32 {
        if self.ttl < 1 {
            DEFAULT_TTL_BLOCKS
        } else {
            self.ttl
        }
    }
}
