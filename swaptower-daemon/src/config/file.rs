//! TOML file configuration structures.
//!
//! These structs directly map to the `swaptower.toml` file format.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use url::Url;

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    pub tezos: TezosConfig,
}

/// Tezos watcher section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TezosConfig {
    /// Node RPC base URL.
    pub node: Url,
    /// TzKT base URL.
    pub tzkt: Url,
    /// Minimum payoff as a decimal string.
    #[serde(default = "default_min_payoff")]
    pub min_payoff: String,
    /// Native swap contract.
    pub contract: String,
    /// Token swap contracts.
    #[serde(default)]
    pub tokens: Vec<String>,
    /// Operation validity window in blocks.
    #[serde(default = "default_ttl")]
    pub ttl: u32,
    /// Operation parameters keyed by contract address.
    #[serde(default)]
    pub operation_params: HashMap<String, OperationParams>,
}

fn default_min_payoff() -> String {
    "0".to_string()
}

fn default_ttl() -> u32 {
    swaptower_sdk::config::DEFAULT_TTL_BLOCKS
}

/// Limits and fee for calls to one contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationParams {
    pub storage_limit: Limits,
    pub gas_limit: Limits,
    /// Fee in mutez.
    #[serde(default = "default_fee")]
    pub fee: u64,
}

fn default_fee() -> u64 {
    1000
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Limits {
    pub initiate: u64,
    pub redeem: u64,
    pub refund: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_parsing() {
        let toml_str = r#"
[tezos]
node = "https://rpc.tzkt.io/mainnet/"
tzkt = "https://api.tzkt.io/"
min_payoff = "0.01"
contract = "KT1VG2WtYdSWz5E7chTeAdDPZNy2MpP8pTfL"
tokens = ["KT1Ap287P1NzsnToSJdA4aqSNjPomRaHBZSr"]

[tezos.operation_params.KT1VG2WtYdSWz5E7chTeAdDPZNy2MpP8pTfL]
storage_limit = { initiate = 257, redeem = 0, refund = 0 }
gas_limit = { initiate = 11000, redeem = 15000, refund = 15000 }

[tezos.operation_params.KT1Ap287P1NzsnToSJdA4aqSNjPomRaHBZSr]
fee = 2500
storage_limit = { initiate = 300, redeem = 100, refund = 100 }
gas_limit = { initiate = 60000, redeem = 60000, refund = 60000 }
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.tezos.ttl, 5);
        assert_eq!(config.tezos.tokens.len(), 1);
        let native = &config.tezos.operation_params["KT1VG2WtYdSWz5E7chTeAdDPZNy2MpP8pTfL"];
        assert_eq!(native.fee, 1000);
        assert_eq!(native.storage_limit.initiate, 257);
        let token = &config.tezos.operation_params["KT1Ap287P1NzsnToSJdA4aqSNjPomRaHBZSr"];
        assert_eq!(token.fee, 2500);
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let toml_str = r#"
[tezos]
node = "http://localhost:8732"
tzkt = "http://localhost:5000"
contract = "KT1Swap"
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.tezos.min_payoff, "0");
        assert!(config.tezos.tokens.is_empty());
        assert!(config.tezos.operation_params.is_empty());
    }
}
