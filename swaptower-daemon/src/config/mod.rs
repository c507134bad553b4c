//! Configuration module for the swaptower daemon.
//!
//! Loads the TOML file, validates it and converts it into the runtime
//! configuration of each watcher. The signing key is not part of the file;
//! it is read from the environment when the watcher is built.

pub mod file;

use crate::config::file::{FileConfig, Limits, OperationParams as FileOperationParams};
use rust_decimal::Decimal;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use swaptower_sdk::config::{LimitsByAction, OperationParams, TezosConfig};
use thiserror::Error;
use url::Url;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    ValidationError(String),
}

/// Loaded configuration.
pub struct LoadedConfig {
    pub tezos: TezosConfig,
}

/// Configuration loader.
pub struct ConfigLoader {
    config_path: PathBuf,
}

impl ConfigLoader {
    pub fn new(config_path: impl AsRef<Path>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
        }
    }

    /// Read, validate and convert the configuration file.
    pub fn load(&self) -> Result<LoadedConfig, ConfigError> {
        let config_content = std::fs::read_to_string(&self.config_path)?;
        parse(&config_content)
    }
}

fn parse(content: &str) -> Result<LoadedConfig, ConfigError> {
    let file_config: FileConfig = toml::from_str(content)?;
    validate(&file_config)?;
    build_loaded_config(file_config)
}

fn validate(config: &FileConfig) -> Result<(), ConfigError> {
    let tezos = &config.tezos;
    if tezos.contract.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "tezos.contract must not be empty".to_string(),
        ));
    }
    if tezos.operation_params.is_empty() {
        return Err(ConfigError::ValidationError(
            "tezos.operation_params must configure at least one contract".to_string(),
        ));
    }
    for contract in std::iter::once(&tezos.contract).chain(&tezos.tokens) {
        if !tezos.operation_params.contains_key(contract) {
            tracing::warn!(
                contract = %contract,
                "No operation parameters for watched contract, calls to it will be rejected"
            );
        }
    }
    Ok(())
}

fn build_loaded_config(file_config: FileConfig) -> Result<LoadedConfig, ConfigError> {
    let tezos = file_config.tezos;
    let min_payoff = Decimal::from_str(tezos.min_payoff.trim()).map_err(|e| {
        ConfigError::ValidationError(format!(
            "tezos.min_payoff {:?} is not a decimal: {e}",
            tezos.min_payoff
        ))
    })?;

    Ok(LoadedConfig {
        tezos: TezosConfig {
            node: with_trailing_slash(tezos.node),
            tzkt: with_trailing_slash(tezos.tzkt),
            min_payoff,
            contract: tezos.contract,
            tokens: tezos.tokens,
            ttl: tezos.ttl,
            operation_params: tezos
                .operation_params
                .into_iter()
                .map(|(contract, params)| (contract, convert_params(params)))
                .collect(),
        },
    })
}

/// Endpoint paths are joined relative to the base URL, which drops the
/// last path segment unless it ends with a slash.
fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

fn convert_limits(l: Limits) -> LimitsByAction {
    LimitsByAction {
        initiate: l.initiate,
        redeem: l.redeem,
        refund: l.refund,
    }
}

fn convert_params(p: FileOperationParams) -> OperationParams {
    OperationParams {
        storage_limit: convert_limits(p.storage_limit),
        gas_limit: convert_limits(p.gas_limit),
        fee: p.fee,
    }
}
