//! Configuration types for swaptower.
//!
//! These types represent the validated runtime configuration consumed by
//! the watchers. The actual config loading/parsing is handled by the daemon
//! crate.

mod tezos;

pub use tezos::{LimitsByAction, OperationParams, SwapAction, TezosConfig, DEFAULT_TTL_BLOCKS};
