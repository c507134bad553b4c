#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

pub mod chain;
pub mod events;
pub mod tezos;

#[cfg(test)]
pub(crate) mod testing;
