//! Micheline parameters of the swap contract entrypoints.

use rust_decimal::Decimal;
use serde_json::{Value, json};
use swaptower_sdk::objects::Hex;
use thiserror::Error;
use time::OffsetDateTime;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParamError {
    /// Michelson `int` arguments must be whole numbers.
    #[error("{field} must be a whole number, got {value}")]
    NotAnInteger { field: &'static str, value: Decimal },
}

/// Fields of an `initiate` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitiateParams<'a> {
    pub hashed_secret: &'a Hex,
    pub participant: &'a str,
    pub refund_time: OffsetDateTime,
    pub payoff: Decimal,
}

fn pair(left: Value, right: Value) -> Value {
    json!({ "prim": "Pair", "args": [left, right] })
}

fn int(field: &'static str, value: Decimal) -> Result<Value, ParamError> {
    if !value.fract().is_zero() {
        return Err(ParamError::NotAnInteger { field, value });
    }
    Ok(json!({ "int": value.trunc().normalize().to_string() }))
}

fn timestamp(value: OffsetDateTime) -> Value {
    json!({ "int": value.unix_timestamp().to_string() })
}

/// `initiate` on the native swap contract; the swapped amount travels as
/// the transaction amount.
///
/// `Pair participant (Pair (Pair hashed_secret refund_time) payoff)`
pub fn native_initiate(args: &InitiateParams<'_>) -> Result<Value, ParamError> {
    Ok(pair(
        json!({ "string": args.participant }),
        pair(
            pair(
                json!({ "bytes": args.hashed_secret.as_str() }),
                timestamp(args.refund_time),
            ),
            int("payoff", args.payoff)?,
        ),
    ))
}

/// `initiate` on a token swap contract; the amount is part of the
/// parameters and the transaction carries no tez.
///
/// `Pair (Pair (Pair hashed_secret participant) (Pair payoff refund_time)) (Pair token amount)`
pub fn token_initiate(
    args: &InitiateParams<'_>,
    token_address: &str,
    amount: Decimal,
) -> Result<Value, ParamError> {
    Ok(pair(
        pair(
            pair(
                json!({ "bytes": args.hashed_secret.as_str() }),
                json!({ "string": args.participant }),
            ),
            pair(int("payoff", args.payoff)?, timestamp(args.refund_time)),
        ),
        pair(
            json!({ "string": token_address }),
            int("amount", amount)?,
        ),
    ))
}

pub fn redeem(secret: &Hex) -> Value {
    json!({ "bytes": secret.as_str() })
}

pub fn refund(hashed_secret: &Hex) -> Value {
    json!({ "bytes": hashed_secret.as_str() })
}
