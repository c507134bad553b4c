pub mod chain;
pub mod events;
pub mod hex;
pub mod operation;
pub mod tzkt;

pub use chain::ChainType;
pub use events::{InitEvent, RedeemEvent, RefundEvent, RestoredEvent, SwapEvent};
pub use hex::Hex;
pub use operation::{Operation, OperationStatus};
