//! Event buses shared by all chain watchers.
//!
//! # Event Flow
//!
//! 1. Restore replays indexer history -> `SwapEvent`s, then `Restored`
//! 2. The live worker turns storage diffs -> `SwapEvent`s and operation
//!    notifications -> `Operation`s
//! 3. The transaction pipeline reports submitted transactions -> `Operation`s
//!
//! Consumers drain both buses through [`BusReceiver`] handles.

pub mod channels;
pub mod publisher;
pub mod tracker;

pub use channels::{
    BusReceiver, EVENT_CHANNEL_BUFFER, EventSenders, OPERATION_CHANNEL_BUFFER, OperationReceiver,
    OperationSender, SwapEventReceiver, SwapEventSender, operation_channel, swap_event_channel,
};
pub use publisher::EventPublisher;
pub use tracker::LifecycleTracker;
