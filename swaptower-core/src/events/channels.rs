//! Event channel factories and handles.
//!
//! Provides the two buses every watcher publishes on: swap lifecycle
//! events and operation status updates. Both are bounded; the receiving
//! ends are wrapped in cloneable handles so several consumers can drain
//! the same queue (each message is delivered to exactly one of them).

use std::sync::Arc;
use swaptower_sdk::objects::{Operation, SwapEvent};
use tokio::sync::{Mutex, mpsc};

/// Buffer size of the swap event channel.
///
/// Restore replays every live key of every watched map in one burst, so
/// this is much larger than the operation buffer.
pub const EVENT_CHANNEL_BUFFER: usize = 16 * 1024;

/// Buffer size of the operation channel.
pub const OPERATION_CHANNEL_BUFFER: usize = 1024;

/// Sender handle for swap events.
pub type SwapEventSender = mpsc::Sender<SwapEvent>;
/// Receiver handle for swap events.
pub type SwapEventReceiver = BusReceiver<SwapEvent>;

/// Sender handle for operations.
pub type OperationSender = mpsc::Sender<Operation>;
/// Receiver handle for operations.
pub type OperationReceiver = BusReceiver<Operation>;

/// Consuming end of a bus.
///
/// Cloning yields another consumer of the same queue. `recv` returns
/// `None` once every sender is gone and the queue is drained.
pub struct BusReceiver<T> {
    inner: Arc<Mutex<mpsc::Receiver<T>>>,
}

impl<T> BusReceiver<T> {
    fn new(rx: mpsc::Receiver<T>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(rx)),
        }
    }

    /// Wait for the next message.
    pub async fn recv(&self) -> Option<T> {
        self.inner.lock().await.recv().await
    }

    /// Take a message if one is immediately available.
    pub fn try_recv(&self) -> Option<T> {
        let mut guard = self.inner.try_lock().ok()?;
        guard.try_recv().ok()
    }
}

impl<T> Clone for BusReceiver<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Create a new swap event channel.
pub fn swap_event_channel() -> (SwapEventSender, SwapEventReceiver) {
    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_BUFFER);
    (tx, BusReceiver::new(rx))
}

/// Create a new operation channel.
pub fn operation_channel() -> (OperationSender, OperationReceiver) {
    let (tx, rx) = mpsc::channel(OPERATION_CHANNEL_BUFFER);
    (tx, BusReceiver::new(rx))
}

/// Container for both bus senders.
#[derive(Clone)]
pub struct EventSenders {
    /// Sender for swap lifecycle events
    pub events: SwapEventSender,
    /// Sender for operation status updates
    pub operations: OperationSender,
}

impl EventSenders {
    /// Create a new EventSenders container.
    pub fn new(events: SwapEventSender, operations: OperationSender) -> Self {
        Self { events, operations }
    }
}
