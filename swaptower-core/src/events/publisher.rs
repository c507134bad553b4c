use super::channels::EventSenders;
use super::tracker::LifecycleTracker;
use std::sync::{Arc, Mutex, PoisonError};
use swaptower_sdk::objects::{Operation, SwapEvent};
use tracing::{debug, error};

/// Producer side of both buses, shared by the live worker, restore and
/// the transaction pipeline of one watcher.
#[derive(Clone)]
pub struct EventPublisher {
    senders: EventSenders,
    tracker: Arc<Mutex<LifecycleTracker>>,
}

impl EventPublisher {
    pub fn new(senders: EventSenders) -> Self {
        Self {
            senders,
            tracker: Arc::new(Mutex::new(LifecycleTracker::new())),
        }
    }

    /// Publish a swap event unless it duplicates one already published.
    ///
    /// Returns whether the event was sent.
    pub async fn publish_event(&self, event: SwapEvent) -> bool {
        let admitted = self
            .tracker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .admit(&event);
        if !admitted {
            debug!(
                hashed_secret = ?event.hashed_secret(),
                block_height = ?event.block_height(),
                "Skipping duplicate swap event"
            );
            return false;
        }

        if let Err(e) = self.senders.events.send(event).await {
            error!(error = %e, "Failed to publish swap event, bus closed");
            return false;
        }
        true
    }

    /// Publish an operation status update.
    pub async fn publish_operation(&self, operation: Operation) -> bool {
        if let Err(e) = self.senders.operations.send(operation).await {
            error!(error = %e, "Failed to publish operation, bus closed");
            return false;
        }
        true
    }
}
