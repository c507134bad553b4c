//! Per-swap lifecycle bookkeeping.

use std::collections::HashSet;
use swaptower_sdk::objects::{Hex, SwapEvent};

/// Remembers which swaps already produced an init and a terminal event.
///
/// Restore and the live stream can both observe the same storage change
/// (a diff that lands between the restore snapshot and the subscription,
/// or a diff re-applied after a reorg). The tracker admits the first
/// occurrence and rejects the rest.
///
/// A key moves from `initiated` to `finalized` on its terminal event, so
/// each swap ever seen costs one entry. Hashed secrets are never reused,
/// which means finalized entries are kept for the life of the process and
/// memory grows with the number of swaps observed.
#[derive(Debug, Default)]
pub struct LifecycleTracker {
    initiated: HashSet<Hex>,
    finalized: HashSet<Hex>,
}

impl LifecycleTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the event and report whether it should be published.
    pub fn admit(&mut self, event: &SwapEvent) -> bool {
        match event {
            SwapEvent::Init(e) => {
                !self.finalized.contains(&e.hashed_secret)
                    && self.initiated.insert(e.hashed_secret.clone())
            }
            SwapEvent::Redeem(e) => self.finalize(&e.hashed_secret),
            SwapEvent::Refund(e) => self.finalize(&e.hashed_secret),
            SwapEvent::Restored(_) => true,
        }
    }

    fn finalize(&mut self, hashed_secret: &Hex) -> bool {
        self.initiated.remove(hashed_secret);
        self.finalized.insert(hashed_secret.clone())
    }
}
