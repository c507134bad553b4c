//! Startup reconciliation.
//!
//! Replays the indexer's view of every watched map so that swaps created
//! or finalized while the process was down reach the event bus before the
//! live watcher starts.

use super::api::{IndexerApi, IndexerError, Page};
use super::handler::{HandleError, StorageDiff, SwapUpdateHandler, WatchedMap};
use crate::events::EventPublisher;
use kanau::processor::Processor;
use swaptower_sdk::objects::Hex;
use swaptower_sdk::objects::tzkt::{BigMapAction, BigMapKey};
use tracing::{debug, error, info, warn};

/// Replays storage maps through a [`SwapUpdateHandler`].
pub struct Restorer<'a> {
    api: &'a dyn IndexerApi,
    handler: &'a SwapUpdateHandler,
    publisher: &'a EventPublisher,
}

impl<'a> Restorer<'a> {
    pub fn new(
        api: &'a dyn IndexerApi,
        handler: &'a SwapUpdateHandler,
        publisher: &'a EventPublisher,
    ) -> Self {
        Self {
            api,
            handler,
            publisher,
        }
    }

    /// Replay every map and return the number of keys seen.
    pub async fn restore(&self, maps: &[WatchedMap]) -> Result<usize, IndexerError> {
        let mut total = 0;
        for map in maps {
            let keys = self.restore_map(map).await?;
            info!(ptr = map.ptr, contract = %map.contract, keys, "Restored storage map");
            total += keys;
        }
        Ok(total)
    }

    async fn restore_map(&self, map: &WatchedMap) -> Result<usize, IndexerError> {
        let mut page = Page::first();
        let mut count = 0;
        loop {
            let keys = self.api.big_map_keys(map.ptr, page).await?;
            for key in &keys {
                self.restore_key(map, key).await?;
            }
            count += keys.len();
            if (keys.len() as u64) < page.limit {
                break;
            }
            page = page.next(keys.len());
        }
        Ok(count)
    }

    async fn restore_key(&self, map: &WatchedMap, key: &BigMapKey) -> Result<(), IndexerError> {
        let created = StorageDiff::added(map.clone(), key);
        let hashed_secret = created.key.clone();
        self.apply(created).await?;

        let lookup = if key.hash.is_empty() {
            hashed_secret.as_str().to_string()
        } else {
            key.hash.clone()
        };
        let updates = self.api.big_map_key_updates(map.ptr, &lookup).await?;

        let newest = match updates.len() {
            0 | 1 => return Ok(()),
            2 => &updates[0],
            n => {
                warn!(
                    hashed_secret = %hashed_secret,
                    history = n,
                    "Storage map key was reused"
                );
                if updates[0].action != BigMapAction::RemoveKey {
                    return Ok(());
                }
                &updates[0]
            }
        };
        self.apply(StorageDiff::historical(map.clone(), hashed_secret, newest))
            .await
    }

    /// Process one diff and publish its event. Only indexer failures are
    /// returned; a single undecodable entry must not block the replay.
    async fn apply(&self, diff: StorageDiff) -> Result<(), IndexerError> {
        let key: Hex = diff.key.clone();
        let level = diff.level;
        match self.handler.process(diff).await {
            Ok(Some(event)) => {
                self.publisher.publish_event(event).await;
                Ok(())
            }
            Ok(None) => {
                debug!(hashed_secret = %key, level, "Storage entry produced no event");
                Ok(())
            }
            Err(HandleError::Indexer(e)) => Err(e),
            Err(e) => {
                error!(hashed_secret = %key, level, error = %e, "Skipping storage entry");
                Ok(())
            }
        }
    }
}
