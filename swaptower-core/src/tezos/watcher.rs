//! Live watcher worker.
//!
//! Consumes the indexer's real-time stream and publishes what it sees:
//! storage diffs of watched maps become swap events, transaction
//! notifications become operation status updates.

use super::handler::{StorageDiff, SwapUpdateHandler, WatchedMap};
use crate::events::EventPublisher;
use kanau::processor::Processor;
use std::collections::HashMap;
use std::sync::Arc;
use swaptower_sdk::objects::tzkt::{
    BigMapAction, BigMapUpdate, MessageBody, MessageKind, OPERATION_KIND_TRANSACTION, StreamMessage,
    Transaction,
};
use swaptower_sdk::objects::{ChainType, Operation, OperationStatus};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

/// Runs the live loop of one Tezos watcher.
pub struct WatcherRunner {
    handler: Arc<SwapUpdateHandler>,
    maps: HashMap<u64, WatchedMap>,
    publisher: EventPublisher,
    stream_rx: mpsc::Receiver<StreamMessage>,
    shutdown_rx: watch::Receiver<bool>,
}

impl WatcherRunner {
    pub fn new(
        handler: Arc<SwapUpdateHandler>,
        maps: &[WatchedMap],
        publisher: EventPublisher,
        stream_rx: mpsc::Receiver<StreamMessage>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            handler,
            maps: maps.iter().map(|m| (m.ptr, m.clone())).collect(),
            publisher,
            stream_rx,
            shutdown_rx,
        }
    }

    /// Run until shutdown is signalled or the stream ends.
    ///
    /// Shutdown also interrupts a message whose events are waiting for room
    /// on a full bus.
    pub async fn run(mut self) {
        info!(maps = self.maps.len(), "Tezos watcher started");
        let mut shutdown_rx = self.shutdown_rx.clone();

        loop {
            tokio::select! {
                biased;

                _ = async { let _ = shutdown_rx.wait_for(|stop| *stop).await; } => {
                    info!("Tezos watcher shutting down");
                    break;
                }

                message = self.stream_rx.recv() => {
                    let Some(message) = message else {
                        error!("Indexer stream closed");
                        break;
                    };
                    tokio::select! {
                        biased;

                        _ = shutdown_rx.wait_for(|stop| *stop) => {
                            warn!("Tezos watcher shutting down with a message half published");
                            break;
                        }

                        () = self.handle_message(message) => {}
                    }
                }
            }
        }

        info!("Tezos watcher shutdown complete");
    }

    async fn handle_message(&self, message: StreamMessage) {
        match message.kind {
            MessageKind::Data => match message.body {
                MessageBody::BigMaps(updates) => self.handle_big_maps(updates).await,
                MessageBody::Operations(items) => self.handle_operations(items).await,
                MessageBody::Empty => {}
            },
            MessageKind::Reorg => {
                // emitted events are kept, the tracker rejects re-applied diffs
                warn!(
                    channel = ?message.channel,
                    level = message.state,
                    "Indexer reorganization"
                );
            }
            MessageKind::State | MessageKind::Subscribed => {
                debug!(
                    kind = ?message.kind,
                    channel = ?message.channel,
                    level = message.state,
                    "Indexer stream notification"
                );
            }
        }
    }

    async fn handle_big_maps(&self, updates: Vec<BigMapUpdate>) {
        for update in updates {
            let Some(map) = self.maps.get(&update.bigmap) else {
                debug!(ptr = update.bigmap, "Diff on an unwatched storage map");
                continue;
            };
            if update.action == BigMapAction::Allocate {
                continue;
            }
            let level = update.level;
            let Some(diff) = StorageDiff::from_live(map.clone(), update) else {
                continue;
            };
            let key = diff.key.clone();

            match self.handler.process(diff).await {
                Ok(Some(event)) => {
                    self.publisher.publish_event(event).await;
                }
                Ok(None) => {}
                Err(e) => {
                    error!(
                        hashed_secret = %key,
                        level,
                        contract = %map.contract,
                        error = %e,
                        "Failed to handle storage diff"
                    );
                }
            }
        }
    }

    async fn handle_operations(&self, items: Vec<serde_json::Value>) {
        for item in items {
            let is_transaction = item
                .get("type")
                .and_then(|t| t.as_str())
                .is_some_and(|t| t == OPERATION_KIND_TRANSACTION);
            if !is_transaction {
                continue;
            }
            let tx: Transaction = match serde_json::from_value(item) {
                Ok(tx) => tx,
                Err(e) => {
                    warn!(error = %e, "Failed to parse transaction notification");
                    continue;
                }
            };
            self.publisher
                .publish_operation(Operation {
                    hash: tx.hash,
                    chain: ChainType::Tezos,
                    status: OperationStatus::from_indexer(&tx.status),
                    hashed_secret: None,
                })
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventSenders, operation_channel, swap_event_channel};
    use crate::tezos::decoder::StorageSchema;
    use crate::testing::{FakeIndexer, native_value, transaction};
    use rust_decimal::Decimal;
    use serde_json::json;
    use swaptower_sdk::objects::SwapEvent;
    use swaptower_sdk::objects::tzkt::{Alias, BigMapContent, MessageChannel};

    fn update(action: BigMapAction, level: u64, value: serde_json::Value) -> BigMapUpdate {
        BigMapUpdate {
            id: level,
            level,
            bigmap: 42,
            contract: Alias {
                alias: None,
                address: "KT1Swap".to_string(),
            },
            path: "swaps".to_string(),
            action,
            content: Some(BigMapContent {
                hash: "expr".to_string(),
                key: json!("aabb"),
                value,
            }),
        }
    }

    fn data(channel: MessageChannel, body: MessageBody) -> StreamMessage {
        StreamMessage {
            kind: MessageKind::Data,
            channel,
            state: 0,
            body,
        }
    }

    #[tokio::test]
    async fn live_add_and_remove_publish_init_then_refund() {
        let indexer = FakeIndexer::default();
        indexer.add_transaction(105, "KT1Swap", transaction("refund", json!("aabb")));
        let handler = Arc::new(SwapUpdateHandler::new(Arc::new(indexer), Decimal::ONE));
        let maps = [WatchedMap {
            ptr: 42,
            contract: "KT1Swap".to_string(),
            schema: StorageSchema::Native,
        }];

        let (events_tx, events_rx) = swap_event_channel();
        let (ops_tx, ops_rx) = operation_channel();
        let publisher = EventPublisher::new(EventSenders::new(events_tx, ops_tx));
        let (stream_tx, stream_rx) = mpsc::channel(16);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let runner = WatcherRunner::new(handler, &maps, publisher, stream_rx, shutdown_rx);
        let worker = tokio::spawn(runner.run());

        let mut unwatched = update(BigMapAction::AddKey, 99, native_value("5", "1"));
        unwatched.bigmap = 7;
        stream_tx
            .send(data(
                MessageChannel::BigMaps,
                MessageBody::BigMaps(vec![
                    unwatched,
                    update(BigMapAction::Allocate, 99, json!(null)),
                    update(BigMapAction::AddKey, 100, native_value("5", "1")),
                ]),
            ))
            .await
            .unwrap();
        stream_tx
            .send(data(
                MessageChannel::BigMaps,
                MessageBody::BigMaps(vec![update(BigMapAction::RemoveKey, 105, json!(null))]),
            ))
            .await
            .unwrap();
        stream_tx
            .send(data(
                MessageChannel::Operations,
                MessageBody::Operations(vec![
                    json!({"type": "origination", "hash": "oo1"}),
                    json!({"type": "transaction", "hash": "oo2", "status": "applied"}),
                ]),
            ))
            .await
            .unwrap();

        let Some(SwapEvent::Init(init)) = events_rx.recv().await else {
            panic!("expected init event");
        };
        assert_eq!(init.block_height, 100);
        let Some(SwapEvent::Refund(refund)) = events_rx.recv().await else {
            panic!("expected refund event");
        };
        assert_eq!(refund.block_height, 105);

        let op = ops_rx.recv().await.unwrap();
        assert_eq!(op.hash, "oo2");
        assert_eq!(op.status, OperationStatus::Confirmed);

        shutdown_tx.send(true).unwrap();
        worker.await.unwrap();
        assert!(events_rx.try_recv().is_none());
        assert!(ops_rx.try_recv().is_none());
    }

    #[tokio::test]
    async fn notifications_and_empty_data_publish_nothing() {
        let handler = Arc::new(SwapUpdateHandler::new(
            Arc::new(FakeIndexer::default()),
            Decimal::ONE,
        ));
        let maps = [WatchedMap {
            ptr: 42,
            contract: "KT1Swap".to_string(),
            schema: StorageSchema::Native,
        }];
        let (events_tx, events_rx) = swap_event_channel();
        let (ops_tx, ops_rx) = operation_channel();
        let publisher = EventPublisher::new(EventSenders::new(events_tx, ops_tx));
        let (stream_tx, stream_rx) = mpsc::channel(16);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let worker = tokio::spawn(
            WatcherRunner::new(handler, &maps, publisher, stream_rx, shutdown_rx).run(),
        );

        for kind in [MessageKind::State, MessageKind::Subscribed, MessageKind::Reorg] {
            for channel in [MessageChannel::BigMaps, MessageChannel::Operations] {
                stream_tx
                    .send(StreamMessage {
                        kind,
                        channel,
                        state: 120,
                        body: MessageBody::Empty,
                    })
                    .await
                    .unwrap();
            }
        }
        stream_tx
            .send(data(MessageChannel::BigMaps, MessageBody::Empty))
            .await
            .unwrap();
        stream_tx
            .send(data(MessageChannel::BigMaps, MessageBody::BigMaps(Vec::new())))
            .await
            .unwrap();
        stream_tx
            .send(data(MessageChannel::Operations, MessageBody::Operations(Vec::new())))
            .await
            .unwrap();

        // the worker drains everything before it sees the end of the stream
        drop(stream_tx);
        worker.await.unwrap();
        assert!(events_rx.try_recv().is_none());
        assert!(ops_rx.try_recv().is_none());
    }

    #[tokio::test]
    async fn worker_stops_when_stream_ends() {
        let handler = Arc::new(SwapUpdateHandler::new(
            Arc::new(FakeIndexer::default()),
            Decimal::ONE,
        ));
        let (events_tx, _events_rx) = swap_event_channel();
        let (ops_tx, _ops_rx) = operation_channel();
        let publisher = EventPublisher::new(EventSenders::new(events_tx, ops_tx));
        let (stream_tx, stream_rx) = mpsc::channel(1);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        drop(stream_tx);
        WatcherRunner::new(handler, &[], publisher, stream_rx, shutdown_rx)
            .run()
            .await;
    }
}
