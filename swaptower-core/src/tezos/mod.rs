//! Tezos watcher.
//!
//! [`Tezos`] implements [`Chain`] on top of four collaborators: the TzKT
//! REST API for history, the TzKT real-time stream for live diffs, a node
//! for counters and injection, and a signer holding the account key.

pub mod api;
pub mod decoder;
pub mod handler;
pub mod params;
pub mod pipeline;
pub mod restore;
pub mod rpc;
pub mod signer;
pub mod stream;
pub mod watcher;

pub use api::{IndexerApi, IndexerError, TzktClient};
pub use decoder::{DecodeError, StorageSchema, SwapRecord};
pub use handler::{StorageDiff, SwapUpdateHandler, WatchedMap};
pub use pipeline::{SubmissionError, TransactionPipeline, TransactionRequest};
pub use rpc::{NodeClient, NodeRpc, RpcError};
pub use signer::{Ed25519Signer, OperationSigner, SECRET_ENV_VAR, SignError};
pub use stream::{EventStream, StreamError, TzktEvents};

use crate::chain::{Chain, ChainError, InitiateArgs, WatcherState};
use crate::events::{
    EventPublisher, EventSenders, OperationReceiver, SwapEventReceiver, operation_channel,
    swap_event_channel,
};
use async_trait::async_trait;
use params::InitiateParams;
use restore::Restorer;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use swaptower_sdk::config::{OperationParams, SwapAction, TezosConfig};
use swaptower_sdk::objects::{
    ChainType, Hex, Operation, OperationStatus, RestoredEvent, SwapEvent,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};
use watcher::WatcherRunner;

type Worker = (JoinHandle<()>, watch::Sender<bool>);

/// Watcher of the Tezos swap contracts.
pub struct Tezos {
    config: TezosConfig,
    api: Arc<dyn IndexerApi>,
    stream: Arc<dyn EventStream>,
    rpc: Arc<dyn NodeRpc>,
    pipeline: TransactionPipeline,
    handler: Arc<SwapUpdateHandler>,
    maps: RwLock<Vec<WatchedMap>>,
    state: Mutex<WatcherState>,
    restored: AtomicBool,
    publisher: RwLock<Option<EventPublisher>>,
    events_rx: SwapEventReceiver,
    operations_rx: OperationReceiver,
    worker: tokio::sync::Mutex<Option<Worker>>,
}

impl Tezos {
    pub fn new(
        config: TezosConfig,
        api: Arc<dyn IndexerApi>,
        stream: Arc<dyn EventStream>,
        rpc: Arc<dyn NodeRpc>,
        signer: Arc<dyn OperationSigner>,
    ) -> Result<Self, ChainError> {
        if config.operation_params.is_empty() {
            return Err(ChainError::Config(
                "no operation parameters configured".to_string(),
            ));
        }

        let (events_tx, events_rx) = swap_event_channel();
        let (operations_tx, operations_rx) = operation_channel();
        let publisher = EventPublisher::new(EventSenders::new(events_tx, operations_tx));

        info!(
            address = %signer.address(),
            contract = %config.contract,
            tokens = ?config.tokens,
            "Tezos watcher created"
        );

        Ok(Self {
            handler: Arc::new(SwapUpdateHandler::new(Arc::clone(&api), config.min_payoff)),
            pipeline: TransactionPipeline::new(Arc::clone(&rpc), signer, config.effective_ttl()),
            config,
            api,
            stream,
            rpc,
            maps: RwLock::new(Vec::new()),
            state: Mutex::new(WatcherState::Disconnected),
            restored: AtomicBool::new(false),
            publisher: RwLock::new(Some(publisher)),
            events_rx,
            operations_rx,
            worker: tokio::sync::Mutex::new(None),
        })
    }

    /// Build a watcher talking to the configured TzKT instance and node,
    /// signing with the key from [`SECRET_ENV_VAR`].
    pub fn from_config(config: TezosConfig) -> Result<Self, ChainError> {
        let api = Arc::new(TzktClient::new(config.tzkt.clone()));
        let stream = Arc::new(TzktEvents::new(&config.tzkt)?);
        let rpc = Arc::new(NodeClient::new(config.node.clone()));
        let signer = Arc::new(Ed25519Signer::from_env()?);
        Self::new(config, api, stream, rpc, signer)
    }

    /// Address of the account transactions are sent from.
    pub fn address(&self) -> &str {
        self.pipeline.source()
    }

    pub fn state(&self) -> WatcherState {
        *self.lock_state()
    }

    /// Storage maps discovered by [`Chain::init`].
    pub fn watched_maps(&self) -> Vec<WatchedMap> {
        self.maps
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn lock_state(&self) -> MutexGuard<'_, WatcherState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publisher(&self) -> Result<EventPublisher, ChainError> {
        self.publisher
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(ChainError::Closed)
    }

    fn operation_params(&self, contract: &str) -> Result<OperationParams, ChainError> {
        self.config
            .operation_params
            .get(contract)
            .copied()
            .ok_or_else(|| ChainError::UnconfiguredContract(contract.to_string()))
    }

    async fn send(
        &self,
        hashed_secret: &Hex,
        request: TransactionRequest<'_>,
    ) -> Result<(), ChainError> {
        let publisher = self.publisher()?;
        let hash = self.pipeline.submit(request).await?;
        publisher
            .publish_operation(Operation {
                hash,
                chain: ChainType::Tezos,
                status: OperationStatus::Pending,
                hashed_secret: Some(hashed_secret.clone()),
            })
            .await;
        Ok(())
    }
}

fn whole_units(field: &str, value: Decimal) -> Result<String, ChainError> {
    if value.is_sign_negative() || !value.fract().is_zero() {
        return Err(ChainError::InvalidArguments(format!(
            "{field} must be a non-negative whole number, got {value}"
        )));
    }
    Ok(value.trunc().normalize().to_string())
}

#[async_trait]
impl Chain for Tezos {
    fn chain_type(&self) -> ChainType {
        ChainType::Tezos
    }

    async fn init(&self) -> Result<(), ChainError> {
        self.publisher()?;

        let counter = self.rpc.counter(self.address()).await?;
        self.pipeline.prime(counter);

        let contracts = self.config.watched_contracts();
        let maps: Vec<WatchedMap> = self
            .api
            .big_maps(&contracts)
            .await?
            .into_iter()
            .map(|m| WatchedMap {
                schema: if m.contract.address == self.config.contract {
                    StorageSchema::Native
                } else {
                    StorageSchema::Token
                },
                ptr: m.ptr,
                contract: m.contract.address,
            })
            .collect();

        info!(counter, maps = maps.len(), "Tezos watcher initialized");
        *self.maps.write().unwrap_or_else(PoisonError::into_inner) = maps;
        Ok(())
    }

    async fn run(&self) -> Result<(), ChainError> {
        let publisher = self.publisher()?;
        {
            let state = self.lock_state();
            if *state != WatcherState::Disconnected {
                return Err(ChainError::InvalidState {
                    action: "run",
                    state: *state,
                });
            }
        }

        let stream_rx = self.stream.connect().await?;
        *self.lock_state() = WatcherState::Connected;

        let maps = self.watched_maps();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let runner = WatcherRunner::new(
            Arc::clone(&self.handler),
            &maps,
            publisher,
            stream_rx,
            shutdown_rx,
        );
        *self.worker.lock().await = Some((tokio::spawn(runner.run()), shutdown_tx));

        for map in &maps {
            self.stream
                .subscribe_to_big_maps(map.ptr, &map.contract)
                .await?;
        }
        self.stream
            .subscribe_to_operations(&self.config.contract)
            .await?;
        for token in &self.config.tokens {
            self.stream.subscribe_to_operations(token).await?;
        }

        *self.lock_state() = WatcherState::Listening;
        info!(maps = maps.len(), "Tezos watcher listening");
        Ok(())
    }

    async fn restore(&self) -> Result<(), ChainError> {
        let publisher = self.publisher()?;
        let state = self.state();
        if self.restored.load(Ordering::Acquire) || state != WatcherState::Disconnected {
            return Err(ChainError::InvalidState {
                action: "restore",
                state,
            });
        }
        let maps = self.watched_maps();

        info!(maps = maps.len(), "Restoring Tezos swaps");
        let keys = Restorer::new(self.api.as_ref(), &self.handler, &publisher)
            .restore(&maps)
            .await?;

        let restored = SwapEvent::from(RestoredEvent {
            chain: ChainType::Tezos,
        });
        publisher.publish_event(restored).await;
        self.restored.store(true, Ordering::Release);
        info!(keys, "Tezos swaps restored");
        Ok(())
    }

    async fn initiate(&self, args: InitiateArgs) -> Result<(), ChainError> {
        self.publisher()?;
        info!(
            hashed_secret = %args.hashed_secret,
            contract = %args.contract,
            "Initiating swap"
        );
        let params = self.operation_params(&args.contract)?;

        let call = InitiateParams {
            hashed_secret: &args.hashed_secret,
            participant: &args.participant,
            refund_time: args.refund_time,
            payoff: args.payoff,
        };
        let (amount, value) = if args.contract == self.config.contract {
            (
                whole_units("amount", args.amount)?,
                params::native_initiate(&call)?,
            )
        } else if self.config.is_token_contract(&args.contract) {
            let token = args.token_address.as_deref().ok_or_else(|| {
                ChainError::InvalidArguments("token swaps need a token address".to_string())
            })?;
            whole_units("amount", args.amount)?;
            (
                "0".to_string(),
                params::token_initiate(&call, token, args.amount)?,
            )
        } else {
            return Err(ChainError::UnknownContract(args.contract));
        };

        self.send(
            &args.hashed_secret,
            TransactionRequest {
                destination: &args.contract,
                amount,
                params,
                action: SwapAction::Initiate,
                value,
            },
        )
        .await
    }

    async fn redeem(
        &self,
        hashed_secret: &Hex,
        secret: &Hex,
        contract: &str,
    ) -> Result<(), ChainError> {
        self.publisher()?;
        info!(hashed_secret = %hashed_secret, contract, "Redeeming swap");
        let params = self.operation_params(contract)?;
        self.send(
            hashed_secret,
            TransactionRequest {
                destination: contract,
                amount: "0".to_string(),
                params,
                action: SwapAction::Redeem,
                value: params::redeem(secret),
            },
        )
        .await
    }

    async fn refund(&self, hashed_secret: &Hex, contract: &str) -> Result<(), ChainError> {
        self.publisher()?;
        info!(hashed_secret = %hashed_secret, contract, "Refunding swap");
        let params = self.operation_params(contract)?;
        self.send(
            hashed_secret,
            TransactionRequest {
                destination: contract,
                amount: "0".to_string(),
                params,
                action: SwapAction::Refund,
                value: params::refund(hashed_secret),
            },
        )
        .await
    }

    async fn close(&self) -> Result<(), ChainError> {
        {
            let mut state = self.lock_state();
            if matches!(*state, WatcherState::Closing | WatcherState::Closed) {
                return Err(ChainError::AlreadyClosed);
            }
            *state = WatcherState::Closing;
        }
        info!("Closing Tezos watcher");

        let worker = self.worker.lock().await.take();
        let joined = match worker {
            Some((handle, shutdown_tx)) => {
                let _ = shutdown_tx.send(true);
                handle.await
            }
            None => Ok(()),
        };

        if let Err(e) = self.stream.close().await {
            error!(error = %e, "Failed to close indexer stream");
        }

        // dropping the last senders closes both buses
        self.publisher
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        *self.lock_state() = WatcherState::Closed;
        info!("Tezos watcher closed");

        joined.map_err(ChainError::from)
    }

    fn events(&self) -> SwapEventReceiver {
        self.events_rx.clone()
    }

    fn operations(&self) -> OperationReceiver {
        self.operations_rx.clone()
    }
}
