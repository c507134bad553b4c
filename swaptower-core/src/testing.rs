//! In-memory collaborators for tests.

use crate::tezos::api::{IndexerApi, IndexerError, Page};
use crate::tezos::rpc::{BlockHeader, NodeRpc, RpcError, TransactionContent};
use crate::tezos::signer::{OperationSigner, SignError};
use crate::tezos::stream::{EventStream, StreamError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use swaptower_sdk::config::{LimitsByAction, OperationParams, TezosConfig};
use swaptower_sdk::objects::tzkt::{
    Alias, BigMap, BigMapAction, BigMapKey, BigMapKeyUpdate, StreamMessage, Transaction,
    TransactionParameter,
};
use tokio::sync::mpsc;
use url::Url;

pub const FAKE_SIGNATURE: &str = "5167";
pub const FAKE_ADDRESS: &str = "tz1FakeAccount";

/// Indexer serving fixed history.
#[derive(Default)]
pub struct FakeIndexer {
    maps: Mutex<Vec<BigMap>>,
    keys: Mutex<HashMap<u64, Vec<BigMapKey>>>,
    updates: Mutex<HashMap<(u64, String), Vec<BigMapKeyUpdate>>>,
    transactions: Mutex<HashMap<(u64, String), Vec<Transaction>>>,
    pages: Mutex<Vec<(u64, u64)>>,
    fail_keys: AtomicBool,
}

impl FakeIndexer {
    pub fn add_big_map(&self, ptr: u64, contract: &str) {
        self.maps.lock().unwrap().push(BigMap {
            ptr,
            contract: Alias {
                alias: None,
                address: contract.to_string(),
            },
            path: "swaps".to_string(),
            active: true,
        });
    }

    pub fn add_key(&self, ptr: u64, key: BigMapKey) {
        self.keys.lock().unwrap().entry(ptr).or_default().push(key);
    }

    /// History of `key`, newest first.
    pub fn set_key_updates(&self, ptr: u64, key: &str, updates: Vec<BigMapKeyUpdate>) {
        self.updates
            .lock()
            .unwrap()
            .insert((ptr, expr_hash(key)), updates);
    }

    pub fn add_transaction(&self, level: u64, target: &str, tx: Transaction) {
        self.transactions
            .lock()
            .unwrap()
            .entry((level, target.to_string()))
            .or_default()
            .push(tx);
    }

    /// Make key listing answer with a server error.
    pub fn fail_keys(&self, fail: bool) {
        self.fail_keys.store(fail, Ordering::SeqCst);
    }

    /// `(offset, limit)` of every key page requested.
    pub fn key_pages(&self) -> Vec<(u64, u64)> {
        self.pages.lock().unwrap().clone()
    }
}

#[async_trait]
impl IndexerApi for FakeIndexer {
    async fn big_maps(&self, contracts: &[String]) -> Result<Vec<BigMap>, IndexerError> {
        Ok(self
            .maps
            .lock()
            .unwrap()
            .iter()
            .filter(|m| contracts.contains(&m.contract.address))
            .cloned()
            .collect())
    }

    async fn big_map_keys(&self, ptr: u64, page: Page) -> Result<Vec<BigMapKey>, IndexerError> {
        if self.fail_keys.load(Ordering::SeqCst) {
            return Err(IndexerError::Api {
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        self.pages.lock().unwrap().push((page.offset, page.limit));
        let keys = self.keys.lock().unwrap();
        Ok(keys
            .get(&ptr)
            .map(|k| {
                k.iter()
                    .skip(page.offset as usize)
                    .take(page.limit as usize)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn big_map_key_updates(
        &self,
        ptr: u64,
        key: &str,
    ) -> Result<Vec<BigMapKeyUpdate>, IndexerError> {
        Ok(self
            .updates
            .lock()
            .unwrap()
            .get(&(ptr, key.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn transactions(
        &self,
        level: u64,
        target: &str,
    ) -> Result<Vec<Transaction>, IndexerError> {
        Ok(self
            .transactions
            .lock()
            .unwrap()
            .get(&(level, target.to_string()))
            .cloned()
            .unwrap_or_default())
    }
}

/// Stream fed by the test through the sender returned by [`FakeStream::new`].
pub struct FakeStream {
    rx: Mutex<Option<mpsc::Receiver<StreamMessage>>>,
    subscriptions: Mutex<Vec<String>>,
    closed: AtomicBool,
}

impl FakeStream {
    pub fn new() -> (Self, mpsc::Sender<StreamMessage>) {
        let (tx, rx) = mpsc::channel(64);
        let stream = Self {
            rx: Mutex::new(Some(rx)),
            subscriptions: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        };
        (stream, tx)
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.subscriptions.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventStream for FakeStream {
    async fn connect(&self) -> Result<mpsc::Receiver<StreamMessage>, StreamError> {
        self.rx.lock().unwrap().take().ok_or(StreamError::NotConnected)
    }

    async fn subscribe_to_big_maps(&self, ptr: u64, contract: &str) -> Result<(), StreamError> {
        self.subscriptions
            .lock()
            .unwrap()
            .push(format!("bigmaps:{ptr}:{contract}"));
        Ok(())
    }

    async fn subscribe_to_operations(&self, address: &str) -> Result<(), StreamError> {
        self.subscriptions
            .lock()
            .unwrap()
            .push(format!("operations:{address}"));
        Ok(())
    }

    async fn close(&self) -> Result<(), StreamError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Node recording everything it is asked to do.
pub struct FakeNode {
    counter: i64,
    headers: Mutex<Vec<String>>,
    forged: Mutex<Vec<TransactionContent>>,
    injected: Mutex<Vec<String>>,
    fail_injection: AtomicBool,
}

impl Default for FakeNode {
    fn default() -> Self {
        Self::with_counter(0)
    }
}

impl FakeNode {
    pub fn with_counter(counter: i64) -> Self {
        Self {
            counter,
            headers: Mutex::new(Vec::new()),
            forged: Mutex::new(Vec::new()),
            injected: Mutex::new(Vec::new()),
            fail_injection: AtomicBool::new(false),
        }
    }

    pub fn fail_injection(&self, fail: bool) {
        self.fail_injection.store(fail, Ordering::SeqCst);
    }

    pub fn headers_requested(&self) -> Vec<String> {
        self.headers.lock().unwrap().clone()
    }

    pub fn forged_contents(&self) -> Vec<TransactionContent> {
        self.forged.lock().unwrap().clone()
    }

    pub fn forged_counters(&self) -> Vec<i64> {
        self.forged_contents()
            .iter()
            .map(|c| c.counter.parse().unwrap())
            .collect()
    }

    pub fn injected(&self) -> Vec<String> {
        self.injected.lock().unwrap().clone()
    }
}

#[async_trait]
impl NodeRpc for FakeNode {
    async fn counter(&self, _address: &str) -> Result<i64, RpcError> {
        Ok(self.counter)
    }

    async fn header(&self, block: &str) -> Result<BlockHeader, RpcError> {
        self.headers.lock().unwrap().push(block.to_string());
        Ok(BlockHeader {
            hash: "BLockFake".to_string(),
            chain_id: "NetXFake".to_string(),
            level: 1000,
        })
    }

    async fn forge(&self, _branch: &str, content: &TransactionContent) -> Result<String, RpcError> {
        self.forged.lock().unwrap().push(content.clone());
        Ok(forged_hex(content.counter.parse().unwrap_or_default()))
    }

    async fn inject(&self, signed_hex: &str, _chain_id: &str) -> Result<String, RpcError> {
        if self.fail_injection.load(Ordering::SeqCst) {
            return Err(RpcError::Api {
                status: 500,
                body: "counter_in_the_past".to_string(),
            });
        }
        let mut injected = self.injected.lock().unwrap();
        injected.push(signed_hex.to_string());
        Ok(operation_hash(injected.len()))
    }
}

/// Signer returning [`FAKE_SIGNATURE`] for everything.
#[derive(Default)]
pub struct FakeSigner;

impl OperationSigner for FakeSigner {
    fn address(&self) -> &str {
        FAKE_ADDRESS
    }

    fn sign_forged(&self, _forged_hex: &str) -> Result<String, SignError> {
        Ok(FAKE_SIGNATURE.to_string())
    }
}

/// What [`FakeNode`] forges for a given counter.
pub fn forged_hex(counter: i64) -> String {
    format!("{counter:016x}")
}

/// Hash [`FakeNode`] returns for its `n`-th injection.
pub fn operation_hash(n: usize) -> String {
    format!("ooFake{n}")
}

/// The expression hash the fixtures use for a key.
pub fn expr_hash(key: &str) -> String {
    format!("expr{key}")
}

pub fn native_value(payoff: &str, amount: &str) -> serde_json::Value {
    serde_json::json!({
        "initiator": "tz1Initiator",
        "participant": "tz1Participant",
        "amount": amount,
        "payoff": payoff,
        "refund_time": "2022-01-01T00:00:00Z",
    })
}

pub fn token_value(payoff: &str, amount: &str) -> serde_json::Value {
    serde_json::json!({
        "recipients": {"initiator": "tz1Initiator", "participant": "tz1Participant"},
        "settings": {"amount": amount, "payoff": payoff, "refund_time": "2022-01-01T00:00:00Z"},
        "token_address": "KT1TokenAsset",
    })
}

pub fn big_map_key(key: &str, first_level: u64, value: serde_json::Value) -> BigMapKey {
    BigMapKey {
        id: first_level,
        active: true,
        hash: expr_hash(key),
        key: serde_json::json!(key),
        value,
        first_level,
        last_level: first_level,
        updates: 1,
    }
}

pub fn key_update(id: u64, level: u64, action: BigMapAction) -> BigMapKeyUpdate {
    BigMapKeyUpdate {
        id,
        level,
        action,
        value: serde_json::Value::Null,
    }
}

pub fn transaction(entrypoint: &str, value: serde_json::Value) -> Transaction {
    Transaction {
        kind: "transaction".to_string(),
        id: 1,
        level: 0,
        hash: "ooTx".to_string(),
        sender: None,
        target: None,
        parameter: Some(TransactionParameter {
            entrypoint: entrypoint.to_string(),
            value,
        }),
        status: "applied".to_string(),
    }
}

pub fn operation_params() -> OperationParams {
    OperationParams {
        storage_limit: LimitsByAction {
            initiate: 257,
            redeem: 0,
            refund: 0,
        },
        gas_limit: LimitsByAction {
            initiate: 20000,
            redeem: 15000,
            refund: 15000,
        },
        fee: 1000,
    }
}

/// Watcher configuration over `KT1Swap` (native) and `KT1Token`.
pub fn tezos_config() -> TezosConfig {
    TezosConfig {
        node: Url::parse("http://localhost:8732").unwrap(),
        tzkt: Url::parse("http://localhost:5000").unwrap(),
        min_payoff: rust_decimal::Decimal::ONE,
        contract: "KT1Swap".to_string(),
        tokens: vec!["KT1Token".to_string()],
        ttl: 5,
        operation_params: HashMap::from([
            ("KT1Swap".to_string(), operation_params()),
            ("KT1Token".to_string(), operation_params()),
        ]),
    }
}
