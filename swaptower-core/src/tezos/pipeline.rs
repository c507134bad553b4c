//! Transaction submission: counter, header, forge, sign, inject.

use super::rpc::{NodeRpc, RpcError, TransactionContent, TransactionParameters};
use super::signer::{OperationSigner, SignError};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use swaptower_sdk::config::{OperationParams, SwapAction};
use thiserror::Error;
use tracing::{debug, info};

/// A failed submission. The counter value it consumed is not reused.
#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("failed to fetch block header: {0}")]
    Header(#[source] RpcError),

    #[error("failed to forge operation: {0}")]
    Forge(#[source] RpcError),

    #[error("failed to sign operation: {0}")]
    Sign(#[from] SignError),

    #[error("failed to inject operation: {0}")]
    Inject(#[source] RpcError),
}

/// A contract call to submit.
#[derive(Debug, Clone)]
pub struct TransactionRequest<'a> {
    pub destination: &'a str,
    /// Transferred amount in mutez.
    pub amount: String,
    pub params: OperationParams,
    pub action: SwapAction,
    pub value: serde_json::Value,
}

/// Serializes outgoing transactions of one account.
pub struct TransactionPipeline {
    rpc: Arc<dyn NodeRpc>,
    signer: Arc<dyn OperationSigner>,
    counter: AtomicI64,
    ttl: u32,
}

impl TransactionPipeline {
    pub fn new(rpc: Arc<dyn NodeRpc>, signer: Arc<dyn OperationSigner>, ttl: u32) -> Self {
        Self {
            rpc,
            signer,
            counter: AtomicI64::new(0),
            ttl,
        }
    }

    /// Set the counter to the account's on-chain value.
    pub fn prime(&self, counter: i64) {
        self.counter.store(counter, Ordering::SeqCst);
    }

    pub fn source(&self) -> &str {
        self.signer.address()
    }

    /// Submit a call and return the operation hash.
    pub async fn submit(&self, request: TransactionRequest<'_>) -> Result<String, SubmissionError> {
        let counter = self.counter.fetch_add(1, Ordering::SeqCst) + 1;

        let header = self
            .rpc
            .header(&format!("head~{}", self.ttl))
            .await
            .map_err(SubmissionError::Header)?;

        let content = TransactionContent {
            kind: "transaction",
            source: self.signer.address().to_string(),
            fee: request.params.fee.to_string(),
            counter: counter.to_string(),
            gas_limit: request.params.gas_limit.get(request.action).to_string(),
            storage_limit: request.params.storage_limit.get(request.action).to_string(),
            amount: request.amount,
            destination: request.destination.to_string(),
            parameters: TransactionParameters {
                entrypoint: request.action.entrypoint().to_string(),
                value: request.value,
            },
        };

        let forged = self
            .rpc
            .forge(&header.hash, &content)
            .await
            .map_err(SubmissionError::Forge)?;
        let signature = self.signer.sign_forged(&forged)?;
        debug!(counter, branch = %header.hash, "Forged and signed operation");

        let hash = self
            .rpc
            .inject(&format!("{forged}{signature}"), &header.chain_id)
            .await
            .map_err(SubmissionError::Inject)?;

        info!(
            hash = %hash,
            counter,
            destination = %content.destination,
            entrypoint = %content.parameters.entrypoint,
            "Injected operation"
        );
        Ok(hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        FAKE_SIGNATURE, FakeNode, FakeSigner, forged_hex, operation_hash, operation_params,
    };

    fn request(destination: &str) -> TransactionRequest<'_> {
        TransactionRequest {
            destination,
            amount: "0".to_string(),
            params: operation_params(),
            action: SwapAction::Refund,
            value: serde_json::json!({"bytes": "aa"}),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_submissions_use_distinct_counters() {
        let node = Arc::new(FakeNode::default());
        let pipeline = Arc::new(TransactionPipeline::new(
            node.clone(),
            Arc::new(FakeSigner::default()),
            5,
        ));
        pipeline.prime(41);

        let mut handles = Vec::new();
        for _ in 0..32 {
            let pipeline = Arc::clone(&pipeline);
            handles.push(tokio::spawn(async move {
                pipeline.submit(request("KT1Swap")).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let mut counters = node.forged_counters();
        counters.sort_unstable();
        assert_eq!(counters, (42..74).collect::<Vec<i64>>());
    }

    #[tokio::test]
    async fn content_uses_action_limits_and_ttl() {
        let node = Arc::new(FakeNode::default());
        let pipeline = TransactionPipeline::new(node.clone(), Arc::new(FakeSigner::default()), 7);
        let hash = pipeline.submit(request("KT1Swap")).await.unwrap();

        assert_eq!(node.headers_requested(), vec!["head~7".to_string()]);
        let forged = node.forged_contents();
        assert_eq!(forged[0].gas_limit, "15000");
        assert_eq!(forged[0].storage_limit, "0");
        assert_eq!(forged[0].fee, "1000");
        assert_eq!(forged[0].parameters.entrypoint, "refund");
        assert_eq!(
            node.injected(),
            vec![format!("{}{}", forged_hex(1), FAKE_SIGNATURE)]
        );
        assert_eq!(hash, operation_hash(1));
    }

    #[tokio::test]
    async fn failed_injection_still_consumes_the_counter() {
        let node = Arc::new(FakeNode::default());
        node.fail_injection(true);
        let pipeline = TransactionPipeline::new(node.clone(), Arc::new(FakeSigner::default()), 5);
        pipeline.prime(10);

        let result = pipeline.submit(request("KT1Swap")).await;
        assert!(matches!(result, Err(SubmissionError::Inject(_))));

        node.fail_injection(false);
        pipeline.submit(request("KT1Swap")).await.unwrap();
        assert_eq!(node.forged_counters(), vec![11, 12]);
    }
}
