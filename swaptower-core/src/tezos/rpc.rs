//! Tezos node RPC access.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Errors returned by the node RPC.
#[derive(Debug, Error)]
pub enum RpcError {
    /// HTTP transport error
    #[error("HTTP request error: {0}")]
    Request(#[from] reqwest::Error),

    /// The base URL could not be joined with the endpoint path
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    /// The node answered with a non-2xx status
    #[error("node error: status {status}, body: {body}")]
    Api { status: u16, body: String },

    /// Response body could not be deserialized
    #[error("RPC response parsing error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The account counter is not an integer
    #[error("invalid counter: {0}")]
    InvalidCounter(String),
}

/// The fields of a block header the pipeline needs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BlockHeader {
    pub hash: String,
    pub chain_id: String,
    #[serde(default)]
    pub level: u64,
}

/// Entrypoint call attached to a transaction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionParameters {
    pub entrypoint: String,
    pub value: serde_json::Value,
}

/// A transaction operation content, in the node's JSON shape.
///
/// Numeric fields are decimal strings as the node expects them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionContent {
    pub kind: &'static str,
    pub source: String,
    pub fee: String,
    pub counter: String,
    pub gas_limit: String,
    pub storage_limit: String,
    pub amount: String,
    pub destination: String,
    pub parameters: TransactionParameters,
}

/// Calls to a Tezos node.
#[async_trait]
pub trait NodeRpc: Send + Sync {
    /// Current counter of `address` at head.
    async fn counter(&self, address: &str) -> Result<i64, RpcError>;

    /// Header of `block` (e.g. `head`, `head~5`).
    async fn header(&self, block: &str) -> Result<BlockHeader, RpcError>;

    /// Forge a single-transaction operation on top of `branch`, returning
    /// its hex encoding.
    async fn forge(&self, branch: &str, content: &TransactionContent) -> Result<String, RpcError>;

    /// Inject a signed operation, returning its hash.
    async fn inject(&self, signed_hex: &str, chain_id: &str) -> Result<String, RpcError>;
}

/// [`NodeRpc`] over the node's HTTP interface.
#[derive(Debug, Clone)]
pub struct NodeClient {
    http: reqwest::Client,
    base_url: Url,
}

impl NodeClient {
    pub fn new(base_url: Url) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
        }
    }
}

#[derive(Serialize)]
struct ForgeRequest<'a> {
    branch: &'a str,
    contents: [&'a TransactionContent; 1],
}

#[async_trait]
impl NodeRpc for NodeClient {
    async fn counter(&self, address: &str) -> Result<i64, RpcError> {
        let url = self
            .base_url
            .join(&format!("chains/main/blocks/head/context/contracts/{address}/counter"))?;
        let resp = self.http.get(url).send().await?;
        let counter: String = parse_response(resp).await?;
        counter
            .parse()
            .map_err(|_| RpcError::InvalidCounter(counter))
    }

    async fn header(&self, block: &str) -> Result<BlockHeader, RpcError> {
        let url = self
            .base_url
            .join(&format!("chains/main/blocks/{block}/header"))?;
        let resp = self.http.get(url).send().await?;
        parse_response(resp).await
    }

    async fn forge(&self, branch: &str, content: &TransactionContent) -> Result<String, RpcError> {
        let url = self
            .base_url
            .join("chains/main/blocks/head/helpers/forge/operations")?;
        let body = ForgeRequest {
            branch,
            contents: [content],
        };
        let resp = self.http.post(url).json(&body).send().await?;
        parse_response(resp).await
    }

    async fn inject(&self, signed_hex: &str, chain_id: &str) -> Result<String, RpcError> {
        let url = self.base_url.join("injection/operation")?;
        let resp = self
            .http
            .post(url)
            .query(&[("chain", chain_id)])
            .json(&signed_hex)
            .send()
            .await?;
        parse_response(resp).await
    }
}

async fn parse_response<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, RpcError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(RpcError::Api {
            status: status.as_u16(),
            body,
        });
    }
    let bytes = resp.bytes().await?;
    serde_json::from_slice(&bytes).map_err(RpcError::Parse)
}
