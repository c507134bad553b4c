//! TzKT REST API access.

use async_trait::async_trait;
use swaptower_sdk::objects::tzkt::{BigMap, BigMapKey, BigMapKeyUpdate, Transaction};
use thiserror::Error;
use url::Url;

/// Page size used when listing storage map keys.
pub const PAGE_SIZE: u64 = 100;

/// Errors returned by the indexer API.
#[derive(Debug, Error)]
pub enum IndexerError {
    /// HTTP transport error
    #[error("HTTP request error: {0}")]
    Request(#[from] reqwest::Error),

    /// The base URL could not be joined with the endpoint path
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    /// The indexer answered with a non-2xx status
    #[error("indexer error: status {status}, body: {body}")]
    Api { status: u16, body: String },

    /// Response body could not be deserialized
    #[error("API response parsing error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// `limit`/`offset` pagination window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: u64,
    pub offset: u64,
}

impl Page {
    pub fn first() -> Self {
        Self {
            limit: PAGE_SIZE,
            offset: 0,
        }
    }

    /// The window following a page that returned `received` items.
    pub fn next(self, received: usize) -> Self {
        Self {
            limit: self.limit,
            offset: self.offset + received as u64,
        }
    }
}

/// Historical queries against the chain indexer.
#[async_trait]
pub trait IndexerApi: Send + Sync {
    /// Storage maps attached to any of the given contracts.
    async fn big_maps(&self, contracts: &[String]) -> Result<Vec<BigMap>, IndexerError>;

    /// One page of a storage map's keys, removed keys included.
    async fn big_map_keys(&self, ptr: u64, page: Page) -> Result<Vec<BigMapKey>, IndexerError>;

    /// Full update history of one key, newest first.
    ///
    /// `key` is either the key's expression hash or its plain value.
    async fn big_map_key_updates(
        &self,
        ptr: u64,
        key: &str,
    ) -> Result<Vec<BigMapKeyUpdate>, IndexerError>;

    /// Transactions applied at `level` targeting `target`.
    async fn transactions(
        &self,
        level: u64,
        target: &str,
    ) -> Result<Vec<Transaction>, IndexerError>;
}

/// [`IndexerApi`] backed by a TzKT instance.
#[derive(Debug, Clone)]
pub struct TzktClient {
    http: reqwest::Client,
    base_url: Url,
}

impl TzktClient {
    /// Create a client for the TzKT instance at `base_url`
    /// (e.g. `https://api.tzkt.io`).
    pub fn new(base_url: Url) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
        }
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, IndexerError> {
        let url = self.base_url.join(path)?;
        let resp = self.http.get(url).query(query).send().await?;
        parse_response(resp).await
    }
}

#[async_trait]
impl IndexerApi for TzktClient {
    async fn big_maps(&self, contracts: &[String]) -> Result<Vec<BigMap>, IndexerError> {
        self.get(
            "v1/bigmaps",
            &[
                ("contract.in", contracts.join(",")),
                ("limit", "10000".to_string()),
            ],
        )
        .await
    }

    async fn big_map_keys(&self, ptr: u64, page: Page) -> Result<Vec<BigMapKey>, IndexerError> {
        self.get(
            &format!("v1/bigmaps/{ptr}/keys"),
            &[
                ("limit", page.limit.to_string()),
                ("offset", page.offset.to_string()),
            ],
        )
        .await
    }

    async fn big_map_key_updates(
        &self,
        ptr: u64,
        key: &str,
    ) -> Result<Vec<BigMapKeyUpdate>, IndexerError> {
        self.get(
            &format!("v1/bigmaps/{ptr}/keys/{key}/updates"),
            &[("sort.desc", "id".to_string())],
        )
        .await
    }

    async fn transactions(
        &self,
        level: u64,
        target: &str,
    ) -> Result<Vec<Transaction>, IndexerError> {
        self.get(
            "v1/operations/transactions",
            &[("level", level.to_string()), ("target", target.to_string())],
        )
        .await
    }
}

async fn parse_response<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, IndexerError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(IndexerError::Api {
            status: status.as_u16(),
            body,
        });
    }
    let bytes = resp.bytes().await?;
    serde_json::from_slice(&bytes).map_err(IndexerError::Parse)
}
