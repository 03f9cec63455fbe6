//! Tezos node RPC client backed by `reqwest`.
//!
//! Features:
//! - Typed access to the block and voting endpoints the detectors need
//! - Retry with exponential backoff when the node is unreachable or overloaded
//! - Streaming `/monitor/heads/<chain>` subscription

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use tezbot_core::chain::{ChainService, HeadStream};
use tezbot_core::error::ChainError;
use tezbot_core::types::{
    BallotListing, BallotTally, Block, BlockRef, PeriodKind, ProposalSupport,
};

use crate::retry::{RetryConfig, RetryPolicy};

/// Configuration for [`TezosRpcClient`].
#[derive(Debug, Clone)]
pub struct RpcClientConfig {
    pub retry: RetryConfig,
    /// Timeout of one-shot requests. The head monitor has none.
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for RpcClientConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// HTTP client for a Tezos node.
pub struct TezosRpcClient {
    base_url: String,
    http: reqwest::Client,
    /// Same pool settings without a total timeout, for long-lived monitors.
    monitor_http: reqwest::Client,
    retry: RetryPolicy,
}

impl TezosRpcClient {
    /// Create a client for the node at `url` (e.g. `https://mainnet.api.tez.ie`).
    pub fn new(url: impl Into<String>, config: RpcClientConfig) -> Result<Self, ChainError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| ChainError::Other(format!("building HTTP client: {e}")))?;
        let monitor_http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| ChainError::Other(format!("building HTTP client: {e}")))?;

        Ok(Self {
            base_url: url.into().trim_end_matches('/').to_string(),
            http,
            monitor_http,
            retry: RetryPolicy::new(config.retry),
        })
    }

    /// Create with default configuration.
    pub fn default_for(url: impl Into<String>) -> Result<Self, ChainError> {
        Self::new(url, RpcClientConfig::default())
    }

    pub fn url(&self) -> &str {
        &self.base_url
    }

    fn block_path(chain: &str, block: &BlockRef, suffix: &str) -> String {
        format!("/chains/{chain}/blocks/{block}{suffix}")
    }

    async fn get_once<T: DeserializeOwned>(&self, path: &str) -> Result<T, ChainError> {
        let url = format!("{}{path}", self.base_url);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| ChainError::Http(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ChainError::Status { status, body });
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| ChainError::Http(e.to_string()))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// GET `path` and decode the body, retrying transient failures.
    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ChainError> {
        self.retry.run(path, || self.get_once(path)).await
    }
}

#[async_trait]
impl ChainService for TezosRpcClient {
    async fn subscribe_heads(&self, chain: &str) -> Result<HeadStream, ChainError> {
        let url = format!("{}/monitor/heads/{chain}", self.base_url);
        let resp = self
            .monitor_http
            .get(&url)
            .send()
            .await
            .map_err(|e| ChainError::Http(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ChainError::Status { status, body });
        }
        tracing::debug!(url = %url, "head monitor connected");

        let chunks = Box::pin(resp.bytes_stream());
        let heads = futures::stream::unfold(
            (chunks, HeadDecoder::default(), VecDeque::new()),
            |(mut chunks, mut decoder, mut pending)| async move {
                loop {
                    if let Some(head) = pending.pop_front() {
                        return Some((Ok(head), (chunks, decoder, pending)));
                    }
                    match chunks.next().await {
                        Some(Ok(chunk)) => match decoder.push(&chunk) {
                            Ok(heads) => pending.extend(heads),
                            Err(e) => return Some((Err(e), (chunks, decoder, pending))),
                        },
                        Some(Err(e)) => {
                            let err = ChainError::Http(e.to_string());
                            return Some((Err(err), (chunks, decoder, pending)));
                        }
                        None => return None,
                    }
                }
            },
        );
        Ok(Box::pin(heads))
    }

    async fn get_block(&self, chain: &str, block: &BlockRef) -> Result<Block, ChainError> {
        self.get(&Self::block_path(chain, block, "")).await
    }

    async fn get_ballot_tally(
        &self,
        chain: &str,
        block: &BlockRef,
    ) -> Result<BallotTally, ChainError> {
        self.get(&Self::block_path(chain, block, "/votes/ballots")).await
    }

    async fn get_ballot_listings(
        &self,
        chain: &str,
        block: &BlockRef,
    ) -> Result<Vec<BallotListing>, ChainError> {
        self.get(&Self::block_path(chain, block, "/votes/listings")).await
    }

    async fn get_current_quorum(&self, chain: &str, block: &BlockRef) -> Result<i64, ChainError> {
        self.get(&Self::block_path(chain, block, "/votes/current_quorum"))
            .await
    }

    async fn get_current_period_kind(
        &self,
        chain: &str,
        block: &BlockRef,
    ) -> Result<PeriodKind, ChainError> {
        self.get(&Self::block_path(chain, block, "/votes/current_period_kind"))
            .await
    }

    async fn get_proposals(
        &self,
        chain: &str,
        block: &BlockRef,
    ) -> Result<Vec<ProposalSupport>, ChainError> {
        self.get(&Self::block_path(chain, block, "/votes/proposals")).await
    }
}

// ─── Head monitor decoding ────────────────────────────────────────────────────

/// One notification of `/monitor/heads`. Only the hash is used.
#[derive(Debug, Deserialize)]
struct HeadNotice {
    hash: String,
}

/// Splits a chunked body into head notifications.
///
/// The node writes one JSON object per head, but HTTP chunk boundaries need
/// not line up with objects, so partial input is buffered until complete.
#[derive(Debug, Default)]
pub(crate) struct HeadDecoder {
    buf: Vec<u8>,
}

impl HeadDecoder {
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Result<Vec<BlockRef>, ChainError> {
        self.buf.extend_from_slice(chunk);

        let mut heads = Vec::new();
        let mut consumed = 0;
        let mut objects =
            serde_json::Deserializer::from_slice(&self.buf).into_iter::<HeadNotice>();
        loop {
            match objects.next() {
                Some(Ok(notice)) => {
                    heads.push(BlockRef(notice.hash));
                    consumed = objects.byte_offset();
                }
                Some(Err(e)) if e.is_eof() => break,
                Some(Err(e)) => return Err(ChainError::Decode(e.to_string())),
                None => {
                    consumed = objects.byte_offset();
                    break;
                }
            }
        }

        self.buf.drain(..consumed);
        Ok(heads)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEAD_1: &str = r#"{"hash":"BLhead1","level":1024,"proto":5,"predecessor":"BLhead0"}"#;
    const HEAD_2: &str = r#"{"hash":"BLhead2","level":1025,"proto":5,"predecessor":"BLhead1"}"#;

    fn hashes(refs: Vec<BlockRef>) -> Vec<String> {
        refs.into_iter().map(|r| r.0).collect()
    }

    #[test]
    fn decodes_whole_objects() {
        let mut decoder = HeadDecoder::default();
        let body = format!("{HEAD_1}\n{HEAD_2}\n");
        let heads = decoder.push(body.as_bytes()).unwrap();
        assert_eq!(hashes(heads), vec!["BLhead1", "BLhead2"]);
        assert!(decoder.buf.is_empty());
    }

    #[test]
    fn buffers_objects_split_across_chunks() {
        let mut decoder = HeadDecoder::default();
        let (a, b) = HEAD_1.split_at(20);

        assert!(decoder.push(a.as_bytes()).unwrap().is_empty());
        let heads = decoder.push(format!("{b}\n{}", &HEAD_2[..10]).as_bytes()).unwrap();
        assert_eq!(hashes(heads), vec!["BLhead1"]);

        let heads = decoder.push(HEAD_2[10..].as_bytes()).unwrap();
        assert_eq!(hashes(heads), vec!["BLhead2"]);
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let mut decoder = HeadDecoder::default();
        let err = decoder.push(b"<html>bad gateway</html>").unwrap_err();
        assert!(matches!(err, ChainError::Decode(_)));
    }

    #[test]
    fn block_paths() {
        assert_eq!(
            TezosRpcClient::block_path("main", &BlockRef::head(), ""),
            "/chains/main/blocks/head"
        );
        assert_eq!(
            TezosRpcClient::block_path("main", &BlockRef::level(42), "/votes/proposals"),
            "/chains/main/blocks/42/votes/proposals"
        );
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let client = TezosRpcClient::default_for("https://node.example/").unwrap();
        assert_eq!(client.url(), "https://node.example");
    }

    #[tokio::test]
    async fn unreachable_node_fails_after_retries() {
        let config = RpcClientConfig {
            retry: RetryConfig {
                attempts: 2,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(1),
            },
            ..RpcClientConfig::default()
        };
        let client = TezosRpcClient::new("http://127.0.0.1:1", config).unwrap();
        let err = client.get_block("main", &BlockRef::head()).await.unwrap_err();
        assert!(matches!(err, ChainError::Http(_)), "unexpected error: {err}");
    }
}
