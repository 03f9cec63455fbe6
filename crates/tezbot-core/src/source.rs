//! Block sources produce the block identifiers the listener inspects.
//!
//! # Live
//! Subscribe to new heads and forward each head's hash. A failed or closed
//! subscription is retried after `attempt * retry_backoff`; every received
//! head resets the attempt counter. Once the retry budget is spent the source
//! fails with [`ListenerError::RetriesExhausted`].
//!
//! # History
//! Resolve the head level once, then walk `history_starting_block..=head`,
//! forwarding each block's hash and pausing between fetches. Returns when the
//! range is exhausted.
//!
//! Neither source deduplicates; that is the listener's job.

use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::chain::ChainService;
use crate::config::ListenerConfig;
use crate::error::{ChainError, ListenerError};
use crate::types::BlockRef;

/// Follows the chain head through a subscription.
#[derive(Debug, Clone)]
pub struct LiveMonitor {
    /// Consecutive failed attempts tolerated.
    pub retry_count: u32,
    /// The n-th retry waits `n * retry_backoff`.
    pub retry_backoff: Duration,
}

/// Replays a historical range of levels.
#[derive(Debug, Clone)]
pub struct HistoryBackfill {
    pub from_level: u64,
    /// Pause after each forwarded block.
    pub interval: Duration,
}

/// The block source a listener was built with. Chosen once from the config.
#[derive(Debug, Clone)]
pub enum BlockSource {
    Live(LiveMonitor),
    History(HistoryBackfill),
}

impl BlockSource {
    pub fn from_config(config: &ListenerConfig) -> Self {
        if config.history {
            Self::History(HistoryBackfill {
                from_level: config.history_starting_block,
                interval: config.history_interval(),
            })
        } else {
            Self::Live(LiveMonitor {
                retry_count: config.retry_count,
                retry_backoff: config.retry_backoff(),
            })
        }
    }

    /// Produce identifiers into `out` until the source is exhausted, fails
    /// permanently, or the receiver is dropped.
    pub async fn produce<C: ChainService + ?Sized>(
        &self,
        service: &C,
        chain: &str,
        out: mpsc::Sender<BlockRef>,
    ) -> Result<(), ListenerError> {
        match self {
            Self::Live(live) => live.produce(service, chain, out).await,
            Self::History(history) => history.produce(service, chain, out).await,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Live(_) => "live",
            Self::History(_) => "history",
        }
    }
}

impl LiveMonitor {
    pub async fn produce<C: ChainService + ?Sized>(
        &self,
        service: &C,
        chain: &str,
        out: mpsc::Sender<BlockRef>,
    ) -> Result<(), ListenerError> {
        let mut failures = 0u32;

        loop {
            let err = match service.subscribe_heads(chain).await {
                Err(e) => e,
                Ok(mut heads) => {
                    info!(chain, "subscribed to new heads");
                    let mut ended_with = ChainError::StreamClosed;
                    while let Some(item) = heads.next().await {
                        match item {
                            Ok(head) => {
                                failures = 0;
                                debug!(block = %head, "new head");
                                if out.send(head).await.is_err() {
                                    debug!("listener gone, stopping head monitor");
                                    return Ok(());
                                }
                            }
                            Err(e) => {
                                ended_with = e;
                                break;
                            }
                        }
                    }
                    ended_with
                }
            };

            if failures >= self.retry_count {
                error!(
                    attempts = failures + 1,
                    error = %err,
                    "head monitor giving up"
                );
                return Err(ListenerError::RetriesExhausted {
                    attempts: failures + 1,
                    source: err,
                });
            }

            failures += 1;
            let delay = self.retry_backoff * failures;
            warn!(
                attempt = failures,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "head subscription failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

impl HistoryBackfill {
    pub async fn produce<C: ChainService + ?Sized>(
        &self,
        service: &C,
        chain: &str,
        out: mpsc::Sender<BlockRef>,
    ) -> Result<(), ListenerError> {
        let head = service.get_block(chain, &BlockRef::head()).await?;
        let target = head.level();

        info!(from = self.from_level, target, "starting history backfill");

        for level in self.from_level..=target {
            let block = service.get_block(chain, &BlockRef::level(level)).await?;
            if out.send(BlockRef(block.hash)).await.is_err() {
                debug!(level, "listener gone, stopping backfill");
                return Ok(());
            }
            if !self.interval.is_zero() {
                tokio::time::sleep(self.interval).await;
            }
        }

        info!(at = target, "history backfill complete");
        Ok(())
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{empty_block, MemoryChain};

    fn live(retry_count: u32) -> BlockSource {
        BlockSource::Live(LiveMonitor {
            retry_count,
            retry_backoff: Duration::from_millis(1),
        })
    }

    fn drain(rx: &mut mpsc::Receiver<BlockRef>) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(r) = rx.try_recv() {
            out.push(r.0);
        }
        out
    }

    #[test]
    fn source_chosen_from_config() {
        let mut cfg = ListenerConfig::default();
        assert_eq!(BlockSource::from_config(&cfg).name(), "live");
        cfg.history = true;
        assert_eq!(BlockSource::from_config(&cfg).name(), "history");
    }

    #[tokio::test]
    async fn history_walks_range_inclusive() {
        let chain = MemoryChain::new();
        for level in 0..=3 {
            chain.insert_block(empty_block(level, &format!("BL{level}"), "", "Ps1"));
        }
        let source = BlockSource::History(HistoryBackfill {
            from_level: 1,
            interval: Duration::ZERO,
        });
        let (tx, mut rx) = mpsc::channel(16);
        source.produce(&chain, "main", tx).await.unwrap();
        assert_eq!(drain(&mut rx), vec!["BL1", "BL2", "BL3"]);
    }

    #[tokio::test]
    async fn history_fails_on_missing_block() {
        let chain = MemoryChain::new();
        chain.insert_block(empty_block(0, "BL0", "", "Ps1"));
        chain.insert_block(empty_block(2, "BL2", "BL1", "Ps1"));
        let source = BlockSource::History(HistoryBackfill {
            from_level: 0,
            interval: Duration::ZERO,
        });
        let (tx, _rx) = mpsc::channel(16);
        let err = source.produce(&chain, "main", tx).await.unwrap_err();
        assert!(matches!(err, ListenerError::Chain(_)));
    }

    #[tokio::test]
    async fn live_gives_up_after_retry_budget() {
        let chain = MemoryChain::new();
        for _ in 0..3 {
            chain.script_refusal("connection refused");
        }
        let (tx, _rx) = mpsc::channel(16);
        let err = live(2).produce(&chain, "main", tx).await.unwrap_err();
        match err {
            ListenerError::RetriesExhausted { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(chain.subscribe_calls(), 3);
    }

    #[tokio::test]
    async fn live_resets_failures_on_new_head() {
        let chain = MemoryChain::new();
        chain.script_refusal("refused");
        chain.script_refusal("refused");
        chain.script_heads(vec!["BL1".into()]);
        chain.script_refusal("refused");
        chain.script_refusal("refused");
        chain.script_refusal("refused");

        // Budget of 2: the head resets the counter, then the stream close and
        // one refusal are retried and the second refusal is fatal.
        let (tx, mut rx) = mpsc::channel(16);
        let err = live(2).produce(&chain, "main", tx).await.unwrap_err();
        assert!(matches!(err, ListenerError::RetriesExhausted { .. }));
        assert_eq!(drain(&mut rx), vec!["BL1"]);
        assert_eq!(chain.subscribe_calls(), 5);
    }

    #[tokio::test]
    async fn live_returns_when_listener_drops() {
        let chain = MemoryChain::new();
        chain.script_heads(vec!["BL1".into(), "BL2".into()]);
        let (tx, rx) = mpsc::channel(16);
        drop(rx);
        live(0).produce(&chain, "main", tx).await.unwrap();
    }
}
