//! The listener loop — turns block identifiers into governance events.
//!
//! The block source runs as a background task and feeds identifiers over a
//! bounded channel. For each identifier not seen recently the listener
//! fetches the block, resolves its voting period and runs the enabled
//! detectors in a fixed order:
//!
//! ```text
//! ballot → protocol → proposal → proposal summary → winning proposal
//! ```
//!
//! A fetch or detector failure skips the rest of that block. Only a source
//! that runs out of retries, or an event consumer that disappears, ends the
//! loop with an error.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::cache::RecencyCache;
use crate::chain::ChainService;
use crate::config::ListenerConfig;
use crate::detect;
use crate::error::ListenerError;
use crate::events::GovernanceEvent;
use crate::source::BlockSource;
use crate::types::{Block, BlockRef, PeriodKind};

/// Lifecycle of a [`Listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    /// Not yet started.
    Idle,
    /// Consuming block identifiers.
    Streaming,
    /// A stop was requested; unwinding.
    Stopping,
    /// Terminated.
    Stopped,
}

impl std::fmt::Display for ListenerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Streaming => write!(f, "streaming"),
            Self::Stopping => write!(f, "stopping"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Requests a running listener to stop. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ListenerHandle {
    stop: Arc<watch::Sender<bool>>,
}

impl ListenerHandle {
    pub(crate) fn from_sender(stop: Arc<watch::Sender<bool>>) -> Self {
        Self { stop }
    }

    /// Ask the listener to stop after the block it is currently inspecting.
    pub fn stop(&self) {
        self.stop.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.stop.borrow()
    }
}

/// Watches one chain and emits [`GovernanceEvent`]s.
pub struct Listener<C: ChainService> {
    service: Arc<C>,
    config: ListenerConfig,
    source: BlockSource,
    cache: RecencyCache,
    /// Previously processed block, for protocol-change detection.
    last_block: Option<Block>,
    events: mpsc::Sender<GovernanceEvent>,
    stop: Arc<watch::Sender<bool>>,
    state: ListenerState,
}

impl<C: ChainService> Listener<C> {
    /// Build a listener whose block source is chosen from `config`.
    pub fn new(
        service: Arc<C>,
        config: ListenerConfig,
        events: mpsc::Sender<GovernanceEvent>,
    ) -> Self {
        let (stop, _) = watch::channel(false);
        Self {
            source: BlockSource::from_config(&config),
            service,
            config,
            cache: RecencyCache::new(),
            last_block: None,
            events,
            stop: Arc::new(stop),
            state: ListenerState::Idle,
        }
    }

    /// Replace the block source.
    pub fn with_source(mut self, source: BlockSource) -> Self {
        self.source = source;
        self
    }

    pub fn handle(&self) -> ListenerHandle {
        ListenerHandle::from_sender(Arc::clone(&self.stop))
    }

    pub fn state(&self) -> ListenerState {
        self.state
    }

    /// Run until the source is exhausted, a fatal error occurs, or a stop is
    /// requested through a [`ListenerHandle`].
    pub async fn run(&mut self) -> Result<(), ListenerError> {
        let mut stop = self.stop.subscribe();
        if *stop.borrow() {
            self.state = ListenerState::Stopped;
            return Ok(());
        }

        self.state = ListenerState::Streaming;
        info!(
            chain = %self.config.chain,
            source = self.source.name(),
            "listener started"
        );

        let (tx, mut refs) = mpsc::channel(self.config.channel_capacity.max(1));
        let mut producer = {
            let service = Arc::clone(&self.service);
            let source = self.source.clone();
            let chain = self.config.chain.clone();
            tokio::spawn(async move { source.produce(service.as_ref(), &chain, tx).await })
        };

        let result = loop {
            tokio::select! {
                biased;

                _ = stop.changed() => {
                    if *stop.borrow() {
                        self.state = ListenerState::Stopping;
                        break Ok(());
                    }
                }

                next = refs.recv() => match next {
                    Some(id) => {
                        if let Err(e) = self.process(id).await {
                            if *stop.borrow() {
                                self.state = ListenerState::Stopping;
                                break Ok(());
                            }
                            break Err(e);
                        }
                    }
                    // The source finished; surface how.
                    None => break match (&mut producer).await {
                        Ok(outcome) => outcome,
                        Err(e) => Err(ListenerError::Other(format!("block source task failed: {e}"))),
                    },
                },
            }
        };

        producer.abort();
        self.state = ListenerState::Stopped;

        match &result {
            Ok(()) => info!("listener stopped"),
            Err(e) => error!(error = %e, "listener terminated"),
        }
        result
    }

    /// Handle one identifier. Only fatal errors are returned.
    async fn process(&mut self, id: BlockRef) -> Result<(), ListenerError> {
        if self.cache.has(&id) {
            debug!(block = %id, "block already processed, skipping");
            return Ok(());
        }
        self.cache.add(id.clone());

        match self.inspect(&id).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!(block = %id, error = %e, "block skipped because of error");
                Ok(())
            }
        }
    }

    async fn inspect(&mut self, id: &BlockRef) -> Result<(), ListenerError> {
        let service = Arc::clone(&self.service);
        let chain = self.config.chain.clone();

        let block = service.get_block(&chain, id).await?;
        let at = BlockRef(block.hash.clone());
        let kind = service.get_current_period_kind(&chain, &at).await?;

        info!(
            block = %block.hash,
            level = block.level(),
            period = %kind,
            "inspecting block"
        );

        if self.config.monitor_vote && kind.is_ballot_phase() {
            let ballots = detect::detect_ballots(service.as_ref(), &chain, &block, &kind).await?;
            self.emit(ballots).await?;
        }

        if self.config.monitor_protocol {
            let change = detect::detect_protocol_change(
                service.as_ref(),
                &chain,
                &block,
                self.last_block.as_ref(),
            )
            .await?;
            self.last_block = Some(block.clone());
            self.emit(change).await?;
        }

        if self.config.monitor_proposal && kind == PeriodKind::Proposal {
            let proposals = detect::detect_proposals(service.as_ref(), &chain, &block).await?;
            self.emit(proposals).await?;

            let summary =
                detect::detect_proposal_summary(service.as_ref(), &chain, &block, &self.config)
                    .await?;
            self.emit(summary).await?;

            let winner =
                detect::detect_winning_proposal(service.as_ref(), &chain, &block, &self.config)
                    .await?;
            self.emit(winner).await?;
        }

        Ok(())
    }

    async fn emit<I>(&self, events: I) -> Result<(), ListenerError>
    where
        I: IntoIterator<Item = GovernanceEvent>,
    {
        for event in events {
            debug!(kind = event.kind(), "emitting event");
            self.events
                .send(event)
                .await
                .map_err(|_| ListenerError::ChannelClosed)?;
        }
        Ok(())
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::memory::{empty_block, MemoryChain};
    use crate::source::LiveMonitor;
    use crate::types::{
        BallotListing, BallotOp, BallotTally, Operation, OperationContent, ProposalSupport,
        ProposalsOp, Vote,
    };

    fn live_once() -> BlockSource {
        // Zero retries: the listener ends as soon as the scripted heads run out.
        BlockSource::Live(LiveMonitor {
            retry_count: 0,
            retry_backoff: Duration::from_millis(1),
        })
    }

    fn drain(rx: &mut mpsc::Receiver<GovernanceEvent>) -> Vec<GovernanceEvent> {
        let mut out = Vec::new();
        while let Ok(e) = rx.try_recv() {
            out.push(e);
        }
        out
    }

    #[test]
    fn state_display() {
        assert_eq!(ListenerState::Idle.to_string(), "idle");
        assert_eq!(ListenerState::Streaming.to_string(), "streaming");
        assert_eq!(ListenerState::Stopped.to_string(), "stopped");
    }

    #[tokio::test]
    async fn duplicate_heads_are_processed_once() {
        let chain = Arc::new(MemoryChain::new());
        chain.insert_block(empty_block(0, "BL0", "BL0", "Ps1"));
        chain.insert_block(empty_block(1, "BL1", "BL0", "Ps1"));
        chain.insert_block(empty_block(2, "BL2", "BL1", "Ps1"));
        chain.script_heads(vec!["BL1".into(), "BL1".into(), "BL2".into(), "BL1".into()]);

        let (tx, mut rx) = mpsc::channel(16);
        let mut listener =
            Listener::new(Arc::clone(&chain), ListenerConfig::default(), tx).with_source(live_once());
        let err = listener.run().await.unwrap_err();
        assert!(matches!(err, ListenerError::RetriesExhausted { .. }));
        assert_eq!(listener.state(), ListenerState::Stopped);

        // BL0 is fetched once as BL1's predecessor.
        let requests: Vec<_> = chain.block_requests().into_iter().map(|r| r.0).collect();
        assert_eq!(requests, vec!["BL1", "BL0", "BL2"]);
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn failing_block_is_skipped() {
        let chain = Arc::new(MemoryChain::new());
        chain.insert_block(empty_block(1, "BL1", "BL0", "Ps1"));
        chain.insert_block(empty_block(2, "BL2", "BL1", "Ps2"));
        chain.insert_block(empty_block(3, "BL3", "BL2", "Ps2"));
        chain.fail_block("BL1");
        chain.script_heads(vec!["BL1".into(), "BL2".into(), "BL3".into()]);

        let (tx, mut rx) = mpsc::channel(16);
        let mut listener =
            Listener::new(Arc::clone(&chain), ListenerConfig::default(), tx).with_source(live_once());
        let _ = listener.run().await;

        // BL2 needs its predecessor BL1, which fails, so BL2 is skipped as well
        // and never becomes the last block. BL3 then fetches BL2 itself.
        let events = drain(&mut rx);
        assert!(events.is_empty());
        let requests: Vec<_> = chain.block_requests().into_iter().map(|r| r.0).collect();
        assert_eq!(requests, vec!["BL1", "BL2", "BL1", "BL3", "BL2"]);
    }

    #[tokio::test]
    async fn protocol_change_uses_last_block() {
        let chain = Arc::new(MemoryChain::new());
        chain.insert_block(empty_block(1, "BL1", "BL0", "Ps1"));
        chain.insert_block(empty_block(0, "BL0", "BL0", "Ps1"));
        chain.insert_block(empty_block(2, "BL2", "BL1", "Ps2"));
        chain.insert_block(empty_block(3, "BL3", "BL2", "Ps2"));
        chain.script_heads(vec!["BL1".into(), "BL2".into(), "BL3".into()]);

        let (tx, mut rx) = mpsc::channel(16);
        let mut listener =
            Listener::new(Arc::clone(&chain), ListenerConfig::default(), tx).with_source(live_once());
        let _ = listener.run().await;

        assert_eq!(
            drain(&mut rx),
            vec![GovernanceEvent::ProtocolChange { protocol: "Ps2".into() }]
        );
    }

    /// BL1 activates Ps2 and carries both a ballot and a proposal injection.
    fn governance_chain(kind: PeriodKind) -> Arc<MemoryChain> {
        let chain = Arc::new(MemoryChain::new());
        chain.insert_block(empty_block(0, "BL0", "BL0", "Ps1"));
        let mut block = empty_block(1, "BL1", "BL0", "Ps2");
        block.operations = vec![vec![Operation {
            hash: "ooGov".into(),
            contents: vec![
                OperationContent::Ballot(BallotOp {
                    source: "tz1alice".into(),
                    period: 3,
                    proposal: "PsBaby".into(),
                    ballot: Vote::Yay,
                }),
                OperationContent::Proposals(ProposalsOp {
                    source: "tz1bob".into(),
                    period: 3,
                    proposals: vec!["PsNew".into()],
                }),
            ],
        }]];
        chain.insert_block(block);
        chain.set_period_kind("BL1", kind);
        chain.set_tally("BL1", BallotTally { yay: 10, nay: 0, pass: 0 });
        chain.set_listings(
            "BL1",
            vec![
                BallotListing { pkh: "tz1alice".into(), rolls: 10 },
                BallotListing { pkh: "tz1bob".into(), rolls: 5 },
            ],
        );
        chain.set_quorum("BL1", 8000);
        chain.set_proposals(1, vec![ProposalSupport { proposal_hash: "PsNew".into(), supporter_count: 1 }]);
        chain.script_heads(vec!["BL1".into()]);
        chain
    }

    async fn event_kinds(kind: PeriodKind, config: ListenerConfig) -> Vec<&'static str> {
        let chain = governance_chain(kind);
        let (tx, mut rx) = mpsc::channel(16);
        let mut listener = Listener::new(chain, config, tx).with_source(live_once());
        let _ = listener.run().await;
        drain(&mut rx).iter().map(GovernanceEvent::kind).collect()
    }

    #[tokio::test]
    async fn phase_selects_detectors() {
        let cfg = ListenerConfig::default();
        assert_eq!(
            event_kinds(PeriodKind::Exploration, cfg.clone()).await,
            vec!["ballot", "protocol_change"]
        );
        // Ballots are ignored outside a voting phase.
        assert_eq!(
            event_kinds(PeriodKind::Proposal, cfg.clone()).await,
            vec!["protocol_change", "new_proposal"]
        );
        assert_eq!(
            event_kinds(PeriodKind::from("adoption"), cfg).await,
            vec!["protocol_change"]
        );
    }

    #[tokio::test]
    async fn disabled_detectors_emit_nothing() {
        let no_vote = ListenerConfig { monitor_vote: false, ..ListenerConfig::default() };
        assert_eq!(
            event_kinds(PeriodKind::Promotion, no_vote).await,
            vec!["protocol_change"]
        );

        let no_protocol = ListenerConfig { monitor_protocol: false, ..ListenerConfig::default() };
        assert_eq!(event_kinds(PeriodKind::Promotion, no_protocol.clone()).await, vec!["ballot"]);
        assert_eq!(event_kinds(PeriodKind::Proposal, no_protocol).await, vec!["new_proposal"]);

        let no_proposal = ListenerConfig { monitor_proposal: false, ..ListenerConfig::default() };
        assert_eq!(
            event_kinds(PeriodKind::Proposal, no_proposal).await,
            vec!["protocol_change"]
        );

        let silent = ListenerConfig {
            monitor_vote: false,
            monitor_protocol: false,
            monitor_proposal: false,
            ..ListenerConfig::default()
        };
        assert!(event_kinds(PeriodKind::Exploration, silent).await.is_empty());
    }

    #[tokio::test]
    async fn stop_before_run_returns_immediately() {
        let chain = Arc::new(MemoryChain::new());
        let (tx, _rx) = mpsc::channel(16);
        let mut listener = Listener::new(chain, ListenerConfig::default(), tx);
        listener.handle().stop();
        listener.run().await.unwrap();
        assert_eq!(listener.state(), ListenerState::Stopped);
    }

    #[tokio::test]
    async fn stop_ends_an_idle_subscription() {
        let chain = Arc::new(MemoryChain::new());
        let (tx, _rx) = mpsc::channel(16);
        let mut listener = Listener::new(Arc::clone(&chain), ListenerConfig::default(), tx);
        let handle = listener.handle();

        let task = tokio::spawn(async move {
            let result = listener.run().await;
            (result, listener.state())
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.stop();

        let (result, state) = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
        assert_eq!(state, ListenerState::Stopped);
        assert!(handle.is_stopped());
    }
}
