//! In-memory `ChainService`.
//!
//! Serves blocks and voting data from RAM and replays scripted head
//! subscriptions. Test support only: compiled for this crate's tests and
//! behind the `testing` feature.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures::stream;

use crate::chain::{ChainService, HeadStream};
use crate::error::ChainError;
use crate::types::{Block, BallotListing, BallotTally, BlockRef, PeriodKind, ProposalSupport};

/// One scripted outcome of `subscribe_heads`.
enum Subscription {
    /// Yield these heads, then end the stream.
    Heads(Vec<BlockRef>),
    /// Fail to connect.
    Refuse(String),
}

struct State {
    blocks: Vec<Block>,
    tallies: HashMap<String, BallotTally>,
    listings: HashMap<String, Vec<BallotListing>>,
    quorums: HashMap<String, i64>,
    period_kinds: HashMap<String, PeriodKind>,
    default_period_kind: PeriodKind,
    proposals: HashMap<u64, Vec<ProposalSupport>>,
    failing: HashSet<String>,
    subscriptions: VecDeque<Subscription>,
    block_requests: Vec<BlockRef>,
    subscribe_calls: u32,
}

/// An in-memory chain.
pub struct MemoryChain {
    state: Mutex<State>,
}

impl MemoryChain {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                blocks: Vec::new(),
                tallies: HashMap::new(),
                listings: HashMap::new(),
                quorums: HashMap::new(),
                period_kinds: HashMap::new(),
                default_period_kind: PeriodKind::Proposal,
                proposals: HashMap::new(),
                failing: HashSet::new(),
                subscriptions: VecDeque::new(),
                block_requests: Vec::new(),
                subscribe_calls: 0,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a block. The highest level inserted is the head.
    pub fn insert_block(&self, block: Block) {
        self.state().blocks.push(block);
    }

    pub fn set_tally(&self, block_hash: &str, tally: BallotTally) {
        self.state().tallies.insert(block_hash.to_string(), tally);
    }

    pub fn set_listings(&self, block_hash: &str, listings: Vec<BallotListing>) {
        self.state().listings.insert(block_hash.to_string(), listings);
    }

    pub fn set_quorum(&self, block_hash: &str, quorum: i64) {
        self.state().quorums.insert(block_hash.to_string(), quorum);
    }

    pub fn set_period_kind(&self, block_hash: &str, kind: PeriodKind) {
        self.state().period_kinds.insert(block_hash.to_string(), kind);
    }

    /// Period kind reported for blocks without an explicit entry.
    pub fn set_default_period_kind(&self, kind: PeriodKind) {
        self.state().default_period_kind = kind;
    }

    /// Proposals on record at `level`.
    pub fn set_proposals(&self, level: u64, proposals: Vec<ProposalSupport>) {
        self.state().proposals.insert(level, proposals);
    }

    /// Make every lookup of this block (by hash) fail.
    pub fn fail_block(&self, block_hash: &str) {
        self.state().failing.insert(block_hash.to_string());
    }

    /// Queue a subscription that yields `heads` and then closes.
    pub fn script_heads(&self, heads: Vec<BlockRef>) {
        self.state().subscriptions.push_back(Subscription::Heads(heads));
    }

    /// Queue a subscription attempt that fails to connect.
    pub fn script_refusal(&self, reason: impl Into<String>) {
        self.state()
            .subscriptions
            .push_back(Subscription::Refuse(reason.into()));
    }

    /// Every identifier passed to `get_block`, in call order.
    pub fn block_requests(&self) -> Vec<BlockRef> {
        self.state().block_requests.clone()
    }

    pub fn subscribe_calls(&self) -> u32 {
        self.state().subscribe_calls
    }
}

impl Default for MemoryChain {
    fn default() -> Self {
        Self::new()
    }
}

impl State {
    fn find(&self, block: &BlockRef) -> Option<&Block> {
        let id = block.as_str();
        if id == "head" {
            return self.blocks.iter().max_by_key(|b| b.level());
        }
        if let Ok(level) = id.parse::<u64>() {
            return self.blocks.iter().find(|b| b.level() == level);
        }
        self.blocks.iter().find(|b| b.hash == id)
    }

    /// Resolve `block` to a hash, failing for unknown or poisoned blocks.
    fn resolve(&self, block: &BlockRef) -> Result<String, ChainError> {
        let found = self.find(block).ok_or_else(|| not_found(block))?;
        if self.failing.contains(&found.hash) {
            return Err(ChainError::Http(format!("connection reset fetching {}", found.hash)));
        }
        Ok(found.hash.clone())
    }

    fn resolve_level(&self, block: &BlockRef) -> Result<u64, ChainError> {
        match block.as_str().parse::<u64>() {
            Ok(level) => Ok(level),
            Err(_) => self
                .find(block)
                .map(Block::level)
                .ok_or_else(|| not_found(block)),
        }
    }
}

fn not_found(block: &BlockRef) -> ChainError {
    ChainError::Status {
        status: 404,
        body: format!("block {block} not found"),
    }
}

#[async_trait]
impl ChainService for MemoryChain {
    async fn subscribe_heads(&self, _chain: &str) -> Result<HeadStream, ChainError> {
        let mut state = self.state();
        state.subscribe_calls += 1;
        match state.subscriptions.pop_front() {
            Some(Subscription::Heads(heads)) => Ok(Box::pin(stream::iter(
                heads.into_iter().map(Ok::<_, ChainError>),
            ))),
            Some(Subscription::Refuse(reason)) => Err(ChainError::Http(reason)),
            // Nothing scripted: an idle connection that never yields.
            None => Ok(Box::pin(stream::pending::<Result<BlockRef, ChainError>>())),
        }
    }

    async fn get_block(&self, _chain: &str, block: &BlockRef) -> Result<Block, ChainError> {
        let mut state = self.state();
        state.block_requests.push(block.clone());
        let hash = state.resolve(block)?;
        state
            .blocks
            .iter()
            .find(|b| b.hash == hash)
            .cloned()
            .ok_or_else(|| not_found(block))
    }

    async fn get_ballot_tally(
        &self,
        _chain: &str,
        block: &BlockRef,
    ) -> Result<BallotTally, ChainError> {
        let state = self.state();
        let hash = state.resolve(block)?;
        Ok(state.tallies.get(&hash).copied().unwrap_or_default())
    }

    async fn get_ballot_listings(
        &self,
        _chain: &str,
        block: &BlockRef,
    ) -> Result<Vec<BallotListing>, ChainError> {
        let state = self.state();
        let hash = state.resolve(block)?;
        Ok(state.listings.get(&hash).cloned().unwrap_or_default())
    }

    async fn get_current_quorum(&self, _chain: &str, block: &BlockRef) -> Result<i64, ChainError> {
        let state = self.state();
        let hash = state.resolve(block)?;
        Ok(state.quorums.get(&hash).copied().unwrap_or(0))
    }

    async fn get_current_period_kind(
        &self,
        _chain: &str,
        block: &BlockRef,
    ) -> Result<PeriodKind, ChainError> {
        let state = self.state();
        let hash = state.resolve(block)?;
        Ok(state
            .period_kinds
            .get(&hash)
            .cloned()
            .unwrap_or_else(|| state.default_period_kind.clone()))
    }

    async fn get_proposals(
        &self,
        _chain: &str,
        block: &BlockRef,
    ) -> Result<Vec<ProposalSupport>, ChainError> {
        let state = self.state();
        let level = state.resolve_level(block)?;
        Ok(state.proposals.get(&level).cloned().unwrap_or_default())
    }
}

/// Build a block with no operations, for fixtures.
pub fn empty_block(level: u64, hash: &str, predecessor: &str, protocol: &str) -> Block {
    Block {
        hash: hash.to_string(),
        chain_id: "NetXdQprcVkpaWU".into(),
        protocol: protocol.to_string(),
        header: crate::types::BlockHeader {
            level,
            predecessor: predecessor.to_string(),
            timestamp: None,
        },
        operations: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn lookup_by_hash_level_and_head() {
        let chain = MemoryChain::new();
        chain.insert_block(empty_block(1, "BL1", "BL0", "Ps1"));
        chain.insert_block(empty_block(2, "BL2", "BL1", "Ps1"));

        assert_eq!(chain.get_block("main", &"BL1".into()).await.unwrap().level(), 1);
        assert_eq!(chain.get_block("main", &BlockRef::level(2)).await.unwrap().hash, "BL2");
        assert_eq!(chain.get_block("main", &BlockRef::head()).await.unwrap().hash, "BL2");
        assert!(chain.get_block("main", &"BLmissing".into()).await.is_err());
        assert_eq!(chain.block_requests().len(), 4);
    }

    #[tokio::test]
    async fn failing_block_errors_everywhere() {
        let chain = MemoryChain::new();
        chain.insert_block(empty_block(1, "BL1", "BL0", "Ps1"));
        chain.fail_block("BL1");
        assert!(chain.get_block("main", &"BL1".into()).await.is_err());
        assert!(chain.get_current_period_kind("main", &"BL1".into()).await.is_err());
    }

    #[tokio::test]
    async fn scripted_subscriptions_replay_in_order() {
        let chain = MemoryChain::new();
        chain.script_refusal("refused");
        chain.script_heads(vec!["BL1".into(), "BL2".into()]);

        assert!(chain.subscribe_heads("main").await.is_err());
        let heads: Vec<_> = chain.subscribe_heads("main").await.unwrap().collect().await;
        assert_eq!(heads.len(), 2);
        assert_eq!(chain.subscribe_calls(), 2);
    }
}
