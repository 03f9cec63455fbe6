//! The `ChainService` trait — everything the pipeline asks of a Tezos node.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::ChainError;
use crate::types::{Block, BallotListing, BallotTally, BlockRef, PeriodKind, ProposalSupport};

/// A stream of new head identifiers from a single subscription.
pub type HeadStream = Pin<Box<dyn Stream<Item = Result<BlockRef, ChainError>> + Send>>;

/// Read access to a Tezos node.
///
/// Every call takes the chain identifier (`"main"`) and a block identifier
/// (hash, level or `head`). Implementations must be `Send + Sync` so they can
/// be shared between the block source task and the listener loop.
#[async_trait]
pub trait ChainService: Send + Sync + 'static {
    /// Open a subscription to new heads. The stream ends or yields an error
    /// when the connection drops.
    async fn subscribe_heads(&self, chain: &str) -> Result<HeadStream, ChainError>;

    async fn get_block(&self, chain: &str, block: &BlockRef) -> Result<Block, ChainError>;

    /// Yay/nay/pass totals of the current vote at `block`.
    async fn get_ballot_tally(&self, chain: &str, block: &BlockRef)
        -> Result<BallotTally, ChainError>;

    /// Voting delegates and their rolls at `block`.
    async fn get_ballot_listings(
        &self,
        chain: &str,
        block: &BlockRef,
    ) -> Result<Vec<BallotListing>, ChainError>;

    /// Current quorum, in hundredths of a percent.
    async fn get_current_quorum(&self, chain: &str, block: &BlockRef) -> Result<i64, ChainError>;

    async fn get_current_period_kind(
        &self,
        chain: &str,
        block: &BlockRef,
    ) -> Result<PeriodKind, ChainError>;

    /// Proposals on record at `block` with their supporter counts, in node order.
    async fn get_proposals(
        &self,
        chain: &str,
        block: &BlockRef,
    ) -> Result<Vec<ProposalSupport>, ChainError>;
}
