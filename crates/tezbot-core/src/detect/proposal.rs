//! Proposal detector: new injections and upvotes.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::chain::ChainService;
use crate::error::ListenerError;
use crate::events::{GovernanceEvent, Proposal};
use crate::types::{Block, BlockRef};

/// Classify every proposal named in `block`'s proposals operations.
///
/// A hash already on record at `level - 1` is an upvote; anything else is a
/// new injection. Submitter rolls are attached from the block's listings when
/// those can be read.
pub async fn detect_proposals<C: ChainService + ?Sized>(
    service: &C,
    chain: &str,
    block: &Block,
) -> Result<Vec<GovernanceEvent>, ListenerError> {
    debug!(block = %block.hash, "inspecting block for proposal operations");

    let baseline: HashSet<String> = match block.level().checked_sub(1) {
        Some(prev) => service
            .get_proposals(chain, &BlockRef::level(prev))
            .await?
            .into_iter()
            .map(|p| p.proposal_hash)
            .collect(),
        None => HashSet::new(),
    };

    let ops = block.proposal_ops();
    if ops.is_empty() {
        return Ok(Vec::new());
    }

    let listings = match service
        .get_ballot_listings(chain, &BlockRef(block.hash.clone()))
        .await
    {
        Ok(listings) => Some(listings),
        Err(e) => {
            warn!(block = %block.hash, error = %e, "listings unavailable, proposals reported without rolls");
            None
        }
    };

    let mut events = Vec::new();
    for op in ops {
        let rolls = listings.as_ref().map(|all| {
            all.iter()
                .find(|l| l.pkh == op.source)
                .map_or(0, |l| l.rolls)
        });
        for hash in &op.proposals {
            let proposal = Proposal {
                proposal_hash: hash.clone(),
                pkh: op.source.clone(),
                period: op.period,
                rolls,
            };
            if baseline.contains(hash) {
                events.push(GovernanceEvent::ProposalUpvote(proposal));
            } else {
                events.push(GovernanceEvent::NewProposal(proposal));
            }
        }
    }

    Ok(events)
}
