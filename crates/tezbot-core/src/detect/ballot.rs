//! Ballot detector.

use tracing::debug;

use crate::chain::ChainService;
use crate::error::ListenerError;
use crate::events::{Ballot, GovernanceEvent};
use crate::types::{Block, BlockRef, PeriodKind};

/// Emit one [`Ballot`] per ballot operation in `block`.
///
/// The period-wide tally, the listings and the quorum are fetched once and
/// shared by every ballot of the block. A voter missing from the listings is
/// reported with zero rolls. Listings summing to zero rolls are rejected with
/// [`ListenerError::NoRolls`] and nothing is emitted.
pub async fn detect_ballots<C: ChainService + ?Sized>(
    service: &C,
    chain: &str,
    block: &Block,
    period_kind: &PeriodKind,
) -> Result<Vec<GovernanceEvent>, ListenerError> {
    debug!(block = %block.hash, "inspecting block for ballots");

    let ops = block.ballot_ops();
    let at = BlockRef(block.hash.clone());

    let tally = service.get_ballot_tally(chain, &at).await?;
    let listings = service.get_ballot_listings(chain, &at).await?;

    let total_rolls: i64 = listings.iter().map(|l| l.rolls).sum();
    if total_rolls == 0 {
        return Err(ListenerError::NoRolls {
            block: block.hash.clone(),
        });
    }

    let quorum = service.get_current_quorum(chain, &at).await? as f64 / 100.0;

    let events = ops
        .into_iter()
        .map(|op| {
            let rolls = listings
                .iter()
                .find(|l| l.pkh == op.source)
                .map_or(0, |l| l.rolls);
            GovernanceEvent::Ballot(Ballot {
                pkh: op.source.clone(),
                ballot: op.ballot,
                proposal_hash: op.proposal.clone(),
                rolls,
                is_exploration: period_kind.is_exploration(),
                period: op.period,
                quorum,
                total_rolls: total_rolls as f64,
                yay: tally.yay,
                nay: tally.nay,
                pass: tally.pass,
            })
        })
        .collect();

    Ok(events)
}
