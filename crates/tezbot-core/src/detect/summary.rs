//! Proposal summaries at cycle boundaries and the period winner.

use tracing::debug;

use crate::chain::ChainService;
use crate::config::ListenerConfig;
use crate::error::ListenerError;
use crate::events::{GovernanceEvent, ProposalSummary};
use crate::types::{Block, BlockRef, ProposalSupport};

/// Number of proposals reported in a cycle summary.
pub const SUMMARY_SIZE: usize = 3;

/// The `limit` best supported proposals on record at `level - 1`.
///
/// Sorted by supporter count, descending. The sort is stable so ties keep the
/// node's order.
pub async fn top_proposals<C: ChainService + ?Sized>(
    service: &C,
    chain: &str,
    level: u64,
    limit: usize,
) -> Result<Vec<ProposalSupport>, ListenerError> {
    let Some(prev) = level.checked_sub(1) else {
        return Ok(Vec::new());
    };
    let mut proposals = service.get_proposals(chain, &BlockRef::level(prev)).await?;
    proposals.sort_by(|a, b| b.supporter_count.cmp(&a.supporter_count));
    proposals.truncate(limit);
    Ok(proposals)
}

/// Index of the cycle that ends at `level`.
fn ended_cycle(level: u64, blocks_per_cycle: u64) -> u64 {
    (level / blocks_per_cycle).saturating_sub(1)
}

/// At every cycle boundary, report the top proposals with the supporters they
/// gained since the previous boundary.
pub async fn detect_proposal_summary<C: ChainService + ?Sized>(
    service: &C,
    chain: &str,
    block: &Block,
    config: &ListenerConfig,
) -> Result<Vec<GovernanceEvent>, ListenerError> {
    let level = block.level();
    let cycle_len = config.blocks_per_cycle;
    if level == 0 || cycle_len == 0 || level % cycle_len != 0 {
        return Ok(Vec::new());
    }
    debug!(block = %block.hash, level, "inspecting block for proposal summary");

    let top = top_proposals(service, chain, level, SUMMARY_SIZE).await?;
    let previous = service
        .get_proposals(chain, &BlockRef::level(level - cycle_len))
        .await?;

    let cycle = ended_cycle(level, cycle_len);
    let events = top
        .into_iter()
        .map(|p| {
            let before = previous
                .iter()
                .find(|prev| prev.proposal_hash == p.proposal_hash)
                .map_or(0, |prev| prev.supporter_count);
            GovernanceEvent::ProposalSummary(ProposalSummary {
                new_supporters: p.supporter_count - before,
                proposal_hash: p.proposal_hash,
                supporter_count: p.supporter_count,
                cycle,
            })
        })
        .collect();

    Ok(events)
}

/// At every voting-period boundary, report the best supported proposal.
pub async fn detect_winning_proposal<C: ChainService + ?Sized>(
    service: &C,
    chain: &str,
    block: &Block,
    config: &ListenerConfig,
) -> Result<Option<GovernanceEvent>, ListenerError> {
    let level = block.level();
    let period_len = config.voting_period_length();
    if level == 0 || period_len == 0 || level % period_len != 0 {
        return Ok(None);
    }
    debug!(block = %block.hash, level, "inspecting block for winning proposal");

    let winner = top_proposals(service, chain, level, 1).await?.into_iter().next();
    Ok(winner.map(|p| {
        GovernanceEvent::WinningProposal(ProposalSummary {
            proposal_hash: p.proposal_hash,
            supporter_count: p.supporter_count,
            cycle: ended_cycle(level, config.blocks_per_cycle),
            new_supporters: 0,
        })
    }))
}
