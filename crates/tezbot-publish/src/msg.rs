//! Status messages for each governance event.

use std::sync::Arc;

use tezbot_core::events::{Ballot, Proposal, ProposalSummary};

use crate::names::{NameResolver, ADDRESS_ZONE, PROPOSAL_ZONE};

/// Format a percentage rounded to two decimals, without trailing zeros.
///
/// `percent(66.666)` is `"66.67%"`, `percent(50.0)` is `"50%"`.
pub fn percent(value: f64) -> String {
    let rounded = (value * 100.0).round() / 100.0;
    let text = format!("{rounded:.2}");
    let text = text.trim_end_matches('0').trim_end_matches('.');
    format!("{text}%")
}

fn title(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Renders events as human-readable status lines, resolving vanity names.
#[derive(Clone)]
pub struct MessageFormatter {
    names: Arc<dyn NameResolver>,
}

impl MessageFormatter {
    pub fn new(names: Arc<dyn NameResolver>) -> Self {
        Self { names }
    }

    async fn name_or(&self, key: &str, zone: &str) -> String {
        self.names
            .lookup(key, zone)
            .await
            .unwrap_or_else(|| key.to_string())
    }

    /// `"Name (hash)"` when the proposal has a name, the bare hash otherwise.
    async fn proposal_label(&self, hash: &str) -> String {
        match self.names.lookup(hash, PROPOSAL_ZONE).await {
            Some(name) => format!("{name} ({hash})"),
            None => hash.to_string(),
        }
    }

    pub async fn ballot(&self, ballot: &Ballot) -> String {
        let account = self.name_or(&ballot.pkh, ADDRESS_ZONE).await;
        let proposal = self.name_or(&ballot.proposal_hash, PROPOSAL_ZONE).await;

        let quorum = if ballot.quorum_reached() {
            format!("Quorum of {} reached.", percent(ballot.quorum))
        } else {
            format!(
                "{} more participation needed to reach the {} quorum.",
                percent(ballot.percent_toward_quorum()),
                percent(ballot.quorum)
            )
        };

        format!(
            "{account} voted {} with {} rolls on #Tezos proposal {proposal} ({} vote, period {}).\n\n\
             Current result: {} yay, {} nay. {quorum}",
            title(&ballot.ballot.to_string()),
            ballot.rolls,
            title(ballot.phase()),
            ballot.period,
            percent(ballot.counting_percent_yay()),
            percent(ballot.counting_percent_nay()),
        )
    }

    pub async fn new_proposal(&self, proposal: &Proposal) -> String {
        let account = match self.names.lookup(&proposal.pkh, ADDRESS_ZONE).await {
            Some(name) => format!("{name} /{}", proposal.pkh),
            None => proposal.pkh.clone(),
        };
        format!(
            "New #Tezos proposal injected! {account} injected proposal {} in voting period {}.",
            proposal.proposal_hash, proposal.period
        )
    }

    pub async fn proposal_upvote(&self, proposal: &Proposal) -> String {
        let account = self.name_or(&proposal.pkh, ADDRESS_ZONE).await;
        let name = self.name_or(&proposal.proposal_hash, PROPOSAL_ZONE).await;
        let rolls = match proposal.rolls {
            Some(r) if r != 0 => format!("with {r} rolls "),
            _ => String::new(),
        };
        format!(
            "Address {account} upvoted proposal {name} {rolls}in voting period {}.\n\n\
             https://tezblock.io/account/{}?tab=Votes",
            proposal.period, proposal.pkh
        )
    }

    pub async fn proposal_summary(&self, summary: &ProposalSummary) -> String {
        let label = self.proposal_label(&summary.proposal_hash).await;
        format!(
            "Proposal upvotes: #Tezos proposal {label} received {} upvotes in cycle {}, and now has {} votes.",
            summary.new_supporters, summary.cycle, summary.supporter_count
        )
    }

    pub async fn winning_proposal(&self, summary: &ProposalSummary) -> String {
        let label = self.proposal_label(&summary.proposal_hash).await;
        format!(
            "Proposal period complete: proposal {label} received the most upvotes ({}) and is advancing to the exploration vote period.",
            summary.supporter_count
        )
    }

    pub async fn protocol_change(&self, protocol: &str) -> String {
        let name = self.name_or(protocol, PROPOSAL_ZONE).await;
        format!("Protocol {name} is now live on mainnet! #Tezos")
    }
}
