//! Typed governance events produced by the detectors.

use serde::{Deserialize, Serialize};

use crate::types::Vote;

/// Every event the listener can emit, routed by the dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GovernanceEvent {
    Ballot(Ballot),
    NewProposal(Proposal),
    ProposalUpvote(Proposal),
    ProposalSummary(ProposalSummary),
    WinningProposal(ProposalSummary),
    ProtocolChange { protocol: String },
}

impl GovernanceEvent {
    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Ballot(_) => "ballot",
            Self::NewProposal(_) => "new_proposal",
            Self::ProposalUpvote(_) => "proposal_upvote",
            Self::ProposalSummary(_) => "proposal_summary",
            Self::WinningProposal(_) => "winning_proposal",
            Self::ProtocolChange { .. } => "protocol_change",
        }
    }
}

// ─── Ballot ───────────────────────────────────────────────────────────────────

/// A ballot cast in a block, together with the period-wide tally at that block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ballot {
    /// The voting delegate.
    pub pkh: String,
    pub ballot: Vote,
    pub proposal_hash: String,
    /// Weight of this delegate.
    pub rolls: i64,
    /// `true` during the exploration (testing) vote, `false` during promotion.
    pub is_exploration: bool,
    pub period: u32,

    /// Required participation, in percent.
    pub quorum: f64,
    /// Sum of the rolls of every listed delegate.
    pub total_rolls: f64,
    pub yay: i64,
    pub nay: i64,
    pub pass: i64,
}

impl Ballot {
    /// Rolls that have voted so far, passes included.
    pub fn participations(&self) -> f64 {
        (self.yay + self.nay + self.pass) as f64
    }

    /// Rolls counted toward the supermajority (passes excluded).
    pub fn counting_participations(&self) -> f64 {
        (self.yay + self.nay) as f64
    }

    pub fn percent_participation(&self) -> f64 {
        if self.total_rolls == 0.0 {
            return 0.0;
        }
        self.participations() / self.total_rolls * 100.0
    }

    pub fn percent_yay(&self) -> f64 {
        percent(self.yay, self.participations())
    }

    pub fn percent_nay(&self) -> f64 {
        percent(self.nay, self.participations())
    }

    pub fn percent_pass(&self) -> f64 {
        percent(self.pass, self.participations())
    }

    pub fn counting_percent_yay(&self) -> f64 {
        percent(self.yay, self.counting_participations())
    }

    pub fn counting_percent_nay(&self) -> f64 {
        percent(self.nay, self.counting_participations())
    }

    /// Participation still missing to reach quorum; zero or negative once reached.
    pub fn percent_toward_quorum(&self) -> f64 {
        self.quorum - self.percent_participation()
    }

    pub fn quorum_reached(&self) -> bool {
        self.percent_toward_quorum() <= 0.0
    }

    /// Name of the vote phase.
    pub fn phase(&self) -> &'static str {
        if self.is_exploration {
            "exploration"
        } else {
            "promotion"
        }
    }
}

fn percent(part: i64, whole: f64) -> f64 {
    if whole == 0.0 {
        return 0.0;
    }
    part as f64 / whole * 100.0
}

// ─── Proposals ────────────────────────────────────────────────────────────────

/// A proposal injection or upvote found in a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub proposal_hash: String,
    /// The submitting delegate.
    pub pkh: String,
    /// Voting period index.
    pub period: u32,
    /// Submitter weight when the listing could be read.
    pub rolls: Option<i64>,
}

/// Supporter count of a proposal at a cycle checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalSummary {
    pub proposal_hash: String,
    pub supporter_count: i64,
    /// Cycle that just ended.
    pub cycle: u64,
    /// Supporters gained since the previous checkpoint. Zero for period winners.
    pub new_supporters: i64,
}

// ─── Tests ────────────────────────────────────────────────────────────────────
