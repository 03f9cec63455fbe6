//! The `Publisher` trait — where dispatched events end up.

use async_trait::async_trait;

use crate::error::PublishError;
use crate::events::{Ballot, Proposal, ProposalSummary};

/// A publishing backend. Failures are reported to the dispatcher, which logs
/// them and moves on; nothing is retried.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish_ballot(&self, ballot: &Ballot) -> Result<(), PublishError>;

    async fn publish_protocol_change(&self, protocol: &str) -> Result<(), PublishError>;

    async fn publish_new_proposal(&self, proposal: &Proposal) -> Result<(), PublishError>;

    async fn publish_proposal_upvote(&self, proposal: &Proposal) -> Result<(), PublishError>;

    async fn publish_proposal_summary(&self, summary: &ProposalSummary)
        -> Result<(), PublishError>;

    async fn publish_winning_proposal(&self, summary: &ProposalSummary)
        -> Result<(), PublishError>;
}
