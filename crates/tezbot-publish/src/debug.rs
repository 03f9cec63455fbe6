//! Publisher that prints every message to stdout.

use async_trait::async_trait;

use tezbot_core::error::PublishError;
use tezbot_core::events::{Ballot, Proposal, ProposalSummary};
use tezbot_core::publisher::Publisher;

use crate::msg::MessageFormatter;

/// Writes formatted messages to stdout. Used when no Twitter credentials are
/// configured. Never fails.
pub struct DebugPublisher {
    formatter: MessageFormatter,
}

impl DebugPublisher {
    pub fn new(formatter: MessageFormatter) -> Self {
        Self { formatter }
    }

    fn print(&self, message: &str) -> Result<(), PublishError> {
        println!("{message}\n");
        Ok(())
    }
}

#[async_trait]
impl Publisher for DebugPublisher {
    async fn publish_ballot(&self, ballot: &Ballot) -> Result<(), PublishError> {
        self.print(&self.formatter.ballot(ballot).await)
    }

    async fn publish_protocol_change(&self, protocol: &str) -> Result<(), PublishError> {
        self.print(&self.formatter.protocol_change(protocol).await)
    }

    async fn publish_new_proposal(&self, proposal: &Proposal) -> Result<(), PublishError> {
        self.print(&self.formatter.new_proposal(proposal).await)
    }

    async fn publish_proposal_upvote(&self, proposal: &Proposal) -> Result<(), PublishError> {
        self.print(&self.formatter.proposal_upvote(proposal).await)
    }

    async fn publish_proposal_summary(
        &self,
        summary: &ProposalSummary,
    ) -> Result<(), PublishError> {
        self.print(&self.formatter.proposal_summary(summary).await)
    }

    async fn publish_winning_proposal(
        &self,
        summary: &ProposalSummary,
    ) -> Result<(), PublishError> {
        self.print(&self.formatter.winning_proposal(summary).await)
    }
}
