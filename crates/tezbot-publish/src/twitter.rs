//! Publisher that posts every message as a tweet.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use tezbot_core::error::PublishError;
use tezbot_core::events::{Ballot, Proposal, ProposalSummary};
use tezbot_core::publisher::Publisher;

use crate::msg::MessageFormatter;

/// Default Twitter API base URL.
pub const DEFAULT_API_BASE: &str = "https://api.twitter.com";

/// Connection settings for [`TwitterPublisher`].
#[derive(Debug, Clone)]
pub struct TwitterConfig {
    /// OAuth 2.0 user access token, sent as a bearer token.
    pub access_token: String,
    pub api_base: String,
    pub request_timeout: Duration,
}

impl TwitterConfig {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            api_base: DEFAULT_API_BASE.into(),
            request_timeout: Duration::from_secs(15),
        }
    }
}

#[derive(Debug, Serialize)]
struct NewTweet<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct UserEnvelope {
    data: User,
}

#[derive(Debug, Deserialize)]
struct User {
    username: String,
}

/// Posts status messages to Twitter.
pub struct TwitterPublisher {
    http: reqwest::Client,
    config: TwitterConfig,
    formatter: MessageFormatter,
}

impl TwitterPublisher {
    /// Build the publisher and check the token against the account endpoint.
    pub async fn connect(
        config: TwitterConfig,
        formatter: MessageFormatter,
    ) -> Result<Self, PublishError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| PublishError::Other(format!("building HTTP client: {e}")))?;
        let publisher = Self {
            http,
            config,
            formatter,
        };
        let username = publisher.verify().await?;
        tracing::info!(username = %username, "twitter credentials verified");
        Ok(publisher)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.config.api_base.trim_end_matches('/'))
    }

    async fn verify(&self) -> Result<String, PublishError> {
        let resp = self
            .http
            .get(self.endpoint("/2/users/me"))
            .bearer_auth(&self.config.access_token)
            .send()
            .await
            .map_err(|e| PublishError::Http(e.to_string()))?;
        let resp = check(resp).await?;
        let me: UserEnvelope = resp
            .json()
            .await
            .map_err(|e| PublishError::Other(format!("decoding account: {e}")))?;
        Ok(me.data.username)
    }

    /// Post `text` as a new tweet.
    pub async fn tweet(&self, text: &str) -> Result<(), PublishError> {
        let resp = self
            .http
            .post(self.endpoint("/2/tweets"))
            .bearer_auth(&self.config.access_token)
            .json(&NewTweet { text })
            .send()
            .await
            .map_err(|e| PublishError::Http(e.to_string()))?;
        check(resp).await?;
        tracing::debug!(chars = text.chars().count(), "tweet posted");
        Ok(())
    }
}

async fn check(resp: reqwest::Response) -> Result<reqwest::Response, PublishError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    Err(PublishError::Rejected { status, body })
}

#[async_trait]
impl Publisher for TwitterPublisher {
    async fn publish_ballot(&self, ballot: &Ballot) -> Result<(), PublishError> {
        self.tweet(&self.formatter.ballot(ballot).await).await
    }

    async fn publish_protocol_change(&self, protocol: &str) -> Result<(), PublishError> {
        self.tweet(&self.formatter.protocol_change(protocol).await).await
    }

    async fn publish_new_proposal(&self, proposal: &Proposal) -> Result<(), PublishError> {
        self.tweet(&self.formatter.new_proposal(proposal).await).await
    }

    async fn publish_proposal_upvote(&self, proposal: &Proposal) -> Result<(), PublishError> {
        self.tweet(&self.formatter.proposal_upvote(proposal).await).await
    }

    async fn publish_proposal_summary(
        &self,
        summary: &ProposalSummary,
    ) -> Result<(), PublishError> {
        self.tweet(&self.formatter.proposal_summary(summary).await).await
    }

    async fn publish_winning_proposal(
        &self,
        summary: &ProposalSummary,
    ) -> Result<(), PublishError> {
        self.tweet(&self.formatter.winning_proposal(summary).await).await
    }
}
