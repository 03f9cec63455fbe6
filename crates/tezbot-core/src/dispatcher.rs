//! Routes every event to the matching publisher operation.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info};

use crate::error::PublishError;
use crate::events::GovernanceEvent;
use crate::listener::ListenerHandle;
use crate::publisher::Publisher;

/// Consumes the listener's events and publishes them one at a time.
///
/// Publishing is best effort: a failure is logged with the event payload and
/// the next event is dispatched as usual.
pub struct Dispatcher {
    publisher: Arc<dyn Publisher>,
    events: mpsc::Receiver<GovernanceEvent>,
    listener: ListenerHandle,
    stop: watch::Receiver<bool>,
}

impl Dispatcher {
    pub fn new(
        publisher: Arc<dyn Publisher>,
        events: mpsc::Receiver<GovernanceEvent>,
        listener: ListenerHandle,
        stop: watch::Receiver<bool>,
    ) -> Self {
        Self {
            publisher,
            events,
            listener,
            stop,
        }
    }

    /// Run until stopped or until the listener drops its event sender.
    ///
    /// A stop request is forwarded to the listener. Events still queued at
    /// that point are dropped.
    pub async fn run(mut self) {
        if *self.stop.borrow() {
            self.listener.stop();
            return;
        }

        loop {
            tokio::select! {
                biased;

                // A dropped stop sender counts as a stop request.
                changed = self.stop.changed() => {
                    if changed.is_err() || *self.stop.borrow() {
                        info!("dispatcher stopping");
                        self.listener.stop();
                        break;
                    }
                }

                next = self.events.recv() => match next {
                    Some(event) => self.dispatch(&event).await,
                    None => {
                        debug!("event channel closed");
                        break;
                    }
                },
            }
        }
    }

    /// Publish a single event, logging any failure.
    pub async fn dispatch(&self, event: &GovernanceEvent) {
        if let Err(e) = self.publish(event).await {
            let payload = serde_json::to_string(event).unwrap_or_else(|_| format!("{event:?}"));
            error!(
                kind = event.kind(),
                event = %payload,
                error = %e,
                "event was not published"
            );
        }
    }

    async fn publish(&self, event: &GovernanceEvent) -> Result<(), PublishError> {
        match event {
            GovernanceEvent::Ballot(ballot) => self.publisher.publish_ballot(ballot).await,
            GovernanceEvent::NewProposal(p) => self.publisher.publish_new_proposal(p).await,
            GovernanceEvent::ProposalUpvote(p) => self.publisher.publish_proposal_upvote(p).await,
            GovernanceEvent::ProposalSummary(s) => {
                self.publisher.publish_proposal_summary(s).await
            }
            GovernanceEvent::WinningProposal(s) => {
                self.publisher.publish_winning_proposal(s).await
            }
            GovernanceEvent::ProtocolChange { protocol } => {
                self.publisher.publish_protocol_change(protocol).await
            }
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
