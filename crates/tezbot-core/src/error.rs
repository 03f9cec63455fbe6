//! Error types for the monitoring pipeline.

use thiserror::Error;

/// Errors returned by the external chain service.
#[derive(Debug, Error)]
pub enum ChainError {
    /// Connection refused, timeout, broken body stream.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The node answered with a non-success status.
    #[error("node returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// A head subscription ended.
    #[error("head stream closed")]
    StreamClosed,

    #[error("{0}")]
    Other(String),
}

impl ChainError {
    /// Returns `true` if the failure is transient and the call may be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) | Self::StreamClosed => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Decode(_) | Self::Other(_) => false,
        }
    }
}

impl From<serde_json::Error> for ChainError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}

/// Errors raised by block sources, detectors and the listener loop.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("chain service error: {0}")]
    Chain(#[from] ChainError),

    /// A voting block whose listings carry no rolls at all.
    #[error("no rolls found in block {block}")]
    NoRolls { block: String },

    /// The live monitor ran out of retries.
    #[error("unable to reach the node after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: ChainError,
    },

    /// The consumer side of an internal channel went away.
    #[error("channel closed")]
    ChannelClosed,

    #[error("{0}")]
    Other(String),
}

impl ListenerError {
    /// Returns `true` if the error must stop the listener instead of skipping a block.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::RetriesExhausted { .. } | Self::ChannelClosed)
    }
}

/// Errors returned by publisher backends.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("publish rejected with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("{0}")]
    Other(String),
}
