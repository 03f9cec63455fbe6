//! Listener configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Everything the listener and its block source need to know, as plain fields.
///
/// Field names match the keys of the bot's YAML config file so the struct can
/// be flattened into it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Chain identifier used in RPC paths (e.g. `"main"`).
    pub chain: String,
    /// Consecutive head-subscription failures tolerated before giving up.
    pub retry_count: u32,
    /// Backoff unit; the n-th retry waits `n * retry_backoff_ms`.
    pub retry_backoff_ms: u64,
    /// Replay history instead of following the head.
    pub history: bool,
    /// First level replayed in history mode.
    pub history_starting_block: u64,
    /// Pause between two history fetches.
    pub history_interval_ms: u64,
    /// Watch ballots during exploration and promotion.
    pub monitor_vote: bool,
    /// Watch protocol activations.
    pub monitor_protocol: bool,
    /// Watch proposal injections, upvotes, cycle summaries and period winners.
    pub monitor_proposal: bool,
    /// Blocks per cycle; proposal summaries are produced at each cycle boundary.
    pub blocks_per_cycle: u64,
    /// Cycles per voting period; the winner is announced at each period boundary.
    pub cycles_per_voting_period: u64,
    /// Capacity of the block-ref and event channels.
    pub channel_capacity: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            chain: "main".into(),
            retry_count: 100,
            retry_backoff_ms: 1000,
            history: false,
            history_starting_block: 0,
            history_interval_ms: 2000,
            monitor_vote: true,
            monitor_protocol: true,
            monitor_proposal: true,
            blocks_per_cycle: 4096,
            cycles_per_voting_period: 8,
            channel_capacity: 16,
        }
    }
}

impl ListenerConfig {
    /// Length of a voting period in blocks. Saturates on absurd settings.
    pub fn voting_period_length(&self) -> u64 {
        self.blocks_per_cycle.saturating_mul(self.cycles_per_voting_period)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn history_interval(&self) -> Duration {
        Duration::from_millis(self.history_interval_ms)
    }
}
