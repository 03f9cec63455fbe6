//! Recency cache — remembers the last few block identifiers the listener
//! processed so a redelivered head is not inspected twice.

use std::collections::VecDeque;

use crate::types::BlockRef;

/// Number of identifiers retained. Only the most recent heads can plausibly
/// be redelivered after a reconnect.
pub const RECENCY_WINDOW: usize = 4;

/// Bounded FIFO set of recently processed block identifiers.
///
/// Owned by a single listener loop; there is no internal locking.
pub struct RecencyCache {
    /// Oldest first.
    window: VecDeque<BlockRef>,
    capacity: usize,
}

impl RecencyCache {
    pub fn new() -> Self {
        Self::with_capacity(RECENCY_WINDOW)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn has(&self, id: &BlockRef) -> bool {
        self.window.contains(id)
    }

    /// Record `id`. A no-op if already present; otherwise evicts the oldest
    /// entry when the window is full.
    pub fn add(&mut self, id: BlockRef) {
        if self.has(&id) {
            return;
        }
        if self.window.len() >= self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(id);
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }
}

impl Default for RecencyCache {
    fn default() -> Self {
        Self::new()
    }
}
