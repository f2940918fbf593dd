//! Pasteboard change detection.
//!
//! The pasteboard exposes a counter that every writer bumps. Polling compares
//! it with the last value seen; any difference means new content. The value
//! observed at start-up is the baseline, so whatever was already on the
//! pasteboard at launch is not captured.

use tracing::trace;

/// Tracks the last pasteboard change counter seen by the poll loop
#[derive(Debug, Clone)]
pub struct ChangeDetector {
    last_seen: i64,
}

impl ChangeDetector {
    /// Start tracking from a baseline counter value
    pub fn new(baseline: i64) -> Self {
        Self { last_seen: baseline }
    }

    /// Check if the counter moved since the last call, and remember it
    pub fn has_changed(&mut self, change_count: i64) -> bool {
        if change_count == self.last_seen {
            return false;
        }

        trace!("Change count {} -> {}", self.last_seen, change_count);
        self.last_seen = change_count;
        true
    }

    /// Record a counter value without reporting it as a change
    pub fn observe(&mut self, change_count: i64) {
        self.last_seen = change_count;
    }

    pub fn last_seen(&self) -> i64 {
        self.last_seen
    }
}
