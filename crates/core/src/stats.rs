// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Processing counters reported by the agent.

use serde::{Deserialize, Serialize};

/// Monotonic counters for the agent's poll loop.
///
/// Single-writer: only the main loop mutates these; the heartbeat and the
/// stats surface read snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentStats {
    pub batches_processed: u64,
    pub documents_processed: u64,
    pub errors: u64,
}

impl AgentStats {
    /// Record a completed batch of `documents` items.
    pub fn record_batch(&mut self, documents: u64) {
        self.batches_processed += 1;
        self.documents_processed += documents;
    }

    /// Record an absorbed batch failure.
    pub fn record_error(&mut self) {
        self.errors += 1;
    }
}

#[cfg(test)]
#[path = "stats_tests.rs"]
mod tests;
