// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The batch-processing seam.
//!
//! The agent's poll loop only needs "process one batch, tell me how many
//! items succeeded, maybe fail". Item-level failures are recorded against
//! the item and absorbed; only whole-batch failures surface, and the
//! caller absorbs those too.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use thiserror::Error;

/// Errors from the batch collaborator.
#[derive(Debug, Clone, Error)]
pub enum BatchError {
    /// Transport failure talking to the backing store.
    #[error("batch source unavailable: {0}")]
    Unavailable(String),

    /// The processor's connection was already released.
    #[error("batch processor closed")]
    Closed,
}

/// Opaque business-logic collaborator driven by the agent's main loop.
#[async_trait]
pub trait BatchProcessor: Send + Sync {
    /// Pull and process one batch. Returns the number of items that
    /// processed successfully; item failures are counted internally.
    async fn process_batch(&self) -> Result<usize, BatchError>;

    /// Release the underlying connection. Called once during shutdown
    /// cleanup.
    async fn close(&self);
}

/// A synthetic pending item for the in-memory processor.
#[derive(Debug, Clone)]
pub struct PendingItem {
    pub id: String,
    /// Items marked poisoned fail processing and are recorded as failed.
    pub poisoned: bool,
}

impl PendingItem {
    pub fn ok(id: impl Into<String>) -> Self {
        Self { id: id.into(), poisoned: false }
    }

    pub fn poisoned(id: impl Into<String>) -> Self {
        Self { id: id.into(), poisoned: true }
    }
}

#[derive(Default)]
struct MemoryBatchState {
    pending: VecDeque<PendingItem>,
    processed: Vec<String>,
    failed: Vec<String>,
    fail_next_batches: u32,
    closed: bool,
}

/// In-memory batch processor draining a queue of synthetic items.
pub struct MemoryBatchProcessor {
    batch_size: usize,
    state: Mutex<MemoryBatchState>,
}

impl MemoryBatchProcessor {
    pub fn new(batch_size: usize) -> Self {
        Self { batch_size, state: Mutex::new(MemoryBatchState::default()) }
    }

    /// Enqueue items for the next batches.
    pub fn enqueue(&self, items: impl IntoIterator<Item = PendingItem>) {
        self.state.lock().pending.extend(items);
    }

    /// Make the next `n` batches fail wholesale with `Unavailable`.
    pub fn fail_next_batches(&self, n: u32) {
        self.state.lock().fail_next_batches = n;
    }

    /// Ids processed successfully so far.
    pub fn processed_ids(&self) -> Vec<String> {
        self.state.lock().processed.clone()
    }

    /// Ids that failed item-level processing.
    pub fn failed_ids(&self) -> Vec<String> {
        self.state.lock().failed.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

#[async_trait]
impl BatchProcessor for MemoryBatchProcessor {
    async fn process_batch(&self) -> Result<usize, BatchError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(BatchError::Closed);
        }
        if state.fail_next_batches > 0 {
            state.fail_next_batches -= 1;
            return Err(BatchError::Unavailable("injected fault".to_string()));
        }

        let take = self.batch_size.min(state.pending.len());
        if take == 0 {
            tracing::debug!("no pending items");
            return Ok(0);
        }

        let mut processed = 0;
        for _ in 0..take {
            // take > 0 guarantees the queue is non-empty here
            let Some(item) = state.pending.pop_front() else { break };
            if item.poisoned {
                tracing::warn!(id = %item.id, "item failed, marking as failed");
                state.failed.push(item.id);
            } else {
                state.processed.push(item.id);
                processed += 1;
            }
        }
        tracing::debug!(processed, batch = take, "batch completed");
        Ok(processed)
    }

    async fn close(&self) {
        self.state.lock().closed = true;
    }
}

#[cfg(test)]
#[path = "batch_tests.rs"]
mod tests;
