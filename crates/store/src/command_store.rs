// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The versioned command record seam.
//!
//! One logical record per cluster. Writers only ever perform atomic
//! increment-and-set, never a blind overwrite, so concurrent operators
//! cannot clobber each other's version.

use async_trait::async_trait;
use drover_core::{CommandRecord, ControlCommand};
use tokio::sync::broadcast;

use crate::error::StoreError;

/// Push-mode change feed: yields full records in write order.
///
/// A lagging receiver skips straight to the newest buffered record, which
/// is safe because watchers order by version and only the latest command
/// matters.
pub struct CommandFeed {
    rx: broadcast::Receiver<CommandRecord>,
}

impl std::fmt::Debug for CommandFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandFeed").finish_non_exhaustive()
    }
}

impl CommandFeed {
    pub fn new(rx: broadcast::Receiver<CommandRecord>) -> Self {
        Self { rx }
    }

    /// Next record from the feed. `Unavailable` means the underlying
    /// subscription dropped and the caller should re-subscribe.
    pub async fn next(&mut self) -> Result<CommandRecord, StoreError> {
        loop {
            match self.rx.recv().await {
                Ok(record) => return Ok(record),
                // Skipped entries are superseded; keep draining.
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "command feed lagged, skipping to newest");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(StoreError::Unavailable("command feed closed".to_string()))
                }
            }
        }
    }
}

/// Atomically-updatable versioned command record.
#[async_trait]
pub trait CommandStore: Send + Sync {
    /// Point-in-time read of the record, `None` if never created.
    async fn read(&self) -> Result<Option<CommandRecord>, StoreError>;

    /// Create the record if absent. Returns the stored record either way,
    /// so racing creators converge on one initial state.
    async fn create_if_absent(
        &self,
        record: CommandRecord,
    ) -> Result<CommandRecord, StoreError>;

    /// Atomic increment-and-set: bumps `version` by one and replaces the
    /// command fields in a single step. Returns the new record.
    async fn increment_and_set(
        &self,
        command: ControlCommand,
        reason: &str,
        updated_by: &str,
    ) -> Result<CommandRecord, StoreError>;

    /// Open a push-mode change feed. `PushUnsupported` is the capability
    /// probe result for deployments that cannot push.
    async fn subscribe(&self) -> Result<CommandFeed, StoreError>;
}
