// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process command store.
//!
//! Backs tests and single-process deployments. A broadcast channel plays
//! the role of the store's change feed; construction chooses whether the
//! modeled topology supports push at all. A fault toggle injects
//! transport errors so retry discipline can be exercised.

use async_trait::async_trait;
use chrono::Utc;
use drover_core::{CommandRecord, ControlCommand};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;

use crate::command_store::{CommandFeed, CommandStore};
use crate::error::StoreError;

const FEED_CAPACITY: usize = 16;

pub struct MemoryCommandStore {
    record: Mutex<Option<CommandRecord>>,
    feed_tx: broadcast::Sender<CommandRecord>,
    push_supported: bool,
    unavailable: AtomicBool,
}

impl MemoryCommandStore {
    /// Store modeling a replicated deployment: push feeds work.
    pub fn replicated() -> Self {
        Self::with_push(true)
    }

    /// Store modeling a single-node deployment: push probe fails and
    /// watchers must poll.
    pub fn single_node() -> Self {
        Self::with_push(false)
    }

    fn with_push(push_supported: bool) -> Self {
        let (feed_tx, _) = broadcast::channel(FEED_CAPACITY);
        Self {
            record: Mutex::new(None),
            feed_tx,
            push_supported,
            unavailable: AtomicBool::new(false),
        }
    }

    /// Toggle transport failure injection: while set, every operation
    /// returns `Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected fault".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl CommandStore for MemoryCommandStore {
    async fn read(&self) -> Result<Option<CommandRecord>, StoreError> {
        self.check_available()?;
        Ok(self.record.lock().clone())
    }

    async fn create_if_absent(
        &self,
        record: CommandRecord,
    ) -> Result<CommandRecord, StoreError> {
        self.check_available()?;
        let mut guard = self.record.lock();
        match &*guard {
            Some(existing) => Ok(existing.clone()),
            None => {
                *guard = Some(record.clone());
                // Creation is a change too: watchers established before
                // initialization must see the initial record.
                let _ = self.feed_tx.send(record.clone());
                Ok(record)
            }
        }
    }

    async fn increment_and_set(
        &self,
        command: ControlCommand,
        reason: &str,
        updated_by: &str,
    ) -> Result<CommandRecord, StoreError> {
        self.check_available()?;
        let updated = {
            let mut guard = self.record.lock();
            let current = guard.as_ref().ok_or(StoreError::NotInitialized)?;
            let updated = CommandRecord {
                command,
                version: current.version + 1,
                timestamp: Utc::now(),
                reason: reason.to_string(),
                updated_by: updated_by.to_string(),
            };
            *guard = Some(updated.clone());
            updated
        };
        let _ = self.feed_tx.send(updated.clone());
        Ok(updated)
    }

    async fn subscribe(&self) -> Result<CommandFeed, StoreError> {
        self.check_available()?;
        if !self.push_supported {
            return Err(StoreError::PushUnsupported);
        }
        Ok(CommandFeed::new(self.feed_tx.subscribe()))
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
