// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Distributed control coordinator.
//!
//! Propagates the single cluster-wide command to every agent instance via
//! the versioned record in the shared store. Watch mode is fixed per
//! `watch` invocation: push when the deployment supports it and config
//! allows, otherwise polling. Either mode delivers exactly one callback
//! per observed version increase, in increasing order; a version gap
//! delivers only the latest record.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use drover_core::{BackoffPolicy, CommandRecord, ControlCommand};
use drover_store::{CommandStore, StoreError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Active transport for the cluster watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchMode {
    Push,
    Poll,
}

/// Observability snapshot of the coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlStats {
    pub watch_mode: Option<WatchMode>,
    pub poll_interval_secs: Option<u64>,
    pub current: Option<CommandRecord>,
}

pub struct ControlCoordinator {
    store: Arc<dyn CommandStore>,
    poll_interval: Duration,
    enable_push: bool,
    last_version: AtomicU64,
    watch_mode: Mutex<Option<WatchMode>>,
}

impl ControlCoordinator {
    pub fn new(store: Arc<dyn CommandStore>, poll_interval: Duration, enable_push: bool) -> Self {
        Self {
            store,
            poll_interval,
            enable_push,
            last_version: AtomicU64::new(0),
            watch_mode: Mutex::new(None),
        }
    }

    /// Idempotent startup: create the cluster record if absent and track
    /// the last-seen version. Safe to call on every process start.
    pub async fn initialize(&self) -> Result<CommandRecord, StoreError> {
        let record = self
            .store
            .create_if_absent(CommandRecord::initial(Utc::now()))
            .await?;
        self.last_version.store(record.version, Ordering::SeqCst);
        info!(
            command = %record.command,
            version = record.version,
            "cluster control record ready"
        );
        Ok(record)
    }

    /// Set the command for every agent in the cluster. Returns the new
    /// record including its bumped version.
    pub async fn set_global_command(
        &self,
        command: ControlCommand,
        reason: &str,
        updated_by: &str,
    ) -> Result<CommandRecord, StoreError> {
        let record = self
            .store
            .increment_and_set(command, reason, updated_by)
            .await?;
        info!(
            command = %record.command,
            version = record.version,
            updated_by,
            reason,
            "global command set"
        );
        Ok(record)
    }

    /// Point-in-time read; `None` only if the record was never created.
    pub async fn current(&self) -> Result<Option<CommandRecord>, StoreError> {
        self.store.read().await
    }

    /// Transport mode of the active watch, `None` before the first watch.
    pub fn watch_mode(&self) -> Option<WatchMode> {
        *self.watch_mode.lock()
    }

    /// Rough cluster propagation latency under the active mode. Advisory,
    /// returned to operators issuing cluster commands.
    pub fn propagation_estimate(&self) -> Duration {
        match self.watch_mode() {
            Some(WatchMode::Push) | None => Duration::from_secs(1),
            Some(WatchMode::Poll) => self.poll_interval,
        }
    }

    /// Observability snapshot: mode, interval, current record.
    pub async fn stats(&self) -> ControlStats {
        let mode = self.watch_mode();
        ControlStats {
            watch_mode: mode,
            poll_interval_secs: match mode {
                Some(WatchMode::Poll) => Some(self.poll_interval.as_secs()),
                _ => None,
            },
            current: self.current().await.ok().flatten(),
        }
    }

    /// Watch the cluster record until cancelled, invoking `callback` once
    /// per version increase.
    ///
    /// Mode is chosen on entry and fixed for the life of this call: a
    /// successful push subscription wins; a failed probe (or push disabled
    /// by config) degrades to polling.
    pub async fn watch<F, Fut>(&self, mut callback: F, cancel: CancellationToken)
    where
        F: FnMut(ControlCommand, CommandRecord) -> Fut + Send,
        Fut: Future<Output = ()> + Send,
    {
        if self.enable_push {
            match self.store.subscribe().await {
                Ok(feed) => {
                    *self.watch_mode.lock() = Some(WatchMode::Push);
                    info!("cluster watch using push notifications");
                    self.watch_push(feed, &mut callback, &cancel).await;
                    return;
                }
                Err(StoreError::PushUnsupported) => {
                    warn!("push notifications unsupported by deployment, falling back to polling");
                }
                Err(e) => {
                    warn!(error = %e, "push probe failed, falling back to polling");
                }
            }
        } else {
            info!("push notifications disabled by configuration");
        }

        *self.watch_mode.lock() = Some(WatchMode::Poll);
        info!(interval_secs = self.poll_interval.as_secs(), "cluster watch using polling");
        self.watch_poll(&mut callback, &cancel).await;
    }

    async fn watch_push<F, Fut>(
        &self,
        feed: drover_store::CommandFeed,
        callback: &mut F,
        cancel: &CancellationToken,
    ) where
        F: FnMut(ControlCommand, CommandRecord) -> Fut + Send,
        Fut: Future<Output = ()> + Send,
    {
        let mut backoff = BackoffPolicy::transport().start();
        let mut feed = Some(feed);

        loop {
            let mut active = match feed.take() {
                Some(f) => f,
                None => {
                    // Reconnect with backoff; a shutdown during the wait
                    // returns promptly.
                    let delay = backoff.next_delay();
                    error!(delay_secs = delay.as_secs(), "push feed lost, reconnecting");
                    tokio::select! {
                        _ = cancel.cancelled() => return,
                        _ = tokio::time::sleep(delay) => {}
                    }
                    match self.store.subscribe().await {
                        Ok(f) => f,
                        Err(e) => {
                            error!(error = %e, "push resubscribe failed");
                            continue;
                        }
                    }
                }
            };

            backoff.reset();

            // A change may have landed while the subscription was down.
            if let Ok(Some(record)) = self.store.read().await {
                self.deliver_if_newer(record, callback).await;
            }

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("push watch cancelled");
                        return;
                    }
                    next = active.next() => match next {
                        Ok(record) => self.deliver_if_newer(record, callback).await,
                        Err(e) => {
                            error!(error = %e, "push feed error");
                            break;
                        }
                    }
                }
            }
        }
    }

    async fn watch_poll<F, Fut>(&self, callback: &mut F, cancel: &CancellationToken)
    where
        F: FnMut(ControlCommand, CommandRecord) -> Fut + Send,
        Fut: Future<Output = ()> + Send,
    {
        let mut backoff = BackoffPolicy::transport().start();

        loop {
            match self.store.read().await {
                Ok(Some(record)) => {
                    self.deliver_if_newer(record, callback).await;
                    backoff.reset();
                }
                Ok(None) => {
                    // Not initialized yet; quiet no-op at the poll cadence.
                    debug!("cluster record absent");
                    backoff.reset();
                }
                Err(e) => {
                    let delay = backoff.next_delay();
                    error!(error = %e, delay_secs = delay.as_secs(), "cluster poll failed");
                    tokio::select! {
                        _ = cancel.cancelled() => return,
                        _ = tokio::time::sleep(delay) => {}
                    }
                    continue;
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("poll watch cancelled");
                    return;
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }

    /// Version gate: apply a record only if it is strictly newer than the
    /// last one observed. Superseded intermediates are skipped; only the
    /// latest command matters.
    async fn deliver_if_newer<F, Fut>(&self, record: CommandRecord, callback: &mut F)
    where
        F: FnMut(ControlCommand, CommandRecord) -> Fut + Send,
        Fut: Future<Output = ()> + Send,
    {
        let last = self.last_version.load(Ordering::SeqCst);
        if record.version <= last {
            return;
        }
        self.last_version.store(record.version, Ordering::SeqCst);
        info!(
            command = %record.command,
            version = record.version,
            updated_by = %record.updated_by,
            "cluster command change detected"
        );
        callback(record.command, record).await;
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
