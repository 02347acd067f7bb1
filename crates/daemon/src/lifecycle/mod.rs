// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent lifecycle: the single authoritative state machine.
//!
//! Four independent control sources (OS signals, the local control file,
//! the control socket, and the cluster command watch) all converge on the
//! three primitive transitions here. State lives in one watch channel;
//! the main loop and the monitors observe it, nothing else mutates it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use drover_core::{AgentState, AgentStats, ControlCommand};
use drover_store::{BatchProcessor, StoreError};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::control::ControlCoordinator;
use crate::health::HealthFiles;

/// Errors that abort the agent's run (and get it restarted by the
/// supervisor). Everything else is absorbed in place.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("store error during startup sync: {0}")]
    Store(#[from] StoreError),
}

struct AgentInner {
    config: Config,
    state_tx: watch::Sender<AgentState>,
    shutdown: CancellationToken,
    stats: Mutex<AgentStats>,
    health: HealthFiles,
    processor: Arc<dyn BatchProcessor>,
    coordinator: Option<Arc<ControlCoordinator>>,
    start_time: Instant,
}

/// Cloneable handle to the agent lifecycle.
#[derive(Clone)]
pub struct Agent {
    inner: Arc<AgentInner>,
}

impl Agent {
    pub fn new(
        config: Config,
        processor: Arc<dyn BatchProcessor>,
        coordinator: Option<Arc<ControlCoordinator>>,
    ) -> Self {
        let health = HealthFiles::new(config.liveness_path(), config.readiness_path());
        let (state_tx, _) = watch::channel(AgentState::Running);
        Self {
            inner: Arc::new(AgentInner {
                config,
                state_tx,
                shutdown: CancellationToken::new(),
                stats: Mutex::new(AgentStats::default()),
                health,
                processor,
                coordinator,
                start_time: Instant::now(),
            }),
        }
    }

    pub fn state(&self) -> AgentState {
        *self.inner.state_tx.borrow()
    }

    pub fn stats(&self) -> AgentStats {
        self.inner.stats.lock().clone()
    }

    pub fn uptime(&self) -> Duration {
        self.inner.start_time.elapsed()
    }

    pub fn coordinator(&self) -> Option<&Arc<ControlCoordinator>> {
        self.inner.coordinator.as_ref()
    }

    /// Resolve once the agent has fully stopped and released its
    /// resources.
    pub async fn wait_stopped(&self) {
        let mut state_rx = self.inner.state_tx.subscribe();
        let _ = state_rx.wait_for(|state| *state == AgentState::Stopped).await;
    }

    /// Pause processing after the in-flight batch. Returns whether the
    /// transition happened; out-of-precondition calls are logged no-ops.
    pub fn pause(&self) -> bool {
        let mut changed = false;
        self.inner.state_tx.send_modify(|state| {
            if state.can_pause() {
                *state = AgentState::Paused;
                changed = true;
            }
        });
        if changed {
            info!("pausing agent");
            self.apply_health();
        } else {
            warn!(state = %self.state(), "cannot pause from current state");
        }
        changed
    }

    /// Resume processing. Returns whether the transition happened.
    pub fn resume(&self) -> bool {
        let mut changed = false;
        self.inner.state_tx.send_modify(|state| {
            if state.can_resume() {
                *state = AgentState::Running;
                changed = true;
            }
        });
        if changed {
            info!("resuming agent");
            self.apply_health();
        } else {
            warn!(state = %self.state(), "cannot resume from current state");
        }
        changed
    }

    /// Commit to graceful shutdown. Idempotent: repeated calls are
    /// warned no-ops. The main loop exits after any in-flight batch.
    pub async fn shutdown(&self) -> bool {
        let mut changed = false;
        self.inner.state_tx.send_modify(|state| {
            if !state.is_terminal() {
                *state = AgentState::Stopping;
                changed = true;
            }
        });
        if changed {
            info!("initiating graceful shutdown");
            self.apply_health();
            self.inner.shutdown.cancel();
        } else {
            warn!(state = %self.state(), "already shutting down");
        }
        changed
    }

    /// Apply a cluster (or startup-sync) command to local state.
    /// Redundant deliveries are harmless: every mapping is a guarded
    /// no-op outside its precondition.
    pub async fn apply_command(&self, command: ControlCommand) {
        match command {
            ControlCommand::Pause => {
                self.pause();
            }
            ControlCommand::Running => {
                self.resume();
            }
            ControlCommand::Shutdown => {
                self.shutdown().await;
            }
        }
    }

    /// Run until shutdown. Monitor tasks are always torn down on exit;
    /// markers, processor, and the terminal `Stopped` state are only
    /// committed on a graceful exit, so a supervised restart after a
    /// startup failure re-runs the loop instead of short-circuiting.
    pub async fn run(&self) -> Result<(), AgentError> {
        info!(
            poll_interval_secs = self.inner.config.poll_interval.as_secs(),
            batch_size = self.inner.config.batch_size,
            "starting agent"
        );

        let monitors = CancellationToken::new();
        let mut tasks: Vec<JoinHandle<()>> = Vec::new();
        let result = self.run_inner(&monitors, &mut tasks).await;

        info!("cleaning up agent resources");
        monitors.cancel();
        for task in tasks {
            if let Err(e) = task.await {
                debug!(error = %e, "monitor task join error");
            }
        }

        match &result {
            Ok(()) => {
                // Graceful exit: release everything and go terminal.
                self.inner.state_tx.send_modify(|state| *state = AgentState::Stopped);
                self.inner.health.clear();
                self.inner.processor.close().await;

                let stats = self.stats();
                info!(
                    batches = stats.batches_processed,
                    documents = stats.documents_processed,
                    errors = stats.errors,
                    "agent stopped"
                );
            }
            Err(e) => {
                // Startup failure: keep state non-terminal and the
                // processor open so a supervised restart can recover.
                error!(error = %e, "agent run failed");
            }
        }
        result
    }

    async fn run_inner(
        &self,
        monitors: &CancellationToken,
        tasks: &mut Vec<JoinHandle<()>>,
    ) -> Result<(), AgentError> {
        // Startup sync: the cluster may have been paused or shut down
        // before this instance started. Apply the current command once
        // before relying on the watch for subsequent changes.
        if let Some(coordinator) = &self.inner.coordinator {
            coordinator.initialize().await?;
            if let Some(record) = coordinator.current().await? {
                info!(
                    command = %record.command,
                    version = record.version,
                    "applying cluster command at startup"
                );
                self.apply_command(record.command).await;
            }

            let agent = self.clone();
            let coordinator = Arc::clone(coordinator);
            let cancel = monitors.child_token();
            tasks.push(tokio::spawn(async move {
                coordinator
                    .watch(
                        move |command, _record| {
                            let agent = agent.clone();
                            async move { agent.apply_command(command).await }
                        },
                        cancel,
                    )
                    .await;
            }));
        }

        self.apply_health();
        tasks.push(self.spawn_heartbeat(monitors.child_token()));
        tasks.push(self.spawn_control_file_monitor(monitors.child_token()));

        self.main_loop().await;
        Ok(())
    }

    /// Poll loop: block while paused, process one batch, sleep
    /// interruptibly. No new batch begins once shutdown is committed.
    async fn main_loop(&self) {
        let mut state_rx = self.inner.state_tx.subscribe();
        loop {
            if state_rx.wait_for(|state| *state != AgentState::Paused).await.is_err() {
                return;
            }
            if self.state().is_terminal() {
                return;
            }

            match self.inner.processor.process_batch().await {
                Ok(count) => {
                    if count > 0 {
                        self.inner.stats.lock().record_batch(count as u64);
                    }
                }
                Err(e) => {
                    // Batch errors never escape the loop.
                    error!(error = %e, "error processing batch");
                    self.inner.stats.lock().record_error();
                }
            }

            tokio::select! {
                _ = self.inner.shutdown.cancelled() => return,
                _ = tokio::time::sleep(self.inner.config.poll_interval) => {}
            }
        }
    }

    fn spawn_heartbeat(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let agent = self.clone();
        tokio::spawn(async move {
            loop {
                agent.apply_health();
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("heartbeat task cancelled");
                        return;
                    }
                    _ = tokio::time::sleep(agent.inner.config.heartbeat_interval) => {}
                }
            }
        })
    }

    /// Poll the local control file for textual commands, applying each
    /// change once.
    fn spawn_control_file_monitor(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let agent = self.clone();
        let path = agent.inner.config.control_file_path();
        tokio::spawn(async move {
            let mut last_text: Option<String> = None;
            loop {
                if let Ok(text) = tokio::fs::read_to_string(&path).await {
                    let text = text.trim().to_string();
                    if last_text.as_deref() != Some(&text) {
                        match text.parse::<ControlCommand>() {
                            Ok(command) => {
                                info!(command = %command, "control file command detected");
                                agent.apply_command(command).await;
                            }
                            Err(e) => warn!(error = %e, "control file has unknown command"),
                        }
                        last_text = Some(text);
                    }
                }
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("control file monitor cancelled");
                        return;
                    }
                    _ = tokio::time::sleep(agent.inner.config.control_file_interval) => {}
                }
            }
        })
    }

    /// Mirror the current state into the marker files.
    fn apply_health(&self) {
        let stats = self.stats();
        self.inner.health.apply(self.state(), &stats);
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
