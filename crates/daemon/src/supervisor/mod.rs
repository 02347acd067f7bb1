// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Crash-recovery supervisor.
//!
//! Runs named components, restarts them with exponential backoff up to a
//! configured budget, and trips the process-wide shutdown token the
//! moment any component is permanently unrecoverable. Restart accounting
//! is single-writer: only a component's own monitoring loop mutates it.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use drover_core::{BackoffPolicy, Clock, SystemClock};
use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Failure reported by a component's run function.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct ComponentError(pub String);

/// Boxed component future.
pub type ComponentFuture = Pin<Box<dyn Future<Output = Result<(), ComponentError>> + Send>>;

/// Factory producing a fresh run future per (re)start.
pub type ComponentFn = Arc<dyn Fn() -> ComponentFuture + Send + Sync>;

/// Supervisor errors.
#[derive(Debug, Clone, Error)]
pub enum SupervisorError {
    #[error("component {0:?} already registered")]
    DuplicateName(String),

    #[error("component {name:?} exceeded maximum restart attempts")]
    RestartsExhausted { name: String },
}

/// State of a supervised component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentState {
    Stopped,
    Starting,
    Running,
    Crashed,
    Restarting,
}

/// Snapshot of one component's counters.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentStats {
    pub name: String,
    pub state: ComponentState,
    pub restart_count: u32,
    pub crash_count: u32,
    pub last_crash_time: Option<DateTime<Utc>>,
    pub uptime_seconds: Option<f64>,
}

/// Restart limits for one component.
#[derive(Debug, Clone, Copy)]
pub struct RestartLimits {
    pub max_restarts: u32,
    pub backoff: BackoffPolicy,
}

impl RestartLimits {
    pub fn new(max_restarts: u32, max_backoff: Duration) -> Self {
        Self {
            max_restarts,
            backoff: BackoffPolicy::new(Duration::from_secs(1), 2.0, max_backoff),
        }
    }
}

struct ComponentRecord {
    state: ComponentState,
    restart_count: u32,
    crash_count: u32,
    last_crash_time: Option<DateTime<Utc>>,
    start_time: Option<Instant>,
}

/// A named long-running function with automatic restart on failure.
pub struct SupervisedComponent<C: Clock = SystemClock> {
    name: String,
    run_fn: ComponentFn,
    limits: RestartLimits,
    clock: C,
    record: Arc<Mutex<ComponentRecord>>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<C: Clock> SupervisedComponent<C> {
    pub fn with_clock(name: String, run_fn: ComponentFn, limits: RestartLimits, clock: C) -> Self {
        Self {
            name,
            run_fn,
            limits,
            clock,
            record: Arc::new(Mutex::new(ComponentRecord {
                state: ComponentState::Stopped,
                restart_count: 0,
                crash_count: 0,
                last_crash_time: None,
                start_time: None,
            })),
            cancel: CancellationToken::new(),
            task: Mutex::new(None),
        }
    }

    /// Start supervision. Terminal outcomes (clean exit or restart budget
    /// exhaustion) are reported on `outcome_tx`.
    pub fn start(self: &Arc<Self>, outcome_tx: mpsc::Sender<Result<String, SupervisorError>>) {
        let mut guard = self.task.lock();
        if guard.is_some() {
            warn!(component = %self.name, "already started");
            return;
        }
        info!(component = %self.name, "starting supervision");
        let this = Arc::clone(self);
        *guard = Some(tokio::spawn(async move {
            let outcome = this.run_with_monitoring().await;
            if let Err(e) = &outcome {
                error!(component = %this.name, error = %e, "permanently failed");
            }
            let _ = outcome_tx.send(outcome.map(|_| this.name.clone())).await;
        }));
    }

    /// Crash-monitoring loop: run, account, back off, retry.
    async fn run_with_monitoring(&self) -> Result<(), SupervisorError> {
        let mut backoff = self.limits.backoff.start();

        loop {
            let attempt = self.record.lock().restart_count + 1;
            info!(component = %self.name, attempt, "starting");
            {
                let mut record = self.record.lock();
                record.state = ComponentState::Starting;
                record.start_time = Some(self.clock.now());
                record.state = ComponentState::Running;
            }

            let result = tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!(component = %self.name, "cancelled, shutting down");
                    self.record.lock().state = ComponentState::Stopped;
                    return Ok(());
                }
                result = (self.run_fn)() => result,
            };

            match result {
                Ok(()) => {
                    info!(component = %self.name, "exited normally");
                    self.record.lock().state = ComponentState::Stopped;
                    return Ok(());
                }
                Err(e) => {
                    let (crash_count, restart_count, uptime) = {
                        let mut record = self.record.lock();
                        record.crash_count += 1;
                        record.last_crash_time = Some(self.clock.utc_now());
                        record.state = ComponentState::Crashed;
                        let uptime = record
                            .start_time
                            .map(|t| self.clock.now().duration_since(t))
                            .unwrap_or_default();
                        (record.crash_count, record.restart_count, uptime)
                    };
                    error!(
                        component = %self.name,
                        crash = crash_count,
                        uptime_secs = uptime.as_secs_f64(),
                        error = %e,
                        "crashed"
                    );

                    if restart_count >= self.limits.max_restarts {
                        error!(
                            component = %self.name,
                            max_restarts = self.limits.max_restarts,
                            "maximum restart attempts reached"
                        );
                        self.record.lock().state = ComponentState::Stopped;
                        return Err(SupervisorError::RestartsExhausted {
                            name: self.name.clone(),
                        });
                    }

                    let wait = backoff.next_delay();
                    info!(
                        component = %self.name,
                        wait_secs = wait.as_secs_f64(),
                        restart = restart_count + 1,
                        max_restarts = self.limits.max_restarts,
                        "restarting after backoff"
                    );
                    self.record.lock().state = ComponentState::Restarting;

                    // A stop during the backoff wait short-circuits without
                    // restarting.
                    tokio::select! {
                        _ = self.cancel.cancelled() => {
                            info!(component = %self.name, "stop requested during restart backoff");
                            self.record.lock().state = ComponentState::Stopped;
                            return Ok(());
                        }
                        _ = tokio::time::sleep(wait) => {}
                    }

                    self.record.lock().restart_count += 1;
                }
            }
        }
    }

    /// Cancel the in-flight run and wait until the component is fully
    /// stopped.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                error!(component = %self.name, error = %e, "error during stop");
            }
        }
        self.record.lock().state = ComponentState::Stopped;
        info!(component = %self.name, "stopped");
    }

    pub fn get_stats(&self) -> ComponentStats {
        let record = self.record.lock();
        let uptime = match record.state {
            ComponentState::Running => record
                .start_time
                .map(|t| self.clock.now().duration_since(t).as_secs_f64()),
            _ => None,
        };
        ComponentStats {
            name: self.name.clone(),
            state: record.state,
            restart_count: record.restart_count,
            crash_count: record.crash_count,
            last_crash_time: record.last_crash_time,
            uptime_seconds: uptime,
        }
    }
}

/// Supervisor for a set of named components.
pub struct Supervisor<C: Clock = SystemClock> {
    components: BTreeMap<String, Arc<SupervisedComponent<C>>>,
    clock: C,
    shutdown: CancellationToken,
    monitor_cancel: CancellationToken,
    monitor_task: Option<JoinHandle<()>>,
}

impl Supervisor<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for Supervisor<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> Supervisor<C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            components: BTreeMap::new(),
            clock,
            shutdown: CancellationToken::new(),
            monitor_cancel: CancellationToken::new(),
            monitor_task: None,
        }
    }

    /// Token cancelled when any component fails permanently.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Register a uniquely named component.
    pub fn add_component(
        &mut self,
        name: &str,
        run_fn: ComponentFn,
        limits: RestartLimits,
    ) -> Result<(), SupervisorError> {
        if self.components.contains_key(name) {
            return Err(SupervisorError::DuplicateName(name.to_string()));
        }
        let component = Arc::new(SupervisedComponent::with_clock(
            name.to_string(),
            run_fn,
            limits,
            self.clock.clone(),
        ));
        self.components.insert(name.to_string(), component);
        info!(component = name, "registered");
        Ok(())
    }

    /// Start every component and the monitor loop.
    ///
    /// The monitor trips the shutdown token on the first restart-budget
    /// exhaustion; it does not wait for the other components.
    pub fn start_all(&mut self) {
        info!(count = self.components.len(), "starting all supervised components");
        let (outcome_tx, mut outcome_rx) = mpsc::channel(self.components.len().max(1));
        for component in self.components.values() {
            component.start(outcome_tx.clone());
        }
        drop(outcome_tx);

        let shutdown = self.shutdown.clone();
        let monitor_cancel = self.monitor_cancel.clone();
        self.monitor_task = Some(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = monitor_cancel.cancelled() => return,
                    outcome = outcome_rx.recv() => match outcome {
                        Some(Ok(name)) => {
                            info!(component = %name, "component completed");
                        }
                        Some(Err(e)) => {
                            error!(error = %e, "component failed permanently, shutting down");
                            shutdown.cancel();
                            return;
                        }
                        None => return,
                    }
                }
            }
        }));
    }

    /// Cancel the monitor, then stop every component concurrently.
    /// Individual stop failures do not block the others.
    pub async fn stop_all(&mut self) {
        info!("stopping all supervised components");
        self.monitor_cancel.cancel();
        if let Some(task) = self.monitor_task.take() {
            let _ = task.await;
        }

        let stops: Vec<_> = self
            .components
            .values()
            .map(|component| {
                let component = Arc::clone(component);
                tokio::spawn(async move { component.stop().await })
            })
            .collect();
        for stop in stops {
            if let Err(e) = stop.await {
                error!(error = %e, "component stop task failed");
            }
        }
    }

    /// Snapshot of every component's counters, for final reporting.
    pub fn get_all_stats(&self) -> BTreeMap<String, ComponentStats> {
        self.components
            .iter()
            .map(|(name, component)| (name.clone(), component.get_stats()))
            .collect()
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
