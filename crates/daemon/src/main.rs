// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! droverd: supervised worker agent daemon.
//!
//! Startup order: config, logging, store, coordinator, agent, control
//! socket, supervisor. Signals and the control surfaces all converge on
//! the agent handle; the process exits once the agent reports Stopped.

use std::process::ExitCode;
use std::sync::Arc;

use drover_daemon::supervisor::{
    ComponentError, ComponentFn, ComponentFuture, RestartLimits, Supervisor, SupervisorError,
};
use drover_daemon::{Agent, Config, ControlCoordinator, Listener, ListenerError};
use drover_store::{BatchProcessor, CommandStore, MemoryBatchProcessor, MemoryCommandStore};
use thiserror::Error;
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error)]
enum DaemonError {
    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error(transparent)]
    Supervisor(#[from] SupervisorError),

    #[error("failed to install signal handler: {0}")]
    Signal(#[from] std::io::Error),

    #[error("a supervised component failed permanently")]
    ComponentFailure,
}

fn main() -> ExitCode {
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("droverd: {e}");
            return ExitCode::FAILURE;
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.log_filter))
        .init();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "failed to start tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "daemon failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> Result<(), DaemonError> {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        store_uri = %config.store_uri,
        state_dir = %config.state_dir.display(),
        "starting droverd"
    );

    let processor: Arc<dyn BatchProcessor> = Arc::new(MemoryBatchProcessor::new(config.batch_size));

    let coordinator = if config.enable_distributed_control {
        let store: Arc<dyn CommandStore> = Arc::new(MemoryCommandStore::replicated());
        Some(Arc::new(ControlCoordinator::new(
            store,
            config.control_poll_interval,
            config.enable_push,
        )))
    } else {
        info!("distributed control disabled by configuration");
        None
    };

    let agent = Agent::new(config.clone(), processor, coordinator);

    let mut supervisor = Supervisor::new();
    let limits = RestartLimits::new(config.max_component_restarts, config.restart_backoff_max);

    let agent_component: ComponentFn = {
        let agent = agent.clone();
        Arc::new(move || {
            let agent = agent.clone();
            Box::pin(async move {
                agent.run().await.map_err(|e| ComponentError(e.to_string()))
            }) as ComponentFuture
        })
    };
    supervisor.add_component("agent", agent_component, limits)?;

    // Probe the socket path up front so a permanently unusable path
    // fails startup instead of burning the restart budget.
    drop(Listener::bind(config.socket_path(), agent.clone())?);

    let listener_cancel = CancellationToken::new();
    let listener_component: ComponentFn = {
        let agent = agent.clone();
        let socket_path = config.socket_path();
        let cancel = listener_cancel.clone();
        Arc::new(move || {
            let agent = agent.clone();
            let socket_path = socket_path.clone();
            let cancel = cancel.clone();
            Box::pin(async move {
                let listener = Listener::bind(socket_path, agent)
                    .map_err(|e| ComponentError(e.to_string()))?;
                listener.run(cancel).await;
                Ok(())
            }) as ComponentFuture
        })
    };
    supervisor.add_component("listener", listener_component, limits)?;

    spawn_signal_handler(agent.clone())?;

    let fatal = supervisor.shutdown_token();
    supervisor.start_all();

    let mut failed = false;
    tokio::select! {
        _ = agent.wait_stopped() => {
            info!("agent stopped");
        }
        _ = fatal.cancelled() => {
            failed = true;
            warn!("component failed permanently, shutting down");
            agent.shutdown().await;
            if tokio::time::timeout(config.shutdown_timeout, agent.wait_stopped())
                .await
                .is_err()
            {
                error!(
                    timeout_secs = config.shutdown_timeout.as_secs(),
                    "graceful shutdown timed out"
                );
            }
        }
    }

    listener_cancel.cancel();
    supervisor.stop_all().await;

    for (name, stats) in supervisor.get_all_stats() {
        info!(
            component = %name,
            restarts = stats.restart_count,
            crashes = stats.crash_count,
            "component final state"
        );
    }
    if failed {
        return Err(DaemonError::ComponentFailure);
    }
    info!("droverd exited");
    Ok(())
}

/// SIGTERM/SIGINT request graceful shutdown; SIGUSR1 pauses and SIGUSR2
/// resumes, mirroring the control socket verbs.
fn spawn_signal_handler(agent: Agent) -> Result<(), DaemonError> {
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigusr1 = signal(SignalKind::user_defined1())?;
    let mut sigusr2 = signal(SignalKind::user_defined2())?;

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = sigterm.recv() => {
                    info!("received SIGTERM");
                    agent.shutdown().await;
                }
                _ = sigint.recv() => {
                    info!("received SIGINT");
                    agent.shutdown().await;
                }
                _ = sigusr1.recv() => {
                    info!("received SIGUSR1");
                    agent.pause();
                }
                _ = sigusr2.recv() => {
                    info!("received SIGUSR2");
                    agent.resume();
                }
            }
        }
    });
    Ok(())
}
