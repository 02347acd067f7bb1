// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::config::Config;
use crate::control::ControlCoordinator;
use drover_core::{AgentStats, ControlCommand};
use drover_store::{CommandStore, MemoryBatchProcessor, MemoryCommandStore};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::UnixStream;

fn test_config(dir: &TempDir) -> Config {
    Config {
        store_uri: "mem://local".to_string(),
        store_database: "drover".to_string(),
        store_collection: "agent_control".to_string(),
        poll_interval: Duration::from_secs(1),
        batch_size: 100,
        heartbeat_interval: Duration::from_secs(1),
        shutdown_timeout: Duration::from_secs(30),
        enable_distributed_control: true,
        enable_push: true,
        control_poll_interval: Duration::from_secs(1),
        control_file_interval: Duration::from_secs(1),
        max_component_restarts: 10,
        restart_backoff_max: Duration::from_secs(60),
        state_dir: dir.path().to_path_buf(),
        log_filter: "info".to_string(),
    }
}

struct Harness {
    agent: Agent,
    socket: PathBuf,
    cancel: CancellationToken,
    _dir: TempDir,
}

async fn start_listener(coordinator: Option<Arc<ControlCoordinator>>) -> Harness {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let socket = config.socket_path();
    let agent = Agent::new(config, Arc::new(MemoryBatchProcessor::new(10)), coordinator);

    let listener = Listener::bind(socket.clone(), agent.clone()).unwrap();
    let cancel = CancellationToken::new();
    let run_cancel = cancel.clone();
    tokio::spawn(async move { listener.run(run_cancel).await });

    Harness { agent, socket, cancel, _dir: dir }
}

async fn roundtrip(socket: &PathBuf, request: Request) -> Response {
    let mut stream = UnixStream::connect(socket).await.unwrap();
    let payload = protocol::encode(&request).unwrap();
    protocol::write_message(&mut stream, &payload).await.unwrap();
    let payload = protocol::read_message(&mut stream).await.unwrap();
    protocol::decode(&payload).unwrap()
}

#[tokio::test]
async fn ping_pong() {
    let harness = start_listener(None).await;
    assert_eq!(roundtrip(&harness.socket, Request::Ping).await, Response::Pong);
    harness.cancel.cancel();
}

#[tokio::test]
async fn pause_resume_and_precondition_rejection() {
    let harness = start_listener(None).await;

    assert_eq!(roundtrip(&harness.socket, Request::Pause).await, Response::Ok);
    assert_eq!(harness.agent.state(), AgentState::Paused);

    match roundtrip(&harness.socket, Request::Pause).await {
        Response::Rejected { message } => assert!(message.contains("paused")),
        other => panic!("expected Rejected, got {other:?}"),
    }

    assert_eq!(roundtrip(&harness.socket, Request::Resume).await, Response::Ok);
    assert_eq!(harness.agent.state(), AgentState::Running);

    harness.cancel.cancel();
}

#[tokio::test]
async fn readiness_follows_state() {
    let harness = start_listener(None).await;

    match roundtrip(&harness.socket, Request::Readiness).await {
        Response::Readiness { ready, state } => {
            assert!(ready);
            assert_eq!(state, AgentState::Running);
        }
        other => panic!("expected Readiness, got {other:?}"),
    }

    harness.agent.pause();
    match roundtrip(&harness.socket, Request::Readiness).await {
        Response::Readiness { ready, state } => {
            assert!(!ready);
            assert_eq!(state, AgentState::Paused);
        }
        other => panic!("expected Readiness, got {other:?}"),
    }

    harness.cancel.cancel();
}

#[tokio::test]
async fn shutdown_is_accepted_and_idempotent() {
    let harness = start_listener(None).await;

    assert_eq!(roundtrip(&harness.socket, Request::Shutdown).await, Response::ShuttingDown);
    assert_eq!(harness.agent.state(), AgentState::Stopping);

    // A second shutdown is still acknowledged.
    assert_eq!(roundtrip(&harness.socket, Request::Shutdown).await, Response::ShuttingDown);

    match roundtrip(&harness.socket, Request::Health).await {
        Response::Health { live, .. } => assert!(live, "stopping is still live"),
        other => panic!("expected Health, got {other:?}"),
    }

    harness.cancel.cancel();
}

#[tokio::test]
async fn stats_without_coordinator_has_no_control_section() {
    let harness = start_listener(None).await;

    match roundtrip(&harness.socket, Request::Stats).await {
        Response::Stats { state, stats, control, .. } => {
            assert_eq!(state, AgentState::Running);
            assert_eq!(stats, AgentStats::default());
            assert!(control.is_none());
        }
        other => panic!("expected Stats, got {other:?}"),
    }

    harness.cancel.cancel();
}

#[tokio::test]
async fn cluster_command_without_coordinator_is_rejected() {
    let harness = start_listener(None).await;

    match roundtrip(
        &harness.socket,
        Request::ClusterCommand {
            command: ControlCommand::Pause,
            reason: String::new(),
            updated_by: String::new(),
        },
    )
    .await
    {
        Response::Rejected { message } => assert!(message.contains("disabled")),
        other => panic!("expected Rejected, got {other:?}"),
    }

    harness.cancel.cancel();
}

#[tokio::test]
async fn cluster_command_bumps_version_and_reports_propagation() {
    let store: Arc<dyn CommandStore> = Arc::new(MemoryCommandStore::replicated());
    let coordinator = Arc::new(ControlCoordinator::new(store, Duration::from_secs(10), true));
    coordinator.initialize().await.unwrap();

    let harness = start_listener(Some(coordinator)).await;

    match roundtrip(
        &harness.socket,
        Request::ClusterCommand {
            command: ControlCommand::Pause,
            reason: "drain".to_string(),
            updated_by: "ops".to_string(),
        },
    )
    .await
    {
        Response::ClusterAccepted { record, propagation_secs } => {
            assert_eq!(record.command, ControlCommand::Pause);
            assert_eq!(record.version, 2);
            assert!(propagation_secs >= 1);
        }
        other => panic!("expected ClusterAccepted, got {other:?}"),
    }

    match roundtrip(&harness.socket, Request::ClusterState).await {
        Response::ClusterState { control } => {
            let record = control.current.expect("record should exist");
            assert_eq!(record.version, 2);
        }
        other => panic!("expected ClusterState, got {other:?}"),
    }

    harness.cancel.cancel();
}

#[tokio::test]
async fn cluster_command_store_outage_maps_to_unavailable() {
    let store = Arc::new(MemoryCommandStore::replicated());
    let coordinator = Arc::new(ControlCoordinator::new(
        Arc::clone(&store) as Arc<dyn CommandStore>,
        Duration::from_secs(10),
        true,
    ));
    coordinator.initialize().await.unwrap();
    store.set_unavailable(true);

    let harness = start_listener(Some(coordinator)).await;

    match roundtrip(
        &harness.socket,
        Request::ClusterCommand {
            command: ControlCommand::Shutdown,
            reason: String::new(),
            updated_by: String::new(),
        },
    )
    .await
    {
        Response::Unavailable { .. } => {}
        other => panic!("expected Unavailable, got {other:?}"),
    }

    harness.cancel.cancel();
}
