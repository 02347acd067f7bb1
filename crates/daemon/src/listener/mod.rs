// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Listener task for the control socket.
//!
//! Accepts connections on a Unix socket and handles each in a spawned
//! task, one request/response exchange per connection. Handlers only
//! call into the agent handle; they never touch lifecycle internals.

use std::path::PathBuf;

use drover_core::AgentState;
use drover_store::StoreError;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::UnixListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::lifecycle::Agent;
use crate::protocol::{self, ProtocolError, Request, Response};

/// Errors from binding the control socket.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("failed to bind control socket at {path}: {source}")]
    Bind {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Listener for the control socket.
pub struct Listener {
    unix: UnixListener,
    path: PathBuf,
    agent: Agent,
}

impl Listener {
    /// Bind the control socket, replacing any stale file from a previous
    /// run.
    pub fn bind(path: PathBuf, agent: Agent) -> Result<Self, ListenerError> {
        if path.exists() {
            let _ = std::fs::remove_file(&path);
        }
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let unix = UnixListener::bind(&path)
            .map_err(|source| ListenerError::Bind { path: path.clone(), source })?;
        info!(path = %path.display(), "control socket bound");
        Ok(Self { unix, path, agent })
    }

    /// Accept connections until cancelled, spawning a task per
    /// connection. The socket file is removed on exit.
    pub async fn run(self, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("control socket listener stopping");
                    let _ = std::fs::remove_file(&self.path);
                    return;
                }
                result = self.unix.accept() => match result {
                    Ok((stream, _)) => {
                        let agent = self.agent.clone();
                        tokio::spawn(async move {
                            let (reader, writer) = stream.into_split();
                            if let Err(e) = handle_connection(reader, writer, &agent).await {
                                log_connection_error(e);
                            }
                        });
                    }
                    Err(e) => error!(error = %e, "accept error"),
                }
            }
        }
    }
}

fn log_connection_error(e: ProtocolError) {
    match &e {
        ProtocolError::Io(io) if io.kind() == std::io::ErrorKind::UnexpectedEof => {
            debug!("client disconnected")
        }
        _ => error!(error = %e, "connection error"),
    }
}

/// Handle a single client connection: one request, one response.
async fn handle_connection<R, W>(
    mut reader: R,
    mut writer: W,
    agent: &Agent,
) -> Result<(), ProtocolError>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    let request = protocol::read_request(&mut reader).await?;
    info!(request = ?request, "received request");

    let response = handle_request(request, agent).await;
    debug!(response = ?response, "sending response");
    protocol::write_response(&mut writer, &response).await
}

async fn handle_request(request: Request, agent: &Agent) -> Response {
    match request {
        Request::Ping => Response::Pong,

        Request::Health => {
            let state = agent.state();
            Response::Health {
                state,
                live: state != AgentState::Stopped,
                uptime_secs: agent.uptime().as_secs(),
            }
        }

        Request::Readiness => {
            let state = agent.state();
            Response::Readiness { state, ready: state == AgentState::Running }
        }

        Request::Pause => {
            if agent.pause() {
                Response::Ok
            } else {
                Response::Rejected {
                    message: format!("cannot pause from state {}", agent.state()),
                }
            }
        }

        Request::Resume => {
            if agent.resume() {
                Response::Ok
            } else {
                Response::Rejected {
                    message: format!("cannot resume from state {}", agent.state()),
                }
            }
        }

        Request::Shutdown => {
            // Accepted even when already stopping; shutdown is idempotent.
            agent.shutdown().await;
            Response::ShuttingDown
        }

        Request::Stats => {
            let control = match agent.coordinator() {
                Some(coordinator) => Some(coordinator.stats().await),
                None => None,
            };
            Response::Stats {
                state: agent.state(),
                uptime_secs: agent.uptime().as_secs(),
                stats: agent.stats(),
                control,
            }
        }

        Request::ClusterCommand { command, reason, updated_by } => {
            let Some(coordinator) = agent.coordinator() else {
                return Response::Rejected {
                    message: "distributed control is disabled".to_string(),
                };
            };
            match coordinator.set_global_command(command, &reason, &updated_by).await {
                Ok(record) => Response::ClusterAccepted {
                    record,
                    propagation_secs: coordinator.propagation_estimate().as_secs(),
                },
                Err(StoreError::Unavailable(message)) => Response::Unavailable { message },
                Err(e) => Response::Error { message: e.to_string() },
            }
        }

        Request::ClusterState => {
            let Some(coordinator) = agent.coordinator() else {
                return Response::Rejected {
                    message: "distributed control is disabled".to_string(),
                };
            };
            Response::ClusterState { control: coordinator.stats().await }
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
