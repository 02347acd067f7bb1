// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use drover_core::{AgentState, AgentStats, CommandRecord};
use serde::{Deserialize, Serialize};

use crate::control::ControlStats;

/// Response from daemon to an operator client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Response {
    /// Health check response
    Pong,

    /// Transition applied
    Ok,

    /// Request valid but not applicable in the current state
    Rejected { message: String },

    /// Shutdown accepted; completion happens asynchronously
    ShuttingDown,

    /// Liveness: true for every non-stopped state
    Health { state: AgentState, live: bool, uptime_secs: u64 },

    /// Readiness: true only while actively processing
    Readiness { state: AgentState, ready: bool },

    /// Processing counters
    Stats {
        state: AgentState,
        uptime_secs: u64,
        stats: AgentStats,
        control: Option<ControlStats>,
    },

    /// Cluster command recorded; propagation happens asynchronously
    ClusterAccepted { record: CommandRecord, propagation_secs: u64 },

    /// Current cluster control record and watch mode
    ClusterState { control: ControlStats },

    /// Backing store unreachable
    Unavailable { message: String },

    /// Internal error
    Error { message: String },
}

#[cfg(test)]
#[path = "response_tests.rs"]
mod tests;
