// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use drover_core::ControlCommand;
use serde::{Deserialize, Serialize};

/// Request from an operator client to the daemon
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Request {
    /// Health check ping
    Ping,

    /// Liveness probe: is the process alive
    Health,

    /// Readiness probe: is the agent accepting work
    Readiness,

    /// Pause batch processing on this instance
    Pause,

    /// Resume batch processing on this instance
    Resume,

    /// Request graceful shutdown of this instance
    Shutdown,

    /// Processing counters and component state
    Stats,

    /// Set the cluster-wide command for every instance
    ClusterCommand {
        command: ControlCommand,
        #[serde(default)]
        reason: String,
        #[serde(default)]
        updated_by: String,
    },

    /// Read the current cluster command record
    ClusterState,
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
