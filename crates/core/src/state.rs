// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent lifecycle state machine.
//!
//! Exactly one canonical [`AgentState`] exists at any time, owned by the
//! agent lifecycle. Every control source (signal, control file, socket,
//! cluster command) funnels into the same three transitions.

use serde::{Deserialize, Serialize};

/// Operational state of the agent.
///
/// `Running <-> Paused` toggles; `Stopping -> Stopped` is terminal and
/// irreversible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentState {
    Running,
    Paused,
    Stopping,
    Stopped,
}

impl AgentState {
    /// Whether the agent has committed to shutting down.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AgentState::Stopping | AgentState::Stopped)
    }

    /// Whether a `pause` transition is valid from this state.
    pub fn can_pause(&self) -> bool {
        matches!(self, AgentState::Running)
    }

    /// Whether a `resume` transition is valid from this state.
    pub fn can_resume(&self) -> bool {
        matches!(self, AgentState::Paused)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentState::Running => "running",
            AgentState::Paused => "paused",
            AgentState::Stopping => "stopping",
            AgentState::Stopped => "stopped",
        }
    }
}

impl std::fmt::Display for AgentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Advisory health markers derived from the agent state.
///
/// Liveness means "process alive and responsive"; readiness means
/// "actively processing" (state == Running). The file I/O that mirrors
/// these into marker files is a thin sink in the daemon crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthMarkers {
    pub liveness: bool,
    pub readiness: bool,
}

/// Pure mapping from state to health markers.
pub fn derive_health(state: AgentState) -> HealthMarkers {
    HealthMarkers {
        liveness: !matches!(state, AgentState::Stopped),
        readiness: matches!(state, AgentState::Running),
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
