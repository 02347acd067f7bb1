// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cluster control command and its versioned record.
//!
//! `ControlCommand` is the one closed enum shared by every control source;
//! [`ControlCommand::from_str`] is the single canonical mapping from raw
//! text, replacing ad hoc string comparisons at each surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// The cluster-wide directive all agent instances converge on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlCommand {
    Running,
    Pause,
    Shutdown,
}

impl ControlCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlCommand::Running => "running",
            ControlCommand::Pause => "pause",
            ControlCommand::Shutdown => "shutdown",
        }
    }
}

impl std::fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognized control command text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown control command: {0:?}")]
pub struct ParseCommandError(pub String);

impl FromStr for ControlCommand {
    type Err = ParseCommandError;

    /// Canonical text mapping. `resume` is accepted as an alias for
    /// `running` so the local control file can use either word.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "running" | "resume" => Ok(ControlCommand::Running),
            "pause" => Ok(ControlCommand::Pause),
            "shutdown" => Ok(ControlCommand::Shutdown),
            other => Err(ParseCommandError(other.to_string())),
        }
    }
}

/// The single durable record all instances of the cluster share.
///
/// `version` strictly increases on every write; readers must never apply a
/// record whose version is <= the last version they observed. Field names
/// are a stable cross-process contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRecord {
    pub command: ControlCommand,
    pub version: u64,
    pub timestamp: DateTime<Utc>,
    pub reason: String,
    pub updated_by: String,
}

impl CommandRecord {
    /// The record written once per cluster when none exists yet.
    pub fn initial(now: DateTime<Utc>) -> Self {
        Self {
            command: ControlCommand::Running,
            version: 1,
            timestamp: now,
            reason: "initial state".to_string(),
            updated_by: "system".to_string(),
        }
    }
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
