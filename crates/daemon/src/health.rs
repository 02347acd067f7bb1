// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Health marker file sink.
//!
//! Marker presence is the contract: liveness file exists while the
//! process is alive, readiness file exists only while the state is
//! Running. The mapping from state to markers is the pure
//! [`drover_core::derive_health`]; this module is only the file I/O.
//! Marker writes are advisory, so I/O failures are logged and absorbed.

use std::path::PathBuf;

use chrono::Utc;
use drover_core::{derive_health, AgentState, AgentStats};

/// Writes and removes the liveness/readiness marker files.
pub struct HealthFiles {
    liveness: PathBuf,
    readiness: PathBuf,
}

impl HealthFiles {
    pub fn new(liveness: PathBuf, readiness: PathBuf) -> Self {
        if let Some(dir) = liveness.parent() {
            if let Err(e) = std::fs::create_dir_all(dir) {
                tracing::error!(dir = %dir.display(), error = %e, "failed to create health dir");
            }
        }
        Self { liveness, readiness }
    }

    /// Mirror the given state (and counters) into the marker files.
    pub fn apply(&self, state: AgentState, stats: &AgentStats) {
        let markers = derive_health(state);

        if markers.liveness {
            let body = format!(
                "{}\n{}\nbatches={}\ndocuments={}\nerrors={}\n",
                state,
                Utc::now().to_rfc3339(),
                stats.batches_processed,
                stats.documents_processed,
                stats.errors,
            );
            self.write(&self.liveness, &body);
        } else {
            self.remove(&self.liveness);
        }

        if markers.readiness {
            let body = format!("{}\n{}\n", state, Utc::now().to_rfc3339());
            self.write(&self.readiness, &body);
        } else {
            self.remove(&self.readiness);
        }
    }

    /// Remove both markers during final cleanup.
    pub fn clear(&self) {
        self.remove(&self.liveness);
        self.remove(&self.readiness);
    }

    fn write(&self, path: &PathBuf, body: &str) {
        if let Err(e) = std::fs::write(path, body) {
            tracing::error!(path = %path.display(), error = %e, "failed to write marker");
        }
    }

    fn remove(&self, path: &PathBuf) {
        match std::fs::remove_file(path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "failed to remove marker")
            }
        }
    }
}

#[cfg(test)]
#[path = "health_tests.rs"]
mod tests;
