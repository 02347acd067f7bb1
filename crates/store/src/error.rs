// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Store error taxonomy.

use thiserror::Error;

/// Errors from the command store.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Transport-level failure; recoverable with retry.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The deployment topology cannot deliver push notifications.
    /// Callers fall back to polling.
    #[error("push notifications not supported by this deployment")]
    PushUnsupported,

    /// The command record was never created.
    #[error("command record not initialized")]
    NotInitialized,
}
