// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! drover-core: domain types for the drover worker daemon.
//!
//! Everything here is pure and transport-free: the agent state machine,
//! the cluster control command and its versioned record, the shared
//! backoff policy, and the clock abstraction.

pub mod backoff;
pub mod clock;
pub mod command;
pub mod state;
pub mod stats;

pub use backoff::{Backoff, BackoffPolicy};
pub use clock::{Clock, ManualClock, SystemClock};
pub use command::{CommandRecord, ControlCommand, ParseCommandError};
pub use state::{derive_health, AgentState, HealthMarkers};
pub use stats::AgentStats;
