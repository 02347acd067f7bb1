// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! drover-daemon: the drover worker daemon.
//!
//! Three subsystems form the control plane: the agent lifecycle state
//! machine ([`lifecycle`]), the distributed control coordinator
//! ([`control`]), and the crash-recovery supervisor ([`supervisor`]).
//! The [`listener`] exposes the control surface over a Unix socket using
//! the [`protocol`] wire format.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod config;
pub mod control;
pub mod health;
pub mod lifecycle;
pub mod listener;
pub mod protocol;
pub mod supervisor;

pub use config::{Config, ConfigError};
pub use control::{ControlCoordinator, ControlStats, WatchMode};
pub use lifecycle::{Agent, AgentError};
pub use listener::{Listener, ListenerError};
pub use protocol::{Request, Response};
