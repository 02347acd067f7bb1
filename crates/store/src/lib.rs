// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! drover-store: collaborator seams for the drover daemon.
//!
//! The daemon's control plane only needs two capabilities from the outside
//! world: a versioned command record it can read, atomically bump, and
//! watch ([`CommandStore`]), and an opaque batch processor it can drive
//! from the poll loop ([`BatchProcessor`]). Both are traits here, with
//! in-memory implementations used by tests and single-process deployments.

pub mod batch;
pub mod command_store;
pub mod error;
pub mod memory;

pub use batch::{BatchError, BatchProcessor, MemoryBatchProcessor, PendingItem};
pub use command_store::{CommandFeed, CommandStore};
pub use error::StoreError;
pub use memory::MemoryCommandStore;
