// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reusable exponential backoff policy.
//!
//! One policy serves both the control coordinator's transport retries and
//! the supervisor's restart delays, instead of each carrying its own
//! inline sleep loop.

use std::time::Duration;

/// Immutable backoff parameters: initial delay, growth factor, cap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    pub initial: Duration,
    pub multiplier: f64,
    pub cap: Duration,
}

impl BackoffPolicy {
    pub const fn new(initial: Duration, multiplier: f64, cap: Duration) -> Self {
        Self { initial, multiplier, cap }
    }

    /// Transport retry discipline: 1s doubling to a 30s cap.
    pub const fn transport() -> Self {
        Self::new(Duration::from_secs(1), 2.0, Duration::from_secs(30))
    }

    /// Fresh stateful backoff starting at the initial delay.
    pub fn start(&self) -> Backoff {
        Backoff { policy: *self, current: self.initial }
    }
}

/// Stateful backoff derived from a [`BackoffPolicy`].
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: BackoffPolicy,
    current: Duration,
}

impl Backoff {
    /// Delay to wait now; advances the internal state for the next failure.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current.min(self.policy.cap);
        let grown = self.current.as_secs_f64() * self.policy.multiplier;
        self.current = Duration::from_secs_f64(grown).min(self.policy.cap);
        delay
    }

    /// Reset after a success so the next failure starts from the initial delay.
    pub fn reset(&mut self) {
        self.current = self.policy.initial;
    }
}

#[cfg(test)]
#[path = "backoff_tests.rs"]
mod tests;
