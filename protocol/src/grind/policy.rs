//! Grind loop pacing.
//!
//! None of these numbers matter for correctness. They exist to keep a
//! public RPC endpoint from deciding we are a denial-of-service attack, and
//! to give the blockhash time to actually move (it only changes every slot
//! or so, and an unchanged blockhash means an identical signature).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::{
    DEFAULT_ATTEMPT_BUDGET, DEFAULT_ATTEMPT_DELAY, DEFAULT_SLOW_DOWN_DELAY,
    DEFAULT_SLOW_DOWN_EVERY, DEFAULT_TRANSIENT_DELAY, DEFAULT_TRANSIENT_RETRY_BUDGET,
};

/// Tunable parameters for the grind loop.
///
/// Defaults: 100 attempts, 10 ms between attempts, 500 ms after every 10th
/// rejection, 1 s after a transient gateway failure, at most 100 transient
/// failures per run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrindPolicy {
    /// Maximum number of build-sign-evaluate cycles. Transient build
    /// failures don't count.
    pub attempt_budget: u32,

    /// Pause after a rejected attempt, in milliseconds.
    pub attempt_delay_ms: u64,

    /// Longer pause taken instead of `attempt_delay_ms` after every
    /// `slow_down_every`-th rejection.
    pub slow_down_delay_ms: u64,

    /// Period of the longer pause. 0 disables it.
    pub slow_down_every: u32,

    /// Pause after a transient gateway failure, in milliseconds.
    pub transient_delay_ms: u64,

    /// How many transient failures a single run tolerates before giving up
    /// as exhausted. Keeps a dead endpoint from pinning the loop forever.
    pub transient_retry_budget: u32,
}

impl Default for GrindPolicy {
    fn default() -> Self {
        Self {
            attempt_budget: DEFAULT_ATTEMPT_BUDGET,
            attempt_delay_ms: DEFAULT_ATTEMPT_DELAY.as_millis() as u64,
            slow_down_delay_ms: DEFAULT_SLOW_DOWN_DELAY.as_millis() as u64,
            slow_down_every: DEFAULT_SLOW_DOWN_EVERY,
            transient_delay_ms: DEFAULT_TRANSIENT_DELAY.as_millis() as u64,
            transient_retry_budget: DEFAULT_TRANSIENT_RETRY_BUDGET,
        }
    }
}

impl GrindPolicy {
    pub fn with_attempt_budget(mut self, attempt_budget: u32) -> Self {
        self.attempt_budget = attempt_budget;
        self
    }

    pub fn with_attempt_delay(mut self, delay: Duration) -> Self {
        self.attempt_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn with_slow_down(mut self, every: u32, delay: Duration) -> Self {
        self.slow_down_every = every;
        self.slow_down_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn with_transient_delay(mut self, delay: Duration) -> Self {
        self.transient_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn with_transient_retry_budget(mut self, budget: u32) -> Self {
        self.transient_retry_budget = budget;
        self
    }

    /// No pauses at all. Handy against an in-memory gateway.
    pub fn no_delays(self) -> Self {
        Self {
            attempt_delay_ms: 0,
            slow_down_delay_ms: 0,
            transient_delay_ms: 0,
            ..self
        }
    }

    pub fn transient_delay(&self) -> Duration {
        Duration::from_millis(self.transient_delay_ms)
    }

    /// The pause after the `rejections`-th rejected attempt (1-based).
    pub fn delay_after_rejection(&self, rejections: u32) -> Duration {
        let slow = self.slow_down_every > 0 && rejections > 0 && rejections % self.slow_down_every == 0;
        Duration::from_millis(if slow {
            self.slow_down_delay_ms
        } else {
            self.attempt_delay_ms
        })
    }
}
