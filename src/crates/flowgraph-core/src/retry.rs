//! Retry policies - exponential backoff for transient failures
//!
//! A [`RetryPolicy`] bounds how many times the executor re-invokes a node
//! whose failure was classified [`Transient`](crate::node::FailureKind::Transient)
//! and how long it waits between attempts. Delays grow exponentially from
//! `initial_interval` by `backoff_factor`, capped at `max_interval`, with
//! optional jitter to spread out herds of retrying branches.
//!
//! `Permanent` and `Validation` failures never consult a retry policy.
//!
//! # Example
//!
//! ```rust
//! use flowgraph_core::retry::RetryPolicy;
//!
//! let policy = RetryPolicy::new(5)
//!     .with_initial_interval(1.0)
//!     .with_backoff_factor(3.0)
//!     .with_max_interval(60.0)
//!     .with_jitter(false);
//!
//! assert!(policy.should_retry(4));
//! assert!(!policy.should_retry(5));
//! assert_eq!(policy.calculate_delay(1).as_secs_f64(), 3.0);
//! ```

use rand::Rng;
use std::time::Duration;

/// Bounded exponential backoff configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts allowed (first execution included)
    pub max_attempts: usize,

    /// Delay before the first retry, in seconds
    pub initial_interval: f64,

    /// Multiplier applied per attempt
    pub backoff_factor: f64,

    /// Ceiling on any single delay, in seconds
    pub max_interval: f64,

    /// Randomize each delay by ±50% to avoid synchronized retries
    pub jitter: bool,
}

impl RetryPolicy {
    /// Create a policy with the given attempt budget and default backoff
    pub fn new(max_attempts: usize) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// A policy that never retries
    pub fn none() -> Self {
        Self::new(1)
    }

    /// Set the delay before the first retry, in seconds
    pub fn with_initial_interval(mut self, seconds: f64) -> Self {
        self.initial_interval = seconds;
        self
    }

    /// Set the per-attempt multiplier
    pub fn with_backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }

    /// Cap any single delay, in seconds
    pub fn with_max_interval(mut self, seconds: f64) -> Self {
        self.max_interval = seconds;
        self
    }

    /// Enable or disable jitter
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Whether another attempt is allowed after `attempts` have been made
    pub fn should_retry(&self, attempts: usize) -> bool {
        attempts < self.max_attempts
    }

    /// Delay before retry number `attempt` (0-based)
    pub fn calculate_delay(&self, attempt: usize) -> Duration {
        let mut delay = self.initial_interval * self.backoff_factor.powi(attempt as i32);
        delay = delay.min(self.max_interval);

        if self.jitter {
            let factor = rand::thread_rng().gen_range(0.5..1.5);
            delay *= factor;
        }

        Duration::from_secs_f64(delay.max(0.0))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_interval: 0.5,
            backoff_factor: 2.0,
            max_interval: 128.0,
            jitter: true,
        }
    }
}

/// Per-node bookkeeping across retry attempts
#[derive(Debug, Clone, Default)]
pub struct RetryState {
    /// Attempts made so far
    pub attempts: usize,

    /// Message of the most recent failure
    pub last_error: Option<String>,
}

impl RetryState {
    /// Fresh state with zero attempts
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one failed attempt
    pub fn record_attempt(&mut self, error: Option<String>) {
        self.attempts += 1;
        if error.is_some() {
            self.last_error = error;
        }
    }

    /// Reset after a success
    pub fn reset(&mut self) {
        self.attempts = 0;
        self.last_error = None;
    }
}
