//! # Fibonacci Backoff
//!
//! Requeue delays for integrations whose reconciliation keeps failing with
//! retryable errors. Delays follow the Fibonacci sequence in whole minutes
//! (1m, 1m, 2m, 3m, 5m, 8m) and stop growing at the cap.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::warn;

/// Fibonacci sequence of delays, capped
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    min: Duration,
    max: Duration,
    prev: Duration,
    current: Duration,
}

impl FibonacciBackoff {
    /// Sequence starting at `min_minutes` and capped at `max_minutes`
    #[must_use]
    pub fn new(min_minutes: u64, max_minutes: u64) -> Self {
        let min = Duration::from_secs(min_minutes * 60);
        Self {
            min,
            max: Duration::from_secs(max_minutes * 60),
            prev: Duration::ZERO,
            current: min,
        }
    }

    /// Current delay; advances the sequence
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        let next = (self.prev + self.current).min(self.max);
        self.prev = self.current;
        self.current = next;
        delay
    }

    pub fn reset(&mut self) {
        self.prev = Duration::ZERO;
        self.current = self.min;
    }
}

/// Per-integration backoff state
#[derive(Debug, Clone)]
struct BackoffState {
    backoff: FibonacciBackoff,
    error_count: u32,
}

/// Backoff sequences keyed by `namespace/name`
#[derive(Debug)]
pub struct BackoffTracker {
    min_minutes: u64,
    max_minutes: u64,
    states: Mutex<HashMap<String, BackoffState>>,
}

impl Default for BackoffTracker {
    fn default() -> Self {
        // 1 minute min, 10 minutes max
        Self::new(1, 10)
    }
}

impl BackoffTracker {
    pub fn new(min_minutes: u64, max_minutes: u64) -> Self {
        Self {
            min_minutes,
            max_minutes,
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Record a failure for `key` and return (delay, consecutive failures)
    pub fn record_failure(&self, key: &str) -> (Duration, u32) {
        match self.states.lock() {
            Ok(mut states) => {
                let state = states.entry(key.to_string()).or_insert_with(|| BackoffState {
                    backoff: FibonacciBackoff::new(self.min_minutes, self.max_minutes),
                    error_count: 0,
                });
                state.error_count += 1;
                (state.backoff.next_delay(), state.error_count)
            }
            Err(e) => {
                warn!("Failed to lock backoff states: {}, using minimum backoff", e);
                (Duration::from_secs(self.min_minutes * 60), 0)
            }
        }
    }

    /// Forget the failure history of `key` after a successful pass
    pub fn reset(&self, key: &str) {
        if let Ok(mut states) = self.states.lock() {
            states.remove(key);
        }
    }
}
