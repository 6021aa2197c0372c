// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sliding-window circuit breaker (§4.H).

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Current breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy)]
struct Outcome {
    at: Instant,
    success: bool,
}

/// Tunables for a [`CircuitBreaker`].
#[derive(Debug, Clone, Copy)]
pub struct BreakerConfig {
    pub window: Duration,
    pub failure_threshold: u32,
    pub rate_threshold: f64,
    pub min_samples: u32,
    pub recovery_timeout: Duration,
    pub success_threshold: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(60),
            failure_threshold: 5,
            rate_threshold: 0.5,
            min_samples: 10,
            recovery_timeout: Duration::from_secs(30),
            success_threshold: 2,
        }
    }
}

struct Inner {
    state: BreakerState,
    outcomes: VecDeque<Outcome>,
    next_attempt: Option<Instant>,
    half_open_successes: u32,
}

/// Per-worker circuit breaker. All operations are O(1) amortized and
/// protected by a single mutex.
pub struct CircuitBreaker {
    config: BreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                outcomes: VecDeque::new(),
                next_attempt: None,
                half_open_successes: 0,
            }),
        }
    }

    pub fn state(&self) -> BreakerState {
        self.inner.lock().state
    }

    /// Whether a call should be allowed right now.
    pub fn allow(&self) -> bool {
        let mut inner = self.inner.lock();
        match inner.state {
            BreakerState::Closed => true,
            BreakerState::HalfOpen => true,
            BreakerState::Open => {
                let now = Instant::now();
                if inner.next_attempt.is_some_and(|t| now >= t) {
                    inner.state = BreakerState::HalfOpen;
                    inner.half_open_successes = 0;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Record a successful call.
    pub fn record_success(&self) {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        match inner.state {
            BreakerState::HalfOpen => {
                inner.half_open_successes += 1;
                if inner.half_open_successes >= self.config.success_threshold {
                    inner.state = BreakerState::Closed;
                    inner.outcomes.clear();
                    inner.next_attempt = None;
                }
            }
            BreakerState::Closed => {
                inner.outcomes.push_back(Outcome { at: now, success: true });
                prune(&mut inner.outcomes, self.config.window, now);
            }
            BreakerState::Open => {}
        }
    }

    /// Record a failed call.
    pub fn record_failure(&self) {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        match inner.state {
            BreakerState::HalfOpen => {
                self.trip(&mut inner, now);
            }
            BreakerState::Closed => {
                inner.outcomes.push_back(Outcome { at: now, success: false });
                prune(&mut inner.outcomes, self.config.window, now);

                let total = inner.outcomes.len() as u32;
                let failures = inner.outcomes.iter().filter(|o| !o.success).count() as u32;
                let rate = if total > 0 { failures as f64 / total as f64 } else { 0.0 };

                if failures >= self.config.failure_threshold
                    || (total >= self.config.min_samples && rate >= self.config.rate_threshold)
                {
                    self.trip(&mut inner, now);
                }
            }
            BreakerState::Open => {}
        }
    }

    fn trip(&self, inner: &mut Inner, now: Instant) {
        inner.state = BreakerState::Open;
        inner.next_attempt = Some(now + self.config.recovery_timeout);
        inner.outcomes.clear();
    }

    /// Trip the breaker immediately, bypassing the failure/rate thresholds.
    /// Used for categories (e.g. resource exhaustion) that should open the
    /// breaker on a single occurrence rather than accumulate samples.
    pub fn force_open(&self) {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        self.trip(&mut inner, now);
    }
}

fn prune(outcomes: &mut VecDeque<Outcome>, window: Duration, now: Instant) {
    while let Some(front) = outcomes.front() {
        if now.duration_since(front.at) > window {
            outcomes.pop_front();
        } else {
            break;
        }
    }
}

#[cfg(test)]
#[path = "breaker_tests.rs"]
mod tests;
