// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Backoff strategies for restart/retry pacing (§4.G).

use std::time::Duration;

use rand::Rng;

/// Shape of the backoff curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffFlavor {
    Exponential,
    Linear,
    Fixed,
}

/// Configuration for a [`Backoff`] sequence.
#[derive(Debug, Clone, Copy)]
pub struct BackoffConfig {
    pub flavor: BackoffFlavor,
    pub initial: Duration,
    pub max: Duration,
    pub multiplier: f64,
    pub step: Duration,
    /// Jitter fraction in `[0, 0.5]`; 0 disables jitter.
    pub jitter: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            flavor: BackoffFlavor::Exponential,
            initial: Duration::from_millis(500),
            max: Duration::from_secs(60),
            multiplier: 2.0,
            step: Duration::from_secs(1),
            jitter: 0.2,
        }
    }
}

/// Stateful backoff sequence. `NextBackoff` advances the attempt counter and
/// returns the next delay; `Reset` returns to the initial state. The sequence
/// auto-resets after a sustained-success interval equal to the current
/// backoff value has elapsed without a new failure.
pub struct Backoff {
    config: BackoffConfig,
    attempts: u32,
    last_emitted_at: Option<std::time::Instant>,
    last_emitted_duration: Duration,
}

impl Backoff {
    pub fn new(config: BackoffConfig) -> Self {
        Self { config, attempts: 0, last_emitted_at: None, last_emitted_duration: config.initial }
    }

    /// Advance the sequence and return the next delay, applying jitter.
    pub fn next_backoff(&mut self) -> Duration {
        self.maybe_auto_reset();

        let base = match self.config.flavor {
            BackoffFlavor::Exponential => {
                let scaled = self.config.initial.as_secs_f64() * self.config.multiplier.powi(self.attempts as i32);
                Duration::from_secs_f64(scaled.min(self.config.max.as_secs_f64()))
            }
            BackoffFlavor::Linear => {
                let scaled = self.config.initial.as_secs_f64() + self.config.step.as_secs_f64() * self.attempts as f64;
                Duration::from_secs_f64(scaled.min(self.config.max.as_secs_f64()))
            }
            BackoffFlavor::Fixed => self.config.initial,
        };

        let jittered = apply_jitter(base, self.config.jitter);
        self.attempts += 1;
        self.last_emitted_at = Some(std::time::Instant::now());
        self.last_emitted_duration = jittered;
        jittered
    }

    /// Return to the initial state, discarding the attempt count.
    pub fn reset(&mut self) {
        self.attempts = 0;
        self.last_emitted_at = None;
        self.last_emitted_duration = self.config.initial;
    }

    /// If the sustained-success window (the last emitted backoff's own
    /// duration) has elapsed since the last call without an intervening
    /// failure, reset automatically.
    fn maybe_auto_reset(&mut self) {
        if let Some(last) = self.last_emitted_at {
            if last.elapsed() >= self.last_emitted_duration {
                self.reset();
            }
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// The delay most recently returned by `next_backoff`, or the
    /// configured initial delay if it has never been called. Read-only —
    /// does not advance the sequence.
    pub fn last_emitted(&self) -> Duration {
        self.last_emitted_duration
    }
}

fn apply_jitter(base: Duration, jitter: f64) -> Duration {
    if jitter <= 0.0 {
        return base;
    }
    let j = jitter.min(0.5);
    let factor = rand::rng().random_range((1.0 - j)..=(1.0 + j));
    Duration::from_secs_f64((base.as_secs_f64() * factor).max(0.0))
}

#[cfg(test)]
#[path = "backoff_tests.rs"]
mod tests;
