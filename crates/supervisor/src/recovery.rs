// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Glues the classifier, backoff, and circuit breaker to a [`Supervisor`]
//! (§4.I).

use std::sync::Arc;
use std::time::{Duration, Instant};

use ac_core::worker::Invocation;
use parking_lot::Mutex;

use crate::backoff::{Backoff, BackoffConfig};
use crate::breaker::{BreakerConfig, BreakerState, CircuitBreaker};
use crate::classifier::{Action, Classification, Classifier};
use crate::supervisor::{Supervisor, SupervisorError};

/// What the caller should do after `handle_error` returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    Ignore,
    Retry,
    Restart,
    Fail,
}

/// Snapshot of recovery activity for a worker, mirrored onto the metrics
/// channel every minute and on demand.
#[derive(Debug, Clone, Default)]
pub struct RecoveryMetrics {
    pub total_errors: u64,
    pub restart_count: u32,
    pub successful_runs: u64,
    pub average_uptime: Duration,
    pub last_error: Option<String>,
    pub last_restart: Option<chrono::DateTime<chrono::Utc>>,
}

struct Stats {
    total_errors: u64,
    successful_runs: u64,
    uptime_samples: Vec<Duration>,
    last_error: Option<String>,
    last_restart: Option<chrono::DateTime<chrono::Utc>>,
    last_restart_at: Option<Instant>,
    run_started_at: Option<Instant>,
}

/// Orchestrates the classifier, backoff, and circuit breaker around one
/// supervisor, deciding whether to retry, restart, or give up.
pub struct RecoveryManager {
    supervisor: Arc<Supervisor>,
    classifier: Classifier,
    backoff: Mutex<Backoff>,
    breaker: CircuitBreaker,
    max_restarts: u32,
    stats: Mutex<Stats>,
}

impl RecoveryManager {
    pub fn new(supervisor: Arc<Supervisor>, backoff_config: BackoffConfig, breaker_config: BreakerConfig, max_restarts: u32) -> Self {
        Self {
            supervisor,
            classifier: Classifier::with_defaults(),
            backoff: Mutex::new(Backoff::new(backoff_config)),
            breaker: CircuitBreaker::new(breaker_config),
            max_restarts,
            stats: Mutex::new(Stats {
                total_errors: 0,
                successful_runs: 0,
                uptime_samples: Vec::new(),
                last_error: None,
                last_restart: None,
                last_restart_at: None,
                run_started_at: Some(Instant::now()),
            }),
        }
    }

    /// Classify `error_text` and decide what the caller should do next.
    pub fn handle_error(&self, error_text: &str) -> Directive {
        let classification: Classification = self.classifier.classify(error_text);

        {
            let mut stats = self.stats.lock();
            stats.total_errors += 1;
            stats.last_error = Some(error_text.to_string());
        }
        self.breaker.record_failure();

        if self.breaker.state() == BreakerState::Open {
            return Directive::Fail;
        }

        match classification.action {
            Action::Ignore => Directive::Ignore,
            Action::Fail => Directive::Fail,
            Action::OpenBreaker => {
                self.breaker.force_open();
                Directive::Fail
            }
            Action::Retry => Directive::Retry,
            Action::Restart => {
                if self.can_restart() {
                    Directive::Restart
                } else {
                    Directive::Fail
                }
            }
        }
    }

    fn can_restart(&self) -> bool {
        if self.supervisor.restart_count() >= self.max_restarts {
            return false;
        }
        let stats = self.stats.lock();
        let elapsed_ok = stats.last_restart_at.is_none_or(|t| t.elapsed() >= self.current_backoff_floor());
        elapsed_ok
    }

    fn current_backoff_floor(&self) -> Duration {
        // Read-only: a fresh Backoff with no prior call still reports its
        // configured initial delay. `restart` is the only caller allowed to
        // advance the sequence.
        self.backoff.lock().last_emitted()
    }

    /// Stop the worker with a bounded grace, wait one backoff interval,
    /// then re-spawn. Records the outcome to the breaker and hands back the
    /// fresh stdio/exit receiver so the caller can rewire its stream
    /// handler and watcher task onto the new process.
    pub async fn restart(
        &self,
        invocation: Invocation,
        grace: Duration,
    ) -> Result<(crate::supervisor::WorkerStdio, tokio::sync::oneshot::Receiver<crate::supervisor::StopReason>), SupervisorError> {
        if self.supervisor.status() == ac_core::worker::WorkerState::Running {
            let _ = self.supervisor.stop(grace).await;
            self.supervisor.wait_for_terminal_state().await;
        }

        let delay = self.backoff.lock().next_backoff();
        tokio::time::sleep(delay).await;

        self.supervisor.prepare_restart()?;
        let result = self.supervisor.start(invocation).await;

        let mut stats = self.stats.lock();
        stats.last_restart = Some(chrono::Utc::now());
        stats.last_restart_at = Some(Instant::now());

        match &result {
            Ok(_) => {
                self.breaker.record_success();
                self.backoff.lock().reset();
                stats.successful_runs += 1;
                stats.run_started_at = Some(Instant::now());
            }
            Err(_) => {
                self.breaker.record_failure();
            }
        }
        drop(stats);

        result
    }

    /// Point-in-time metrics snapshot.
    pub fn metrics(&self) -> RecoveryMetrics {
        let stats = self.stats.lock();
        let average_uptime = if stats.uptime_samples.is_empty() {
            stats.run_started_at.map(|t| t.elapsed()).unwrap_or_default()
        } else {
            let total: Duration = stats.uptime_samples.iter().sum();
            total / stats.uptime_samples.len() as u32
        };

        RecoveryMetrics {
            total_errors: stats.total_errors,
            restart_count: self.supervisor.restart_count(),
            successful_runs: stats.successful_runs,
            average_uptime,
            last_error: stats.last_error.clone(),
            last_restart: stats.last_restart,
        }
    }
}

#[cfg(test)]
#[path = "recovery_tests.rs"]
mod tests;
