// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process lifecycle, failure classification, backoff, circuit breaking,
//! and recovery orchestration for a supervised worker.
//!
//! Components D (Process Handle), E (Supervisor), F (Classifier), G
//! (Backoff), H (Circuit Breaker), and I (Recovery Manager).

pub mod backoff;
pub mod breaker;
pub mod classifier;
pub mod process;
pub mod recovery;
pub mod supervisor;

pub use backoff::{Backoff, BackoffConfig, BackoffFlavor};
pub use breaker::{BreakerConfig, BreakerState, CircuitBreaker};
pub use classifier::{Action, Category, Classification, Classifier};
pub use process::{is_process_alive, ExitStatus, ProcessError, ProcessHandle};
pub use recovery::{Directive, RecoveryManager, RecoveryMetrics};
pub use supervisor::{StopReason, Supervisor, SupervisorError, WorkerStdio};
