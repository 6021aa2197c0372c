// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Owns one [`ProcessHandle`] and enforces its lifecycle state machine
//! (§4.E). All state reads and writes go through a single mutex; the
//! monitor task that awaits `Wait` is the only writer of the terminal
//! transition out of Running/Stopping.

use std::sync::Arc;
use std::time::Duration;

use ac_core::worker::{Invocation, WorkerState};
use nix::sys::signal::Signal;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::process::{ChildStderr, ChildStdin, ChildStdout};
use tokio::sync::{oneshot, watch};

use crate::process::{is_process_alive, ProcessError, ProcessHandle};

/// Errors surfaced by [`Supervisor`] operations.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("illegal transition from {from} to {to}")]
    IllegalTransition { from: WorkerState, to: WorkerState },
    #[error(transparent)]
    Process(#[from] ProcessError),
    #[error("supervisor is not running a process")]
    NotRunning,
}

/// Why the worker reached `Stopped`/`Error`. The monitor distinguishes a
/// commanded stop from an unexpected death by checking this sentinel at the
/// moment `Wait` returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// `Stop` was invoked before the child exited.
    StoppedByRequest,
    /// The child exited on its own.
    Crashed,
}

/// Piped stdio handed off by [`Supervisor::start`] for the caller to wire
/// into a stream handler.
pub struct WorkerStdio {
    pub stdin: Option<ChildStdin>,
    pub stdout: Option<ChildStdout>,
    pub stderr: Option<ChildStderr>,
}

struct Inner {
    state: WorkerState,
    pid: Option<u32>,
    stopping: bool,
    restart_count: u32,
    last_error: Option<String>,
    started_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Supervises a single worker's process across restarts.
///
/// The monitor task takes sole ownership of the [`ProcessHandle`] for the
/// lifetime of the child: it is the only caller of `Wait`, so `Stop`/`Kill`
/// never contend with it for `&mut` access. They act on the pid directly
/// via a zero-payload signal instead.
pub struct Supervisor {
    inner: Mutex<Inner>,
    state_tx: watch::Sender<WorkerState>,
    state_rx: watch::Receiver<WorkerState>,
}

impl Supervisor {
    pub fn new() -> Arc<Self> {
        let (state_tx, state_rx) = watch::channel(WorkerState::Stopped);
        Arc::new(Self {
            inner: Mutex::new(Inner {
                state: WorkerState::Stopped,
                pid: None,
                stopping: false,
                restart_count: 0,
                last_error: None,
                started_at: None,
            }),
            state_tx,
            state_rx,
        })
    }

    pub fn status(&self) -> WorkerState {
        self.inner.lock().state
    }

    pub fn pid(&self) -> Option<u32> {
        self.inner.lock().pid
    }

    pub fn restart_count(&self) -> u32 {
        self.inner.lock().restart_count
    }

    pub fn last_error(&self) -> Option<String> {
        self.inner.lock().last_error.clone()
    }

    pub fn started_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.inner.lock().started_at
    }

    /// Observe state transitions as they happen.
    pub fn subscribe_state(&self) -> watch::Receiver<WorkerState> {
        self.state_rx.clone()
    }

    /// Block until the monitor task observes `Stopped`/`Error`, so a caller
    /// that just called `stop`/`start` sees the settled state rather than a
    /// transient `Stopping`/`Starting`.
    pub async fn wait_for_terminal_state(&self) {
        let mut state_rx = self.subscribe_state();
        loop {
            if matches!(*state_rx.borrow(), WorkerState::Stopped | WorkerState::Error) {
                return;
            }
            if state_rx.changed().await.is_err() {
                return;
            }
        }
    }

    fn transition(&self, inner: &mut Inner, to: WorkerState) -> Result<(), SupervisorError> {
        if !inner.state.can_transition_to(to) {
            return Err(SupervisorError::IllegalTransition { from: inner.state, to });
        }
        inner.state = to;
        let _ = self.state_tx.send(to);
        Ok(())
    }

    /// Spawn the worker's process and begin monitoring it. Returns the
    /// piped stdio (for wiring into a stream handler at the caller's layer)
    /// and a receiver that fires once when the worker terminates.
    pub async fn start(
        self: &Arc<Self>,
        invocation: Invocation,
    ) -> Result<(WorkerStdio, oneshot::Receiver<StopReason>), SupervisorError> {
        {
            let mut inner = self.inner.lock();
            self.transition(&mut inner, WorkerState::Starting)?;
        }

        let spawned = ProcessHandle::spawn(
            &invocation.command,
            &invocation.args,
            &invocation.workspace,
            &invocation.env,
        );

        let mut process = match spawned {
            Ok(process) => process,
            Err(e) => {
                let mut inner = self.inner.lock();
                inner.last_error = Some(e.to_string());
                let _ = self.transition(&mut inner, WorkerState::Error);
                return Err(e.into());
            }
        };

        let stdio = WorkerStdio {
            stdin: process.stdin(),
            stdout: process.stdout(),
            stderr: process.stderr(),
        };
        let pid = process.pid();

        {
            let mut inner = self.inner.lock();
            self.transition(&mut inner, WorkerState::Running)?;
            inner.started_at = Some(chrono::Utc::now());
            inner.pid = pid;
        }

        let (exit_tx, exit_rx) = oneshot::channel();
        let this = Arc::clone(self);
        tokio::spawn(async move { this.monitor(process, exit_tx).await });

        Ok((stdio, exit_rx))
    }

    async fn monitor(self: Arc<Self>, mut process: ProcessHandle, exit_tx: oneshot::Sender<StopReason>) {
        let wait_result = process.wait().await;

        let mut inner = self.inner.lock();
        let reason = if inner.stopping { StopReason::StoppedByRequest } else { StopReason::Crashed };
        inner.pid = None;

        match wait_result {
            Ok(_status) if reason == StopReason::StoppedByRequest => {
                let _ = self.transition(&mut inner, WorkerState::Stopped);
                inner.stopping = false;
            }
            Ok(status) => {
                inner.last_error = Some(format!("process exited unexpectedly: {status:?}"));
                let _ = self.transition(&mut inner, WorkerState::Error);
            }
            Err(e) => {
                inner.last_error = Some(e.to_string());
                let _ = self.transition(&mut inner, WorkerState::Error);
            }
        }
        drop(inner);
        let _ = exit_tx.send(reason);
    }

    /// Send the platform interrupt signal and wait up to `grace`. Escalates
    /// to `Kill` if `grace` expires; reports success either way because the
    /// goal is process death, reached or forced.
    pub async fn stop(&self, grace: Duration) -> Result<(), SupervisorError> {
        let pid = {
            let mut inner = self.inner.lock();
            self.transition(&mut inner, WorkerState::Stopping)?;
            inner.stopping = true;
            inner.pid
        };

        let Some(pid) = pid else {
            return Err(SupervisorError::NotRunning);
        };

        if let Err(e) = signal_pid(pid, Signal::SIGTERM) {
            tracing::debug!(pid, error = %e, "SIGTERM delivery failed, will rely on grace timeout");
        }

        tokio::time::sleep(grace).await;

        if is_process_alive(pid) {
            if let Err(e) = signal_pid(pid, Signal::SIGKILL) {
                tracing::debug!(pid, error = %e, "SIGKILL delivery failed");
            }
        }

        Ok(())
    }

    /// Escalate straight to kill, bypassing the grace window.
    pub async fn kill(&self) -> Result<(), SupervisorError> {
        let pid = {
            let mut inner = self.inner.lock();
            inner.stopping = true;
            inner.pid
        };
        let pid = pid.ok_or(SupervisorError::NotRunning)?;
        signal_pid(pid, Signal::SIGKILL).map_err(|e| SupervisorError::Process(ProcessError::Signal(e.to_string())))
    }

    /// `State == Running` and the pid answers a zero-signal liveness probe.
    pub fn health_check(&self) -> bool {
        let inner = self.inner.lock();
        if inner.state != WorkerState::Running {
            return false;
        }
        inner.pid.is_some_and(is_process_alive)
    }

    /// Bookkeeping before a restart's own `start()` call. Leaves the actual
    /// `Starting` transition to `start()` itself; `can_transition_to` admits
    /// it from both `Stopped` and `Error`.
    pub fn prepare_restart(&self) -> Result<(), SupervisorError> {
        let mut inner = self.inner.lock();
        if !matches!(inner.state, WorkerState::Stopped | WorkerState::Error) {
            return Err(SupervisorError::IllegalTransition { from: inner.state, to: WorkerState::Starting });
        }
        inner.restart_count += 1;
        inner.stopping = false;
        Ok(())
    }
}

fn signal_pid(pid: u32, sig: Signal) -> Result<(), nix::Error> {
    let raw = i32::try_from(pid).map_err(|_| nix::Error::EINVAL)?;
    nix::sys::signal::kill(nix::unistd::Pid::from_raw(raw), sig)
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
