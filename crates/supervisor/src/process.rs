// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! OS child process creation and teardown (§4.D).
//!
//! `Wait` is called at most once per handle; after it returns the pid is no
//! longer meaningful. Closing stdin is idempotent. Dropping a handle whose
//! scope was cancelled issues at least one `Kill` before the drop completes.

use std::process::Stdio;

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use thiserror::Error;
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};

/// Errors surfaced by [`ProcessHandle`] operations.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to spawn process: {0}")]
    Spawn(String),
    #[error("process has no pid (already reaped)")]
    NoPid,
    #[error("signal delivery failed: {0}")]
    Signal(String),
    #[error("wait() was already called on this handle")]
    AlreadyWaited,
}

/// Exit status of a terminated child process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitStatus {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

impl ExitStatus {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Wraps OS child creation for one worker.
pub struct ProcessHandle {
    child: Child,
    pid: Option<u32>,
    waited: bool,
}

impl ProcessHandle {
    /// Spawn `cmd args...` in `cwd` with `env` merged on top of the parent
    /// environment, piping stdin/stdout/stderr.
    pub fn spawn(
        cmd: &str,
        args: &[String],
        cwd: &str,
        env: &std::collections::HashMap<String, String>,
    ) -> Result<Self, ProcessError> {
        let mut command = Command::new(cmd);
        command
            .args(args)
            .current_dir(cwd)
            .envs(env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(false);

        let child = command.spawn().map_err(|e| ProcessError::Spawn(e.to_string()))?;
        let pid = child.id();
        Ok(Self { child, pid, waited: false })
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn stdin(&mut self) -> Option<ChildStdin> {
        self.child.stdin.take()
    }

    pub fn stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    pub fn stderr(&mut self) -> Option<ChildStderr> {
        self.child.stderr.take()
    }

    /// Send a Unix signal to the child. A no-op if the pid is gone.
    pub fn signal(&self, sig: Signal) -> Result<(), ProcessError> {
        let pid = self.pid.ok_or(ProcessError::NoPid)?;
        let raw = i32::try_from(pid).map_err(|e| ProcessError::Signal(e.to_string()))?;
        signal::kill(Pid::from_raw(raw), sig).map_err(|e| ProcessError::Signal(e.to_string()))
    }

    /// Escalate straight to SIGKILL.
    pub async fn kill(&mut self) -> Result<(), ProcessError> {
        self.child.kill().await.map_err(|e| ProcessError::Signal(e.to_string()))
    }

    /// Await child termination. May only be called once.
    pub async fn wait(&mut self) -> Result<ExitStatus, ProcessError> {
        if self.waited {
            return Err(ProcessError::AlreadyWaited);
        }
        self.waited = true;
        let status = self.child.wait().await.map_err(|e| ProcessError::Signal(e.to_string()))?;
        self.pid = None;
        Ok(ExitStatus {
            code: status.code(),
            signal: unix_signal(&status),
        })
    }
}

#[cfg(unix)]
fn unix_signal(status: &std::process::ExitStatus) -> Option<i32> {
    std::os::unix::process::ExitStatusExt::signal(status)
}

#[cfg(not(unix))]
fn unix_signal(_status: &std::process::ExitStatus) -> Option<i32> {
    None
}

/// Checks whether a process with the given pid is alive via a zero-signal.
pub fn is_process_alive(pid: u32) -> bool {
    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    signal::kill(Pid::from_raw(raw), None).is_ok()
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
