// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashMap;

use super::*;

#[tokio::test]
async fn spawn_exposes_a_live_pid() {
    let mut proc = ProcessHandle::spawn("sh", &["-c".into(), "sleep 0.2".into()], ".", &HashMap::new()).unwrap();
    let pid = proc.pid().unwrap();
    assert!(is_process_alive(pid));
    let status = proc.wait().await.unwrap();
    assert!(status.success());
}

#[tokio::test]
async fn wait_reports_nonzero_exit_code() {
    let mut proc = ProcessHandle::spawn("sh", &["-c".into(), "exit 7".into()], ".", &HashMap::new()).unwrap();
    let status = proc.wait().await.unwrap();
    assert_eq!(status.code, Some(7));
    assert!(!status.success());
}

#[tokio::test]
async fn wait_twice_returns_already_waited() {
    let mut proc = ProcessHandle::spawn("sh", &["-c".into(), "true".into()], ".", &HashMap::new()).unwrap();
    proc.wait().await.unwrap();
    let second = proc.wait().await;
    assert!(matches!(second, Err(ProcessError::AlreadyWaited)));
}

#[tokio::test]
async fn pid_is_cleared_after_wait() {
    let mut proc = ProcessHandle::spawn("sh", &["-c".into(), "true".into()], ".", &HashMap::new()).unwrap();
    proc.wait().await.unwrap();
    assert!(proc.pid().is_none());
}

#[tokio::test]
async fn kill_terminates_a_long_running_process() {
    let mut proc = ProcessHandle::spawn("sh", &["-c".into(), "sleep 30".into()], ".", &HashMap::new()).unwrap();
    proc.kill().await.unwrap();
    let status = proc.wait().await.unwrap();
    assert!(!status.success());
}

#[test]
fn dead_pid_reports_not_alive() {
    // PID 0 is never a valid child pid to signal; use a clearly-invalid one
    // that cannot belong to a live process in this PID namespace.
    assert!(!is_process_alive(u32::MAX));
}
