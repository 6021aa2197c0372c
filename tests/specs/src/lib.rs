// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test harness for end-to-end binary smoke tests.
//!
//! Spawns the real `ac-server` binary as a subprocess and exercises it
//! over its HTTP/WS surface.

use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

/// Resolve the path to the compiled `ac-server` binary.
pub fn server_binary() -> PathBuf {
    let manifest = std::path::Path::new(env!("CARGO_MANIFEST_DIR"));
    // tests/specs -> tests -> workspace root
    let workspace = manifest.parent().and_then(|p| p.parent()).unwrap_or(manifest);
    workspace.join("target").join("debug").join("ac-server")
}

/// Find a free TCP port by binding to :0 then releasing.
pub fn free_port() -> anyhow::Result<u16> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

/// A running `ac-server` process that is killed on drop. Uses the
/// in-process store (no `AC_SERVER_REDIS_URL`) and dev mode, so error
/// responses carry `details` and strict security headers are suppressed.
pub struct ServerProcess {
    child: Child,
    port: u16,
}

impl ServerProcess {
    /// Spawn `ac-server` with `worker_command` as the process every
    /// created worker runs.
    pub fn start(worker_command: &str) -> anyhow::Result<Self> {
        let binary = server_binary();
        anyhow::ensure!(binary.exists(), "ac-server binary not found at {}", binary.display());

        let port = free_port()?;

        let child = Command::new(&binary)
            .args(["--host", "127.0.0.1", "--port", &port.to_string()])
            .env("AC_SERVER_DEV_MODE", "true")
            .env("AC_SERVER_WORKER_COMMAND", worker_command)
            .env("AC_SERVER_RATE_LIMIT_IP", "1000")
            .env("AC_SERVER_RATE_LIMIT_GLOBAL", "100000")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        Ok(Self { child, port })
    }

    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    pub fn ws_url(&self, worker_id: &str) -> String {
        format!("ws://127.0.0.1:{}/api/v1/workers/{worker_id}/stream", self.port)
    }

    /// Poll `/api/v1/health` until it responds or `timeout` elapses.
    pub async fn wait_healthy(&self, timeout: Duration) -> anyhow::Result<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        let client = reqwest::Client::new();
        let url = format!("{}/api/v1/health", self.base_url());
        loop {
            if tokio::time::Instant::now() > deadline {
                anyhow::bail!("ac-server did not become healthy within {timeout:?}");
            }
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status().is_success() {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

impl Drop for ServerProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
