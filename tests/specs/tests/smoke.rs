// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end smoke tests that spawn the real `ac-server` binary and
//! exercise its HTTP and WebSocket surface.

use std::time::Duration;

use ac_server_specs::ServerProcess;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;

const TIMEOUT: Duration = Duration::from_secs(10);

fn workspace_dir() -> String {
    std::env::temp_dir().to_string_lossy().into_owned()
}

#[tokio::test]
async fn health_reports_running() -> anyhow::Result<()> {
    let server = ServerProcess::start("cat")?;
    server.wait_healthy(TIMEOUT).await?;

    let resp: serde_json::Value = reqwest::get(format!("{}/api/v1/health", server.base_url())).await?.json().await?;

    assert_eq!(resp["status"], "running");
    assert_eq!(resp["worker_count"], 0);

    Ok(())
}

#[tokio::test]
async fn worker_lifecycle_create_list_get_delete() -> anyhow::Result<()> {
    let server = ServerProcess::start("cat")?;
    server.wait_healthy(TIMEOUT).await?;
    let client = reqwest::Client::new();

    let created: serde_json::Value = client
        .post(format!("{}/api/v1/workers", server.base_url()))
        .json(&serde_json::json!({"workspace": workspace_dir()}))
        .send()
        .await?
        .json()
        .await?;

    let id = created["id"].as_str().expect("created worker carries an id").to_owned();
    assert_eq!(created["state"], "running");

    let listed: Vec<serde_json::Value> =
        client.get(format!("{}/api/v1/workers", server.base_url())).send().await?.json().await?;
    assert!(listed.iter().any(|w| w["id"] == id));

    let fetched: serde_json::Value =
        client.get(format!("{}/api/v1/workers/{id}", server.base_url())).send().await?.json().await?;
    assert_eq!(fetched["id"], id);
    assert!(fetched["pid"].is_number());

    let deleted = client.delete(format!("{}/api/v1/workers/{id}?grace=1", server.base_url())).send().await?;
    assert_eq!(deleted.status(), 204);

    let missing = client.get(format!("{}/api/v1/workers/{id}", server.base_url())).send().await?;
    assert_eq!(missing.status(), 404);

    Ok(())
}

#[tokio::test]
async fn stop_returns_within_grace_and_leaves_worker_stopped() -> anyhow::Result<()> {
    let server = ServerProcess::start("cat")?;
    server.wait_healthy(TIMEOUT).await?;
    let client = reqwest::Client::new();

    let created: serde_json::Value = client
        .post(format!("{}/api/v1/workers", server.base_url()))
        .json(&serde_json::json!({"workspace": workspace_dir()}))
        .send()
        .await?
        .json()
        .await?;
    let id = created["id"].as_str().expect("created worker carries an id").to_owned();

    let started = tokio::time::Instant::now();
    let stopped: serde_json::Value = client
        .post(format!("{}/api/v1/workers/{id}/stop?grace=1", server.base_url()))
        .send()
        .await?
        .json()
        .await?;
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(stopped["state"], "stopped");

    Ok(())
}

#[tokio::test]
async fn stream_roundtrips_stdin_to_stdout() -> anyhow::Result<()> {
    let server = ServerProcess::start("cat")?;
    server.wait_healthy(TIMEOUT).await?;
    let client = reqwest::Client::new();

    let created: serde_json::Value = client
        .post(format!("{}/api/v1/workers", server.base_url()))
        .json(&serde_json::json!({"workspace": workspace_dir()}))
        .send()
        .await?
        .json()
        .await?;
    let id = created["id"].as_str().expect("created worker carries an id").to_owned();

    let (mut ws, _) = tokio_tungstenite::connect_async(server.ws_url(&id)).await?;

    ws.send(Message::Text(
        serde_json::json!({"type": "send", "message": {"type": "line", "payload": {"text": "smoke-marker"}}})
            .to_string()
            .into(),
    ))
    .await?;

    let deadline = tokio::time::Instant::now() + TIMEOUT;
    loop {
        if tokio::time::Instant::now() > deadline {
            anyhow::bail!("echoed frame never arrived");
        }
        match tokio::time::timeout(Duration::from_secs(1), ws.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => {
                let frame: serde_json::Value = serde_json::from_str(&text)?;
                if frame["data"]["text"] == "smoke-marker" {
                    return Ok(());
                }
            }
            Ok(Some(Ok(_))) | Err(_) => continue,
            Ok(Some(Err(e))) => anyhow::bail!("websocket error: {e}"),
            Ok(None) => anyhow::bail!("websocket closed before echo arrived"),
        }
    }
}

#[tokio::test]
async fn stream_responds_to_ping() -> anyhow::Result<()> {
    let server = ServerProcess::start("cat")?;
    server.wait_healthy(TIMEOUT).await?;
    let client = reqwest::Client::new();

    let created: serde_json::Value = client
        .post(format!("{}/api/v1/workers", server.base_url()))
        .json(&serde_json::json!({"workspace": workspace_dir()}))
        .send()
        .await?
        .json()
        .await?;
    let id = created["id"].as_str().expect("created worker carries an id").to_owned();

    let (mut ws, _) = tokio_tungstenite::connect_async(server.ws_url(&id)).await?;
    ws.send(Message::Text(serde_json::json!({"type": "ping"}).to_string().into())).await?;

    let msg = tokio::time::timeout(TIMEOUT, ws.next()).await?.expect("stream closed before pong")?;
    let Message::Text(text) = msg else { anyhow::bail!("expected a text frame") };
    let frame: serde_json::Value = serde_json::from_str(&text)?;
    assert_eq!(frame["type"], "pong");

    Ok(())
}

#[tokio::test]
async fn sql_injection_query_is_blocked_and_recorded() -> anyhow::Result<()> {
    let server = ServerProcess::start("cat")?;
    server.wait_healthy(TIMEOUT).await?;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{}/api/v1/workers?id=1%27%20OR%20%271%27%3D%271", server.base_url()))
        .send()
        .await?;
    assert_eq!(resp.status(), 403);

    let body: serde_json::Value = resp.json().await?;
    assert_eq!(body["error"]["code"], "ATTACK");

    let events: Vec<serde_json::Value> =
        client.get(format!("{}/api/v1/security/events", server.base_url())).send().await?.json().await?;
    assert!(events.iter().any(|e| e["findings"]
        .as_array()
        .map(|fs| fs.iter().any(|f| f["confidence"].as_f64().unwrap_or(0.0) >= 0.9))
        .unwrap_or(false)));

    let stats: serde_json::Value =
        client.get(format!("{}/api/v1/security/statistics", server.base_url())).send().await?.json().await?;
    assert!(stats["attacks_blocked"].as_u64().unwrap_or(0) >= 1);

    Ok(())
}
