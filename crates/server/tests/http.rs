// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Integration tests for the control plane's HTTP API.
//!
//! Uses `axum_test::TestServer` — no real TCP or Redis needed; `AppState`
//! falls back to its in-process store when no Redis URL is configured.

use std::sync::Arc;

use ac_server::config::{LogFormat, ServerConfig};
use ac_server::state::AppState;
use ac_server::transport::build_router;
use axum_test::TestServer;

fn test_config(worker_command: Option<&str>) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".into(),
        port: 0,
        redis_url: None,
        log_format: LogFormat::Text,
        dev_mode: true,
        worker_command: worker_command.map(str::to_owned),
        session_ttl_secs: 86_400,
        max_sessions_per_user: 10,
        store_timeout_ms: 200,
        rate_limit_global: 100_000,
        rate_limit_ip: 100_000,
        rate_limit_endpoint: 100_000,
        rate_limit_user: 100_000,
        rate_limit_window_secs: 60,
        violation_threshold: 1_000,
        block_duration_secs: 900,
        csrf_ttl_secs: 3_600,
        trusted_origins: Vec::new(),
        audit_batch_size: 100,
        audit_flush_interval_secs: 10,
    }
}

async fn test_server(worker_command: Option<&str>) -> TestServer {
    let state: Arc<AppState> = AppState::new(test_config(worker_command)).await.expect("state construction cannot fail without redis");
    let router = build_router(state);
    TestServer::new(router).expect("failed to create test server")
}

#[tokio::test]
async fn health_reports_zero_workers() -> anyhow::Result<()> {
    let server = test_server(None).await;
    let resp = server.get("/api/v1/health").await;
    resp.assert_status_ok();
    let body: serde_json::Value = resp.json();
    assert_eq!(body["status"], "running");
    assert_eq!(body["worker_count"], 0);
    Ok(())
}

#[tokio::test]
async fn create_worker_requires_a_configured_command() -> anyhow::Result<()> {
    let server = test_server(None).await;
    let resp = server.post("/api/v1/workers").json(&serde_json::json!({"workspace": "/tmp"})).await;
    resp.assert_status(axum::http::StatusCode::BAD_REQUEST);
    let body: serde_json::Value = resp.json();
    assert_eq!(body["error"]["code"], "VALIDATION");
    Ok(())
}

#[tokio::test]
async fn worker_lifecycle_round_trips_through_http() -> anyhow::Result<()> {
    let server = test_server(Some("cat")).await;

    let created = server.post("/api/v1/workers").json(&serde_json::json!({"workspace": "/tmp"})).await;
    created.assert_status(axum::http::StatusCode::CREATED);
    let descriptor: serde_json::Value = created.json();
    let id = descriptor["id"].as_str().expect("descriptor carries an id").to_owned();
    assert_eq!(descriptor["state"], "running");

    let listed = server.get("/api/v1/workers").await;
    let workers: Vec<serde_json::Value> = listed.json();
    assert!(workers.iter().any(|w| w["id"] == id));

    let fetched = server.get(&format!("/api/v1/workers/{id}")).await;
    fetched.assert_status_ok();

    let stopped = server.post(&format!("/api/v1/workers/{id}/stop?grace=1")).await;
    stopped.assert_status_ok();
    let stopped: serde_json::Value = stopped.json();
    assert_eq!(stopped["state"], "stopped");

    let deleted = server.delete(&format!("/api/v1/workers/{id}")).await;
    deleted.assert_status(axum::http::StatusCode::NO_CONTENT);

    let missing = server.get(&format!("/api/v1/workers/{id}")).await;
    missing.assert_status(axum::http::StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn get_worker_rejects_a_malformed_id() -> anyhow::Result<()> {
    let server = test_server(Some("cat")).await;
    let resp = server.get("/api/v1/workers/not-a-uuid").await;
    resp.assert_status(axum::http::StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn sql_injection_query_is_blocked() -> anyhow::Result<()> {
    let server = test_server(None).await;
    let resp = server.get("/api/v1/workers?id=1'%20OR%20'1'='1").await;
    resp.assert_status(axum::http::StatusCode::FORBIDDEN);
    let body: serde_json::Value = resp.json();
    assert_eq!(body["error"]["code"], "ATTACK");

    let events = server.get("/api/v1/security/events").await;
    let events: Vec<serde_json::Value> = events.json();
    assert!(!events.is_empty());

    let stats = server.get("/api/v1/security/statistics").await;
    let stats: serde_json::Value = stats.json();
    assert_eq!(stats["attacks_blocked"], 1);

    Ok(())
}

#[tokio::test]
async fn detect_attack_endpoint_flags_sql_injection() -> anyhow::Result<()> {
    let server = test_server(None).await;
    let resp = server
        .post("/api/v1/security/detect-attack")
        .json(&serde_json::json!({"query": "id=1' OR '1'='1"}))
        .await;
    resp.assert_status_ok();
    let body: serde_json::Value = resp.json();
    assert_eq!(body["is_attack"], true);
    Ok(())
}

#[tokio::test]
async fn sessions_endpoints_reject_anonymous_callers() -> anyhow::Result<()> {
    let server = test_server(None).await;
    let resp = server.get("/api/v1/sessions").await;
    resp.assert_status(axum::http::StatusCode::UNAUTHORIZED);
    Ok(())
}
